use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::catalog::WizardCatalog;
use crate::config::WizardConfig;
use crate::domain::agent::{AgentDescriptor, AgentDraft, AgentId};
use crate::wizard::creation::AgentCreationService;
use crate::wizard::fields::{self, DraftField, DraftUpdateError};
use crate::wizard::steps::{next_reachable_step, Direction, FieldIssue, WizardStep};
use crate::wizard::validation::build_descriptor;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    Editing,
    Submitted,
}

#[derive(Clone, Debug)]
pub enum StepOutcome {
    Moved { from: WizardStep, to: WizardStep, skipped: Vec<WizardStep> },
    Stayed { step: WizardStep },
    Submitted(Box<AgentDescriptor>),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WizardError {
    #[error("step {step} is incomplete: {}", summarize(.issues))]
    StepIncomplete { step: WizardStep, issues: Vec<FieldIssue> },
    #[error("draft failed validation: {}", summarize(.issues))]
    InvariantViolations { issues: Vec<FieldIssue> },
    #[error("wizard session `{0}` was already submitted")]
    SessionClosed(String),
}

impl WizardError {
    pub fn issues(&self) -> &[FieldIssue] {
        match self {
            Self::StepIncomplete { issues, .. } | Self::InvariantViolations { issues } => issues,
            Self::SessionClosed(_) => &[],
        }
    }
}

fn summarize(issues: &[FieldIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// One pass through the wizard. Owns the draft until it is submitted.
#[derive(Clone, Debug)]
pub struct WizardSession {
    session_id: String,
    draft: AgentDraft,
    current: WizardStep,
    status: SessionStatus,
}

impl WizardSession {
    pub fn new(draft: AgentDraft) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            draft,
            current: WizardStep::FIRST,
            status: SessionStatus::Editing,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn draft(&self) -> &AgentDraft {
        &self.draft
    }

    pub fn current_step(&self) -> WizardStep {
        self.current
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn assign_agent_id(&mut self, id: AgentId) {
        self.draft.id = Some(id);
    }

    /// Applies one field update. A rejected value leaves the draft unchanged.
    pub fn update_field(&mut self, path: &str, value: Value) -> Result<(), DraftUpdateError> {
        if self.status == SessionStatus::Submitted {
            return Err(DraftUpdateError::InvalidValue {
                field: path.to_owned(),
                message: "session was already submitted".to_owned(),
            });
        }
        let field = path.parse::<DraftField>()?;
        let mut next = self.draft.clone();
        fields::apply(&mut next, field, value)?;
        self.draft = next;
        debug!(
            event_name = "wizard.field.updated",
            session_id = %self.session_id,
            field = field.path(),
            step = %self.current,
            "draft field updated"
        );
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
pub struct WizardController {
    config: WizardConfig,
}

impl WizardController {
    pub fn new(config: WizardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn create_draft(&self) -> AgentDraft {
        AgentDraft::default()
    }

    pub fn start(&self) -> WizardSession {
        let session = WizardSession::new(self.create_draft());
        info!(
            event_name = "wizard.session.started",
            session_id = %session.session_id,
            "wizard session started"
        );
        session
    }

    /// Starts a session whose draft already carries the id the service will use.
    pub fn start_with_service<S>(&self, service: &S) -> WizardSession
    where
        S: AgentCreationService + ?Sized,
    {
        let mut session = self.start();
        session.assign_agent_id(service.reserve_id());
        session
    }

    pub fn is_step_complete(&self, step: WizardStep, draft: &AgentDraft) -> bool {
        step.is_complete(draft, &self.config)
    }

    /// Steps the draft would visit from start to review, in order.
    pub fn reachable_steps(&self, draft: &AgentDraft) -> Vec<WizardStep> {
        WizardStep::ALL.into_iter().filter(|step| !step.is_skippable(draft)).collect()
    }

    pub fn advance(
        &self,
        session: &mut WizardSession,
        catalog: &WizardCatalog,
    ) -> Result<StepOutcome, WizardError> {
        if session.status == SessionStatus::Submitted {
            return Err(WizardError::SessionClosed(session.session_id.clone()));
        }

        let from = session.current;
        let missing = from.missing_fields(&session.draft, &self.config);
        if !missing.is_empty() {
            debug!(
                event_name = "wizard.step.incomplete",
                session_id = %session.session_id,
                step = %from,
                missing = missing.len(),
                "step is not complete"
            );
            return Err(WizardError::StepIncomplete { step: from, issues: missing });
        }

        if from == WizardStep::LAST {
            return self.submit(session, catalog);
        }

        let to = next_reachable_step(&session.draft, from.index() + 1, Direction::Forward);
        let skipped = skipped_between(from, to);
        session.current = to;
        debug!(
            event_name = "wizard.step.advanced",
            session_id = %session.session_id,
            from = %from,
            to = %to,
            skipped = skipped.len(),
            "wizard advanced"
        );
        Ok(StepOutcome::Moved { from, to, skipped })
    }

    /// Moves back to the nearest reachable step. Never validates.
    pub fn retreat(&self, session: &mut WizardSession) -> StepOutcome {
        let from = session.current;
        if session.status == SessionStatus::Submitted || from == WizardStep::FIRST {
            return StepOutcome::Stayed { step: from };
        }

        let to = next_reachable_step(&session.draft, from.index() - 1, Direction::Backward);
        let skipped = skipped_between(to, from);
        session.current = to;
        debug!(
            event_name = "wizard.step.retreated",
            session_id = %session.session_id,
            from = %from,
            to = %to,
            "wizard retreated"
        );
        StepOutcome::Moved { from, to, skipped }
    }

    pub fn advance_with_audit<S>(
        &self,
        session: &mut WizardSession,
        catalog: &WizardCatalog,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<StepOutcome, WizardError>
    where
        S: AuditSink,
    {
        let agent_id = session.draft.id.clone();
        let result = self.advance(session, catalog);
        let event = match &result {
            Ok(StepOutcome::Moved { from, to, skipped }) => AuditEvent::new(
                audit,
                "wizard.step.advanced",
                AuditCategory::Wizard,
                AuditOutcome::Success,
            )
            .with_metadata("from", from.as_str())
            .with_metadata("to", to.as_str())
            .with_metadata(
                "skipped",
                skipped.iter().map(|step| step.as_str()).collect::<Vec<_>>().join(","),
            ),
            Ok(StepOutcome::Stayed { step }) => AuditEvent::new(
                audit,
                "wizard.step.unchanged",
                AuditCategory::Wizard,
                AuditOutcome::Success,
            )
            .with_metadata("step", step.as_str()),
            Ok(StepOutcome::Submitted(descriptor)) => AuditEvent::new(
                audit,
                "wizard.session.submitted",
                AuditCategory::Submission,
                AuditOutcome::Success,
            )
            .with_metadata("agent_type", descriptor.agent_type.as_str())
            .with_metadata(
                "adopted_children",
                descriptor.link_plan.adopted_children.len().to_string(),
            ),
            Err(error @ WizardError::StepIncomplete { step, .. }) => AuditEvent::new(
                audit,
                "wizard.step.incomplete",
                AuditCategory::Wizard,
                AuditOutcome::Rejected,
            )
            .with_metadata("step", step.as_str())
            .with_metadata("error", error.to_string()),
            Err(error @ WizardError::InvariantViolations { issues }) => AuditEvent::new(
                audit,
                "wizard.validation.rejected",
                AuditCategory::Validation,
                AuditOutcome::Rejected,
            )
            .with_metadata("violations", issues.len().to_string())
            .with_metadata("error", error.to_string()),
            Err(error @ WizardError::SessionClosed(_)) => AuditEvent::new(
                audit,
                "wizard.session.closed",
                AuditCategory::Wizard,
                AuditOutcome::Failed,
            )
            .with_metadata("error", error.to_string()),
        };
        sink.emit(event.with_agent(agent_id));
        result
    }

    fn submit(
        &self,
        session: &mut WizardSession,
        catalog: &WizardCatalog,
    ) -> Result<StepOutcome, WizardError> {
        let draft = session.draft.clone();
        match build_descriptor(draft, catalog, &self.config) {
            Ok(descriptor) => {
                session.draft = AgentDraft::default();
                session.status = SessionStatus::Submitted;
                info!(
                    event_name = "wizard.session.submitted",
                    session_id = %session.session_id,
                    agent_type = descriptor.agent_type.as_str(),
                    role = ?descriptor.hierarchy.role,
                    "agent descriptor emitted"
                );
                Ok(StepOutcome::Submitted(Box::new(descriptor)))
            }
            Err(issues) => {
                warn!(
                    event_name = "wizard.validation.rejected",
                    session_id = %session.session_id,
                    violations = issues.len(),
                    "draft failed review validation"
                );
                Err(WizardError::InvariantViolations { issues })
            }
        }
    }
}

fn skipped_between(lower: WizardStep, upper: WizardStep) -> Vec<WizardStep> {
    WizardStep::ALL
        .into_iter()
        .filter(|step| step.index() > lower.index() && step.index() < upper.index())
        .collect()
}
