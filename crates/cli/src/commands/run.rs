use std::collections::BTreeSet;
use std::path::PathBuf;

use omra_core::audit::{AuditContext, InMemoryAuditSink};
use omra_core::catalog::WizardCatalog;
use omra_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use omra_core::errors::{ApplicationError, DomainError};
use omra_core::wizard::{AgentCreationService, StepOutcome, WizardController, WizardError};
use serde_json::json;
use tracing::{info, warn};

use crate::commands::script;
use crate::commands::store::JsonStoreCreationService;
use crate::commands::CommandResult;

const COMMAND: &str = "run";

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    pub catalog: Option<PathBuf>,
    pub script: PathBuf,
    pub store: Option<PathBuf>,
    pub json: bool,
}

pub fn run(options: RunOptions) -> CommandResult {
    let overrides =
        ConfigOverrides { catalog_path: options.catalog.clone(), ..ConfigOverrides::default() };
    let config = match AppConfig::load(LoadOptions { overrides, ..LoadOptions::default() }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let catalog = match &config.catalog.path {
        Some(path) => match WizardCatalog::load(path) {
            Ok(catalog) => catalog,
            Err(error) => {
                let interface = ApplicationError::from(error).into_interface("catalog-load");
                return CommandResult::failure(COMMAND, "catalog", interface.to_string(), 3);
            }
        },
        None => WizardCatalog::default(),
    };

    let updates = match script::load(&options.script) {
        Ok(updates) => updates,
        Err(error) => return CommandResult::failure(COMMAND, "script", format!("{error:#}"), 3),
    };

    let taken = catalog.agents.entries().map(|entry| entry.id.clone()).collect::<BTreeSet<_>>();
    let service = match JsonStoreCreationService::open(options.store.as_deref(), taken) {
        Ok(service) => service,
        Err(error) => {
            let interface = ApplicationError::from(error).into_interface("store-open");
            return CommandResult::failure(COMMAND, "creation", interface.to_string(), 5);
        }
    };

    let controller = WizardController::new(config.wizard);
    let mut session = controller.start_with_service(&service);
    let session_id = session.session_id().to_owned();
    let audit = AuditContext::new(Some(session_id.clone()), session_id.clone(), "omra-cli");
    let sink = InMemoryAuditSink::default();

    for update in &updates {
        if let Err(error) = session.update_field(&update.field, update.value.clone()) {
            let interface =
                ApplicationError::from(DomainError::from(error)).into_interface(&session_id);
            return CommandResult::failure(COMMAND, "draft_update", interface.to_string(), 4);
        }
    }

    let mut visited = vec![session.current_step()];
    let descriptor = loop {
        match controller.advance_with_audit(&mut session, &catalog, &sink, &audit) {
            Ok(StepOutcome::Moved { to, .. }) => visited.push(to),
            Ok(StepOutcome::Submitted(descriptor)) => break *descriptor,
            Ok(StepOutcome::Stayed { step }) => {
                return CommandResult::failure(
                    COMMAND,
                    "wizard",
                    format!("wizard stopped advancing at {step}"),
                    4,
                );
            }
            Err(error) => {
                warn!(
                    event_name = "cli.run.rejected",
                    session_id = %session_id,
                    step = %session.current_step(),
                    "scripted draft was rejected"
                );
                return rejection(&session_id, error, session.current_step().as_str());
            }
        }
    };

    let agent_type = descriptor.agent_type.as_str();
    let details = options.json.then(|| {
        json!({
            "descriptor": &descriptor,
            "steps": &visited,
            "auditEvents": sink.events(),
        })
    });

    match service.create(descriptor.clone()) {
        Ok(agent_id) => {
            info!(
                event_name = "cli.run.created",
                session_id = %session_id,
                agent_id = %agent_id,
                agent_type,
                "agent descriptor handed to store"
            );
            let path = visited.iter().map(|step| step.as_str()).collect::<Vec<_>>().join(" -> ");
            CommandResult::success_with_details(
                COMMAND,
                format!("created agent `{agent_id}` ({agent_type}) via {path}"),
                details,
            )
        }
        Err(error) => {
            let interface = ApplicationError::from(error).into_interface(&session_id);
            CommandResult::failure(COMMAND, "creation", interface.to_string(), 5)
        }
    }
}

fn rejection(session_id: &str, error: WizardError, step: &str) -> CommandResult {
    let error_class = match &error {
        WizardError::StepIncomplete { .. } => "step_incomplete",
        WizardError::InvariantViolations { .. } => "invariant_violation",
        WizardError::SessionClosed(_) => "session_closed",
    };
    let details = json!({ "step": step, "issues": error.issues() });
    let interface = ApplicationError::from(DomainError::from(error)).into_interface(session_id);
    CommandResult::failure_with_details(
        COMMAND,
        error_class,
        interface.to_string(),
        4,
        Some(details),
    )
}
