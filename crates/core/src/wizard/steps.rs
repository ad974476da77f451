use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::WizardConfig;
use crate::domain::agent::{AgentDraft, FineTuningMethod};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Type,
    Basics,
    Model,
    Channel,
    Knowledge,
    FineTuning,
    Hierarchy,
    Review,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// One missing or inconsistent draft field, with a user-facing reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIssue {
    pub field: String,
    pub reason: String,
}

impl FieldIssue {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { field: field.into(), reason: reason.into() }
    }
}

impl fmt::Display for FieldIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

impl WizardStep {
    pub const ALL: [WizardStep; 8] = [
        WizardStep::Type,
        WizardStep::Basics,
        WizardStep::Model,
        WizardStep::Channel,
        WizardStep::Knowledge,
        WizardStep::FineTuning,
        WizardStep::Hierarchy,
        WizardStep::Review,
    ];

    pub const FIRST: WizardStep = WizardStep::Type;
    pub const LAST: WizardStep = WizardStep::Review;

    pub fn index(self) -> usize {
        self as usize
    }

    /// Step at `index`, clamped into the valid range.
    pub fn at(index: usize) -> WizardStep {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Type => "type",
            Self::Basics => "basics",
            Self::Model => "model",
            Self::Channel => "channel",
            Self::Knowledge => "knowledge",
            Self::FineTuning => "fine_tuning",
            Self::Hierarchy => "hierarchy",
            Self::Review => "review",
        }
    }

    pub fn is_optional(self) -> bool {
        matches!(self, Self::Channel | Self::Knowledge | Self::FineTuning | Self::Hierarchy)
    }

    pub fn is_skippable(self, draft: &AgentDraft) -> bool {
        if !self.is_optional() {
            return false;
        }
        match self {
            Self::Channel => {
                draft.agent_type.is_some_and(|agent_type| !agent_type.requires_channel())
            }
            Self::Knowledge => !draft.rag_config.enabled,
            Self::FineTuning => !draft.fine_tuning_config.enabled,
            Self::Hierarchy => !draft.hierarchical_config.is_hierarchical,
            Self::Type | Self::Basics | Self::Model | Self::Review => false,
        }
    }

    /// Fields this step still needs before the wizard may move past it.
    /// Catalog lookups are deferred to the review gate.
    pub fn missing_fields(self, draft: &AgentDraft, config: &WizardConfig) -> Vec<FieldIssue> {
        let mut issues = Vec::new();
        match self {
            Self::Type => {
                if draft.agent_type.is_none() {
                    issues.push(FieldIssue::new("type", "required"));
                }
            }
            Self::Basics => {
                let min_length = config.effective_min_name_length();
                if draft.name_length() < min_length {
                    issues.push(FieldIssue::new(
                        "name",
                        format!("must be at least {min_length} characters"),
                    ));
                }
            }
            Self::Model => model_issues(draft, &mut issues),
            Self::Channel => {
                if let Some(agent_type) = draft.agent_type {
                    if agent_type.requires_channel() && draft.channel_config.is_none() {
                        issues.push(FieldIssue::new(
                            "channelConfig",
                            format!("required for {} agents", agent_type.as_str()),
                        ));
                    }
                }
            }
            Self::Knowledge => {
                if draft.rag_config.enabled && draft.rag_config.sources.is_empty() {
                    issues.push(FieldIssue::new("sources", "must not be empty"));
                }
            }
            Self::FineTuning => fine_tuning_issues(draft, &mut issues),
            Self::Hierarchy => hierarchy_reference_issues(draft, &mut issues),
            Self::Review => {}
        }
        issues
    }

    pub fn is_complete(self, draft: &AgentDraft, config: &WizardConfig) -> bool {
        self.missing_fields(draft, config).is_empty()
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// First step at or beyond `start` in `direction` that is not skippable.
/// Clamped to the step range, so it always terminates.
pub fn next_reachable_step(draft: &AgentDraft, start: usize, direction: Direction) -> WizardStep {
    let last = WizardStep::ALL.len() - 1;
    let mut index = start.min(last);

    loop {
        let step = WizardStep::at(index);
        if !step.is_skippable(draft) {
            return step;
        }
        match direction {
            Direction::Forward if index < last => index += 1,
            Direction::Backward if index > 0 => index -= 1,
            _ => return step,
        }
    }
}

pub(crate) fn model_issues(draft: &AgentDraft, issues: &mut Vec<FieldIssue>) {
    if draft.model_id.as_deref().is_some_and(|id| !id.trim().is_empty()) {
        return;
    }
    match &draft.custom_endpoint {
        Some(endpoint) => {
            if endpoint.url.trim().is_empty() {
                issues.push(FieldIssue::new("customEndpoint", "url is required"));
            }
            if endpoint.model_name.trim().is_empty() {
                issues.push(FieldIssue::new("customEndpoint", "model name is required"));
            }
        }
        None => issues.push(FieldIssue::new(
            "modelId",
            "select a model or configure a custom endpoint",
        )),
    }
}

pub(crate) fn fine_tuning_issues(draft: &AgentDraft, issues: &mut Vec<FieldIssue>) {
    let config = &draft.fine_tuning_config;
    if !config.enabled {
        return;
    }
    match config.method {
        FineTuningMethod::Existing => {
            if config.fine_tuned_model_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
                issues.push(FieldIssue::new("fineTunedModelId", "required"));
            }
        }
        FineTuningMethod::Train => {
            if config.training_examples.is_empty() {
                issues.push(FieldIssue::new("trainingExamples", "must not be empty"));
            }
        }
    }
}

/// Presence, self-reference and overlap rules for the selected role.
pub(crate) fn hierarchy_reference_issues(draft: &AgentDraft, issues: &mut Vec<FieldIssue>) {
    let hierarchy = &draft.hierarchical_config;
    if !hierarchy.is_hierarchical {
        return;
    }
    let own_id = draft.id.as_ref();

    if hierarchy.role.requires_parent() {
        match &hierarchy.parent_id {
            None => issues.push(FieldIssue::new("parentId", "required")),
            Some(parent) if Some(parent) == own_id => {
                issues.push(FieldIssue::new("parentId", "self reference"));
            }
            Some(_) => {}
        }
    }

    if hierarchy.role.requires_children() {
        if hierarchy.children_ids.is_empty() {
            issues.push(FieldIssue::new("childrenIds", "must not be empty"));
        }
        if own_id.is_some_and(|id| hierarchy.children_ids.contains(id)) {
            issues.push(FieldIssue::new("childrenIds", "self reference"));
        }
        if let Some(parent) = hierarchy.effective_parent() {
            if hierarchy.children_ids.contains(parent) {
                issues.push(FieldIssue::new("childrenIds", format!("contains parent `{parent}`")));
            }
        }
    }
}
