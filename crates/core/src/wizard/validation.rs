use std::collections::BTreeSet;

use chrono::Utc;

use crate::catalog::WizardCatalog;
use crate::config::WizardConfig;
use crate::domain::agent::{
    AgentDescriptor, AgentDraft, FineTuningMethod, HierarchyPlacement, ModelSelection,
};
use crate::wizard::hierarchy::{hierarchy_issues, link_plan};
use crate::wizard::steps::{fine_tuning_issues, model_issues, FieldIssue};

/// Full-draft invariants checked at the review gate. Returns every violation.
pub fn validate_draft(
    draft: &AgentDraft,
    catalog: &WizardCatalog,
    config: &WizardConfig,
) -> Vec<FieldIssue> {
    let mut issues = Vec::new();

    match draft.agent_type {
        None => issues.push(FieldIssue::new("type", "required")),
        Some(agent_type) => {
            if agent_type.requires_channel() && draft.channel_config.is_none() {
                issues.push(FieldIssue::new(
                    "channelConfig",
                    format!("required for {} agents", agent_type.as_str()),
                ));
            }
        }
    }

    let min_length = config.effective_min_name_length();
    if draft.name_length() < min_length {
        issues.push(FieldIssue::new("name", format!("must be at least {min_length} characters")));
    }

    validate_model(draft, catalog, config, &mut issues);
    validate_knowledge(draft, catalog, &mut issues);
    validate_fine_tuning(draft, catalog, config, &mut issues);
    issues.extend(hierarchy_issues(draft, &catalog.agents, config));

    issues
}

fn validate_model(
    draft: &AgentDraft,
    catalog: &WizardCatalog,
    config: &WizardConfig,
    issues: &mut Vec<FieldIssue>,
) {
    let before = issues.len();
    model_issues(draft, issues);
    if issues.len() > before {
        return;
    }

    match selected_model(draft) {
        Some(ModelSelection::Catalog { model_id }) => {
            if config.require_known_models
                && !catalog.models.is_empty()
                && catalog.models.find(&model_id).is_none()
            {
                issues.push(FieldIssue::new("modelId", "not found"));
            }
        }
        Some(ModelSelection::Custom(endpoint)) => {
            let url = endpoint.url.trim();
            if !url.starts_with("http://") && !url.starts_with("https://") {
                issues.push(FieldIssue::new(
                    "customEndpoint",
                    "url must start with http:// or https://",
                ));
            }
        }
        None => issues.push(FieldIssue::new("modelId", "required")),
    }
}

fn validate_knowledge(draft: &AgentDraft, catalog: &WizardCatalog, issues: &mut Vec<FieldIssue>) {
    let rag = &draft.rag_config;
    if !rag.enabled {
        return;
    }

    if rag.sources.is_empty() {
        issues.push(FieldIssue::new("sources", "must not be empty"));
    }

    let mut seen = BTreeSet::new();
    for source in &rag.sources {
        if !seen.insert(source.id.as_str()) {
            issues.push(FieldIssue::new("sources", format!("duplicate source `{}`", source.id)));
            continue;
        }
        if !catalog.knowledge_sources.is_empty()
            && catalog.knowledge_sources.find(&source.id).is_none()
        {
            issues.push(FieldIssue::new("sources", format!("source `{}` not found", source.id)));
        }
    }

    if rag.chunk_size == 0 {
        issues.push(FieldIssue::new("chunkSize", "must be greater than zero"));
    } else if rag.chunk_overlap >= rag.chunk_size {
        issues.push(FieldIssue::new("chunkOverlap", "must be smaller than chunkSize"));
    }
}

fn validate_fine_tuning(
    draft: &AgentDraft,
    catalog: &WizardCatalog,
    config: &WizardConfig,
    issues: &mut Vec<FieldIssue>,
) {
    let fine_tuning = &draft.fine_tuning_config;
    if !fine_tuning.enabled {
        return;
    }

    let before = issues.len();
    fine_tuning_issues(draft, issues);
    if issues.len() > before {
        return;
    }

    match fine_tuning.method {
        FineTuningMethod::Existing => {
            let known = fine_tuning
                .fine_tuned_model_id
                .as_deref()
                .is_some_and(|id| catalog.models.find(id).is_some());
            if config.require_known_models && !catalog.models.is_empty() && !known {
                issues.push(FieldIssue::new("fineTunedModelId", "not found"));
            }
        }
        FineTuningMethod::Train => {
            if fine_tuning.epochs == 0 {
                issues.push(FieldIssue::new("epochs", "must be greater than zero"));
            }
            if fine_tuning.batch_size == 0 {
                issues.push(FieldIssue::new("batchSize", "must be greater than zero"));
            }
            if !(fine_tuning.learning_rate.is_finite() && fine_tuning.learning_rate > 0.0) {
                issues.push(FieldIssue::new("learningRate", "must be a positive number"));
            }
        }
    }
}

/// A non-empty model id wins over a custom endpoint.
fn selected_model(draft: &AgentDraft) -> Option<ModelSelection> {
    if let Some(model_id) = draft.model_id.as_deref().map(str::trim).filter(|id| !id.is_empty()) {
        return Some(ModelSelection::Catalog { model_id: model_id.to_owned() });
    }
    draft
        .custom_endpoint
        .as_ref()
        .filter(|endpoint| endpoint.is_usable())
        .cloned()
        .map(ModelSelection::Custom)
}

/// Validates and converts the draft in one step. Nothing is produced unless
/// every invariant holds.
pub fn build_descriptor(
    draft: AgentDraft,
    catalog: &WizardCatalog,
    config: &WizardConfig,
) -> Result<AgentDescriptor, Vec<FieldIssue>> {
    let issues = validate_draft(&draft, catalog, config);
    if !issues.is_empty() {
        return Err(issues);
    }

    let (Some(agent_type), Some(model)) = (draft.agent_type, selected_model(&draft)) else {
        return Err(vec![FieldIssue::new("type", "required")]);
    };

    let link_plan = link_plan(&draft, &catalog.agents);
    let hierarchy = &draft.hierarchical_config;
    let placement = if hierarchy.is_hierarchical {
        HierarchyPlacement {
            role: hierarchy.role,
            parent_id: hierarchy.effective_parent().cloned(),
            children_ids: hierarchy.effective_children().cloned().collect(),
        }
    } else {
        HierarchyPlacement::default()
    };

    let channel_config =
        if agent_type.requires_channel() { draft.channel_config } else { None };

    Ok(AgentDescriptor {
        id: draft.id,
        name: draft.name.trim().to_owned(),
        description: draft.description,
        agent_type,
        model,
        channel_config,
        rag_config: draft.rag_config,
        fine_tuning_config: draft.fine_tuning_config,
        hierarchy: placement,
        link_plan,
        system_prompt: draft.system_prompt,
        tools: draft.tools,
        capabilities: draft.capabilities,
        metadata: draft.metadata,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::{build_descriptor, validate_draft};
    use crate::catalog::{
        AgentCatalog, AgentCatalogEntry, KnowledgeSourceCatalog, KnowledgeSourceEntry,
        ModelCatalog, ModelCatalogEntry, WizardCatalog,
    };
    use crate::config::WizardConfig;
    use crate::domain::agent::{
        AgentDraft, AgentId, AgentType, ChannelConfig, CustomEndpoint, FineTuningMethod,
        HierarchyRole, ModelSelection, SourceRef,
    };

    fn catalog() -> WizardCatalog {
        WizardCatalog {
            agents: AgentCatalog::new(vec![AgentCatalogEntry {
                id: AgentId::from("agent-2"),
                name: "Scheduler".to_owned(),
                role: HierarchyRole::Child,
                parent_id: None,
                children_ids: Vec::new(),
            }])
            .expect("agents"),
            models: ModelCatalog::new(vec![
                ModelCatalogEntry {
                    id: "gpt-4o".to_owned(),
                    name: "GPT-4o".to_owned(),
                    provider: Some("openai".to_owned()),
                    fine_tuned: false,
                },
                ModelCatalogEntry {
                    id: "ft-dispatch-v2".to_owned(),
                    name: "Dispatch v2".to_owned(),
                    provider: Some("openai".to_owned()),
                    fine_tuned: true,
                },
            ]),
            knowledge_sources: KnowledgeSourceCatalog::new(vec![KnowledgeSourceEntry {
                id: "kb-manuals".to_owned(),
                name: "Appliance manuals".to_owned(),
                source_type: Some("file".to_owned()),
                location: None,
            }]),
        }
    }

    fn chat_draft() -> AgentDraft {
        AgentDraft {
            name: "Front Desk".to_owned(),
            agent_type: Some(AgentType::Chat),
            model_id: Some("gpt-4o".to_owned()),
            channel_config: Some(ChannelConfig::Chat { settings: Map::new() }),
            ..AgentDraft::default()
        }
    }

    #[test]
    fn complete_draft_has_no_violations() {
        assert!(validate_draft(&chat_draft(), &catalog(), &WizardConfig::default()).is_empty());
    }

    #[test]
    fn every_violation_is_reported_at_once() {
        let mut draft = chat_draft();
        draft.name = "X".to_owned();
        draft.channel_config = None;
        draft.model_id = Some("gpt-7".to_owned());
        draft.rag_config.enabled = true;

        let issues = validate_draft(&draft, &catalog(), &WizardConfig::default());
        let fields = issues.iter().map(|issue| issue.field.as_str()).collect::<Vec<_>>();
        assert_eq!(fields, vec!["channelConfig", "name", "modelId", "sources"]);
        assert_eq!(issues[2].reason, "not found");
    }

    #[test]
    fn unknown_models_pass_when_catalog_is_empty_or_lenient() {
        let mut draft = chat_draft();
        draft.model_id = Some("local-llama".to_owned());

        let empty = WizardCatalog::default();
        assert!(validate_draft(&draft, &empty, &WizardConfig::default()).is_empty());

        let lenient = WizardConfig { require_known_models: false, ..WizardConfig::default() };
        assert!(validate_draft(&draft, &catalog(), &lenient).is_empty());
    }

    #[test]
    fn knowledge_sources_are_checked_for_duplicates_and_existence() {
        let mut draft = chat_draft();
        draft.rag_config.enabled = true;
        draft.rag_config.chunk_overlap = 300;
        draft.rag_config.sources = vec![
            SourceRef { id: "kb-manuals".to_owned(), name: None },
            SourceRef { id: "kb-manuals".to_owned(), name: None },
            SourceRef { id: "kb-pricing".to_owned(), name: None },
        ];

        let issues = validate_draft(&draft, &catalog(), &WizardConfig::default());
        let reasons = issues.iter().map(|issue| issue.reason.as_str()).collect::<Vec<_>>();
        assert_eq!(
            reasons,
            vec![
                "duplicate source `kb-manuals`",
                "source `kb-pricing` not found",
                "must be smaller than chunkSize"
            ]
        );
    }

    #[test]
    fn fine_tuning_hyperparameters_are_checked_for_training() {
        let mut draft = chat_draft();
        draft.fine_tuning_config.enabled = true;
        draft.fine_tuning_config.method = FineTuningMethod::Train;
        draft.fine_tuning_config.training_examples.push(crate::domain::agent::TrainingExample {
            input: "Washer leaking".to_owned(),
            output: "Book a technician visit".to_owned(),
        });
        draft.fine_tuning_config.epochs = 0;
        draft.fine_tuning_config.learning_rate = f64::NAN;

        let issues = validate_draft(&draft, &catalog(), &WizardConfig::default());
        let fields = issues.iter().map(|issue| issue.field.as_str()).collect::<Vec<_>>();
        assert_eq!(fields, vec!["epochs", "learningRate"]);
    }

    #[test]
    fn existing_fine_tuned_model_must_be_known() {
        let mut draft = chat_draft();
        draft.fine_tuning_config.enabled = true;
        draft.fine_tuning_config.fine_tuned_model_id = Some("ft-missing".to_owned());

        let issues = validate_draft(&draft, &catalog(), &WizardConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "fineTunedModelId");

        draft.fine_tuning_config.fine_tuned_model_id = Some("ft-dispatch-v2".to_owned());
        assert!(validate_draft(&draft, &catalog(), &WizardConfig::default()).is_empty());
    }

    #[test]
    fn custom_endpoint_requires_http_scheme() {
        let mut draft = chat_draft();
        draft.model_id = None;
        draft.custom_endpoint = Some(CustomEndpoint {
            url: "ftp://models.local".to_owned(),
            api_key: None,
            model_name: "mixtral".to_owned(),
        });

        let issues = validate_draft(&draft, &catalog(), &WizardConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "customEndpoint");
    }

    #[test]
    fn descriptor_normalizes_irrelevant_configuration() {
        let mut draft = chat_draft();
        draft.agent_type = Some(AgentType::General);
        draft.hierarchical_config.role = HierarchyRole::Child;
        draft.hierarchical_config.parent_id = Some(AgentId::from("agent-2"));
        draft.metadata.insert("team".to_owned(), json!("dispatch"));

        let descriptor =
            build_descriptor(draft, &catalog(), &WizardConfig::default()).expect("descriptor");

        assert!(descriptor.channel_config.is_none());
        assert_eq!(descriptor.hierarchy.role, HierarchyRole::Standalone);
        assert!(descriptor.hierarchy.parent_id.is_none());
        assert!(descriptor.link_plan.is_empty());
        assert!(matches!(
            descriptor.model,
            ModelSelection::Catalog { ref model_id } if model_id == "gpt-4o"
        ));
        assert_eq!(descriptor.metadata.get("team"), Some(&json!("dispatch")));
    }

    #[test]
    fn invalid_draft_produces_no_descriptor() {
        let mut draft = chat_draft();
        draft.hierarchical_config.is_hierarchical = true;
        draft.hierarchical_config.role = HierarchyRole::Child;
        draft.hierarchical_config.parent_id = Some(AgentId::from("agent-9"));

        let issues = build_descriptor(draft, &catalog(), &WizardConfig::default())
            .expect_err("dangling parent must reject");
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "parentId");
        assert_eq!(issues[0].reason, "not found");
    }
}
