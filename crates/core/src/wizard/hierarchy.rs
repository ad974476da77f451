use crate::catalog::AgentCatalog;
use crate::config::WizardConfig;
use crate::domain::agent::{AgentDraft, AgentId, ChildAdoption, HierarchyLinkPlan};
use crate::wizard::steps::{hierarchy_reference_issues, FieldIssue};

/// Reference, existence and graph checks for a hierarchical draft.
pub fn hierarchy_issues(
    draft: &AgentDraft,
    agents: &AgentCatalog,
    config: &WizardConfig,
) -> Vec<FieldIssue> {
    let mut issues = Vec::new();
    let hierarchy = &draft.hierarchical_config;
    if !hierarchy.is_hierarchical {
        return issues;
    }

    hierarchy_reference_issues(draft, &mut issues);
    let own_id = draft.id.as_ref();

    if let Some(parent) = hierarchy.effective_parent() {
        if Some(parent) != own_id && !agents.contains(parent) {
            issues.push(FieldIssue::new("parentId", "not found"));
        }
    }
    for child in hierarchy.effective_children() {
        if Some(child) != own_id && !agents.contains(child) {
            issues.push(FieldIssue::new("childrenIds", format!("`{child}` not found")));
        }
    }

    if config.full_graph_checks && issues.is_empty() {
        graph_issues(draft, agents, config, &mut issues);
    }

    issues
}

fn graph_issues(
    draft: &AgentDraft,
    agents: &AgentCatalog,
    config: &WizardConfig,
    issues: &mut Vec<FieldIssue>,
) {
    let hierarchy = &draft.hierarchical_config;
    let ancestors = hierarchy.effective_parent().map(|parent| agents.ancestors(parent));

    if let Some(chain) = &ancestors {
        if chain.cyclic {
            issues.push(FieldIssue::new(
                "hierarchicalConfig",
                "existing hierarchy above the parent contains a cycle",
            ));
        }
        if let Some(own_id) = &draft.id {
            if chain.contains(own_id) {
                issues.push(FieldIssue::new("parentId", format!("cycle through `{own_id}`")));
            }
        }
        for child in hierarchy.effective_children() {
            if chain.contains(child) {
                issues.push(FieldIssue::new(
                    "childrenIds",
                    format!("`{child}` is an ancestor of the parent"),
                ));
            }
        }
    }

    let levels_above = ancestors.as_ref().map_or(0, |chain| chain.agents.len());
    let levels_below = hierarchy
        .effective_children()
        .map(|child| agents.subtree_height(child))
        .max()
        .unwrap_or(0);
    let depth = levels_above + 1 + levels_below;
    if depth > config.max_hierarchy_depth {
        issues.push(FieldIssue::new(
            "hierarchicalConfig",
            format!("depth {depth} exceeds maximum of {}", config.max_hierarchy_depth),
        ));
    }
}

/// Back-reference updates implied by the draft against the catalog snapshot.
pub fn link_plan(draft: &AgentDraft, agents: &AgentCatalog) -> HierarchyLinkPlan {
    let hierarchy = &draft.hierarchical_config;
    let adopted_children = hierarchy
        .effective_children()
        .map(|child| ChildAdoption {
            child_id: child.clone(),
            previous_parent: previous_parent(agents, child),
        })
        .collect();

    HierarchyLinkPlan { attach_to_parent: hierarchy.effective_parent().cloned(), adopted_children }
}

fn previous_parent(agents: &AgentCatalog, child: &AgentId) -> Option<AgentId> {
    agents.find(child).and_then(|entry| entry.parent_id.clone())
}
