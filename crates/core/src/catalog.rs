use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::agent::{AgentId, HierarchyRole};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCatalogEntry {
    pub id: AgentId,
    pub name: String,
    #[serde(default)]
    pub role: HierarchyRole,
    #[serde(default)]
    pub parent_id: Option<AgentId>,
    #[serde(default)]
    pub children_ids: Vec<AgentId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCatalogEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub fine_tuned: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeSourceEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub source_type: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

/// Ancestors of an agent, nearest first, as far as the snapshot can resolve them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AncestorChain {
    pub agents: Vec<AgentId>,
    /// The parent links loop back on themselves somewhere above the start.
    pub cyclic: bool,
}

impl AncestorChain {
    pub fn contains(&self, id: &AgentId) -> bool {
        self.agents.contains(id)
    }
}

/// Read-only snapshot of existing agents, keyed by id.
#[derive(Clone, Debug, Default)]
pub struct AgentCatalog {
    entries: BTreeMap<AgentId, AgentCatalogEntry>,
}

impl AgentCatalog {
    pub fn new(entries: Vec<AgentCatalogEntry>) -> Result<Self, CatalogError> {
        let mut indexed = BTreeMap::new();
        for entry in entries {
            let id = entry.id.clone();
            if indexed.insert(id.clone(), entry).is_some() {
                return Err(CatalogError::DuplicateAgent(id));
            }
        }
        Ok(Self { entries: indexed })
    }

    pub fn find(&self, id: &AgentId) -> Option<&AgentCatalogEntry> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &AgentCatalogEntry> {
        self.entries.values()
    }

    /// Walks `parentId` links upward starting at `start` (inclusive). Dangling
    /// links end the walk; revisiting an agent marks the chain cyclic.
    pub fn ancestors(&self, start: &AgentId) -> AncestorChain {
        let mut chain = AncestorChain::default();
        let mut visited = BTreeSet::new();
        let mut current = Some(start.clone());

        while let Some(id) = current {
            if !visited.insert(id.clone()) {
                chain.cyclic = true;
                break;
            }
            let Some(entry) = self.entries.get(&id) else {
                break;
            };
            chain.agents.push(id);
            current = entry.parent_id.clone();
        }

        chain
    }

    /// Number of levels in the subtree rooted at `root`, counting `root` itself.
    /// Unknown agents count as a single level.
    pub fn subtree_height(&self, root: &AgentId) -> usize {
        let mut visited = BTreeSet::new();
        let mut stack = vec![(root, 1usize)];
        let mut height = 0;
        while let Some((id, depth)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            height = height.max(depth);
            if let Some(entry) = self.entries.get(id) {
                // reversed so children are walked in listed order
                stack.extend(entry.children_ids.iter().rev().map(|child| (child, depth + 1)));
            }
        }
        height
    }

    /// Parent and child links in the snapshot that do not point back at each other.
    pub fn link_inconsistencies(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for entry in self.entries.values() {
            if let Some(parent) = &entry.parent_id {
                match self.entries.get(parent) {
                    None => {
                        problems.push(format!("`{}` names missing parent `{parent}`", entry.id));
                    }
                    Some(found) if !found.children_ids.contains(&entry.id) => {
                        problems.push(format!("`{parent}` does not list child `{}`", entry.id));
                    }
                    Some(_) => {}
                }
            }
            for child in &entry.children_ids {
                match self.entries.get(child) {
                    None => {
                        problems.push(format!("`{}` names missing child `{child}`", entry.id));
                    }
                    Some(found) if found.parent_id.as_ref() != Some(&entry.id) => {
                        problems.push(format!("`{child}` does not point back to `{}`", entry.id));
                    }
                    Some(_) => {}
                }
            }
        }
        problems
    }

}

#[derive(Clone, Debug, Default)]
pub struct ModelCatalog {
    entries: Vec<ModelCatalogEntry>,
}

impl ModelCatalog {
    pub fn new(entries: Vec<ModelCatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn find(&self, id: &str) -> Option<&ModelCatalogEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Debug, Default)]
pub struct KnowledgeSourceCatalog {
    entries: Vec<KnowledgeSourceEntry>,
}

impl KnowledgeSourceCatalog {
    pub fn new(entries: Vec<KnowledgeSourceEntry>) -> Self {
        Self { entries }
    }

    pub fn find(&self, id: &str) -> Option<&KnowledgeSourceEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything the wizard looks up during one session. Immutable once built.
#[derive(Clone, Debug, Default)]
pub struct WizardCatalog {
    pub agents: AgentCatalog,
    pub models: ModelCatalog,
    pub knowledge_sources: KnowledgeSourceCatalog,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("could not read catalog file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("agent `{0}` appears more than once in the catalog")]
    DuplicateAgent(AgentId),
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogDocument {
    #[serde(default)]
    agents: Vec<AgentCatalogEntry>,
    #[serde(default)]
    models: Vec<ModelCatalogEntry>,
    #[serde(default)]
    knowledge_sources: Vec<KnowledgeSourceEntry>,
}

impl WizardCatalog {
    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let document = serde_json::from_str::<CatalogDocument>(raw)?;
        Ok(Self {
            agents: AgentCatalog::new(document.agents)?,
            models: ModelCatalog::new(document.models),
            knowledge_sources: KnowledgeSourceCatalog::new(document.knowledge_sources),
        })
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| CatalogError::ReadFile { path: path.to_path_buf(), source })?;
        Self::from_json_str(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::{AgentCatalog, AgentCatalogEntry, CatalogError, WizardCatalog};
    use crate::domain::agent::{AgentId, HierarchyRole};

    fn entry(id: &str, parent: Option<&str>, children: &[&str]) -> AgentCatalogEntry {
        AgentCatalogEntry {
            id: AgentId::from(id),
            name: id.to_uppercase(),
            role: HierarchyRole::Hybrid,
            parent_id: parent.map(AgentId::from),
            children_ids: children.iter().copied().map(AgentId::from).collect(),
        }
    }

    #[test]
    fn ancestors_walk_up_until_root() {
        let catalog = AgentCatalog::new(vec![
            entry("root", None, &["mid"]),
            entry("mid", Some("root"), &["leaf"]),
            entry("leaf", Some("mid"), &[]),
        ])
        .expect("catalog");

        let chain = catalog.ancestors(&AgentId::from("leaf"));
        assert_eq!(
            chain.agents,
            vec![AgentId::from("leaf"), AgentId::from("mid"), AgentId::from("root")]
        );
        assert!(!chain.cyclic);
        assert_eq!(catalog.subtree_height(&AgentId::from("root")), 3);
        assert!(catalog.link_inconsistencies().is_empty());
    }

    #[test]
    fn malformed_parent_loop_terminates() {
        let catalog = AgentCatalog::new(vec![
            entry("a", Some("b"), &["b"]),
            entry("b", Some("a"), &["a"]),
        ])
        .expect("catalog");

        let chain = catalog.ancestors(&AgentId::from("a"));
        assert!(chain.cyclic);
        assert_eq!(chain.agents.len(), 2);
        assert_eq!(catalog.subtree_height(&AgentId::from("a")), 2);
    }

    #[test]
    fn dangling_parent_ends_the_walk() {
        let catalog =
            AgentCatalog::new(vec![entry("orphan", Some("ghost"), &[])]).expect("catalog");

        let chain = catalog.ancestors(&AgentId::from("orphan"));
        assert_eq!(chain.agents, vec![AgentId::from("orphan")]);
        assert!(!chain.cyclic);
        assert_eq!(catalog.link_inconsistencies(), vec!["`orphan` names missing parent `ghost`"]);
    }

    #[test]
    fn subtree_height_handles_deep_chains() {
        let depth = 10_000;
        let ids: Vec<String> = (0..depth).map(|index| format!("agent-{index}")).collect();
        let entries = ids
            .iter()
            .enumerate()
            .map(|(index, id)| {
                let parent = index.checked_sub(1).map(|previous| ids[previous].as_str());
                let child = ids.get(index + 1).map(String::as_str);
                entry(id, parent, child.as_slice())
            })
            .collect();
        let catalog = AgentCatalog::new(entries).expect("catalog");

        assert_eq!(catalog.subtree_height(&AgentId::from("agent-0")), depth);
        assert_eq!(catalog.subtree_height(&AgentId::from("agent-9999")), 1);
        assert_eq!(catalog.subtree_height(&AgentId::from("unknown")), 1);
    }

    #[test]
    fn subtree_height_takes_the_deepest_branch() {
        let catalog = AgentCatalog::new(vec![
            entry("root", None, &["short", "long"]),
            entry("short", Some("root"), &[]),
            entry("long", Some("root"), &["leaf"]),
            entry("leaf", Some("long"), &[]),
        ])
        .expect("catalog");

        assert_eq!(catalog.subtree_height(&AgentId::from("root")), 3);
    }

    #[test]
    fn duplicate_agent_ids_are_rejected() {
        let error = AgentCatalog::new(vec![entry("a", None, &[]), entry("a", None, &[])])
            .expect_err("duplicate ids");
        assert!(matches!(error, CatalogError::DuplicateAgent(ref id) if id.as_str() == "a"));
    }

    #[test]
    fn json_snapshot_parses_camel_case_fields() {
        let catalog = WizardCatalog::from_json_str(
            r#"{
                "agents": [
                    {
                        "id": "agent-1", "name": "Dispatcher",
                        "role": "parent", "childrenIds": ["agent-2"]
                    },
                    {"id": "agent-2", "name": "Scheduler", "role": "child", "parentId": "agent-1"}
                ],
                "models": [{"id": "gpt-4o", "name": "GPT-4o", "provider": "openai"}],
                "knowledgeSources": [{"id": "kb-manuals", "name": "Appliance manuals"}]
            }"#,
        )
        .expect("catalog json");

        assert_eq!(catalog.agents.len(), 2);
        assert_eq!(
            catalog.agents.find(&AgentId::from("agent-2")).and_then(|e| e.parent_id.clone()),
            Some(AgentId::from("agent-1"))
        );
        assert!(catalog.models.find("gpt-4o").is_some());
        assert!(catalog.knowledge_sources.find("kb-manuals").is_some());
    }
}
