use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Chat,
    Email,
    Voice,
    General,
    Knowledge,
    Conversations,
    Code,
}

impl AgentType {
    /// General agents are not bound to a delivery channel.
    pub fn requires_channel(self) -> bool {
        !matches!(self, Self::General)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Email => "email",
            Self::Voice => "voice",
            Self::General => "general",
            Self::Knowledge => "knowledge",
            Self::Conversations => "conversations",
            Self::Code => "code",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HierarchyRole {
    #[default]
    Standalone,
    Parent,
    Child,
    Hybrid,
}

impl HierarchyRole {
    pub fn requires_parent(self) -> bool {
        matches!(self, Self::Child | Self::Hybrid)
    }

    pub fn requires_children(self) -> bool {
        matches!(self, Self::Parent | Self::Hybrid)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Reasoning,
    QuestionAnswering,
    Summarization,
    Classification,
    CodeGeneration,
    Translation,
    DataAnalysis,
    CreativeWriting,
    Conversation,
}

/// Self-hosted or third-party model reachable over HTTP.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEndpoint {
    pub url: String,
    #[serde(serialize_with = "redact_secret")]
    pub api_key: Option<SecretString>,
    pub model_name: String,
}

impl CustomEndpoint {
    pub fn is_usable(&self) -> bool {
        !self.url.trim().is_empty() && !self.model_name.trim().is_empty()
    }
}

fn redact_secret<S>(value: &Option<SecretString>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(_) => serializer.serialize_some("<redacted>"),
        None => serializer.serialize_none(),
    }
}

/// Channel settings are shaped by the channel integration; only presence matters here.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChannelConfig {
    Chat {
        #[serde(default)]
        settings: Map<String, Value>,
    },
    Email {
        #[serde(default)]
        settings: Map<String, Value>,
    },
    Voice {
        #[serde(default)]
        settings: Map<String, Value>,
    },
    Custom {
        #[serde(default)]
        settings: Map<String, Value>,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkingStrategy {
    FixedSize,
    Recursive,
    Semantic,
    Paragraph,
    Sentence,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RagConfig {
    pub enabled: bool,
    pub sources: Vec<SourceRef>,
    pub embedding_model: Option<String>,
    pub chunking_strategy: Option<ChunkingStrategy>,
    pub chunk_size: u32,
    pub chunk_overlap: u32,
    pub hybrid_search: bool,
    pub reranking: bool,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sources: Vec::new(),
            embedding_model: None,
            chunking_strategy: None,
            chunk_size: 300,
            chunk_overlap: 50,
            hybrid_search: false,
            reranking: false,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FineTuningMethod {
    #[default]
    Existing,
    Train,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub input: String,
    pub output: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FineTuningConfig {
    pub enabled: bool,
    pub method: FineTuningMethod,
    pub fine_tuned_model_id: Option<String>,
    pub training_examples: Vec<TrainingExample>,
    pub learning_rate: f64,
    pub epochs: u32,
    pub batch_size: u32,
}

impl Default for FineTuningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: FineTuningMethod::Existing,
            fine_tuned_model_id: None,
            training_examples: Vec::new(),
            learning_rate: 2e-5,
            epochs: 3,
            batch_size: 8,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchicalConfig {
    pub is_hierarchical: bool,
    pub role: HierarchyRole,
    pub parent_id: Option<AgentId>,
    pub children_ids: BTreeSet<AgentId>,
}

impl HierarchicalConfig {
    /// Parent reference that matters for the selected role, if any.
    pub fn effective_parent(&self) -> Option<&AgentId> {
        if self.is_hierarchical && self.role.requires_parent() {
            self.parent_id.as_ref()
        } else {
            None
        }
    }

    /// Child references that matter for the selected role.
    pub fn effective_children(&self) -> impl Iterator<Item = &AgentId> {
        let relevant = self.is_hierarchical && self.role.requires_children();
        self.children_ids.iter().filter(move |_| relevant)
    }
}

/// In-progress agent configuration owned by one wizard session.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDraft {
    pub id: Option<AgentId>,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub agent_type: Option<AgentType>,
    pub model_id: Option<String>,
    pub custom_endpoint: Option<CustomEndpoint>,
    pub channel_config: Option<ChannelConfig>,
    pub rag_config: RagConfig,
    pub fine_tuning_config: FineTuningConfig,
    pub hierarchical_config: HierarchicalConfig,
    pub system_prompt: Option<String>,
    pub tools: Vec<String>,
    pub capabilities: BTreeSet<Capability>,
    pub metadata: BTreeMap<String, Value>,
}

impl AgentDraft {
    pub fn name_length(&self) -> usize {
        self.name.trim().chars().count()
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ModelSelection {
    Catalog {
        #[serde(rename = "modelId")]
        model_id: String,
    },
    Custom(CustomEndpoint),
}

/// Position of the new agent in the supervision tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyPlacement {
    pub role: HierarchyRole,
    pub parent_id: Option<AgentId>,
    pub children_ids: BTreeSet<AgentId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildAdoption {
    pub child_id: AgentId,
    /// Parent that must drop the child from its own children list.
    pub previous_parent: Option<AgentId>,
}

/// Back-reference updates the creation service applies to existing agents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyLinkPlan {
    pub attach_to_parent: Option<AgentId>,
    pub adopted_children: Vec<ChildAdoption>,
}

impl HierarchyLinkPlan {
    pub fn is_empty(&self) -> bool {
        self.attach_to_parent.is_none() && self.adopted_children.is_empty()
    }
}

/// Finished, validated configuration handed to the creation service.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentDescriptor {
    pub id: Option<AgentId>,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub agent_type: AgentType,
    pub model: ModelSelection,
    pub channel_config: Option<ChannelConfig>,
    pub rag_config: RagConfig,
    pub fine_tuning_config: FineTuningConfig,
    pub hierarchy: HierarchyPlacement,
    pub link_plan: HierarchyLinkPlan,
    pub system_prompt: Option<String>,
    pub tools: Vec<String>,
    pub capabilities: BTreeSet<Capability>,
    pub metadata: BTreeMap<String, Value>,
    pub created_at: DateTime<Utc>,
}
