use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::domain::agent::{
    AgentDraft, AgentId, AgentType, Capability, ChannelConfig, ChunkingStrategy, CustomEndpoint,
    FineTuningMethod, HierarchyRole, SourceRef, TrainingExample,
};

/// Addressable draft fields, named by their camelCase path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DraftField {
    Name,
    Description,
    Type,
    ModelId,
    CustomEndpoint,
    CustomEndpointUrl,
    CustomEndpointApiKey,
    CustomEndpointModelName,
    ChannelConfig,
    RagEnabled,
    RagSources,
    RagEmbeddingModel,
    RagChunkingStrategy,
    RagChunkSize,
    RagChunkOverlap,
    RagHybridSearch,
    RagReranking,
    FineTuningEnabled,
    FineTuningMethod,
    FineTunedModelId,
    TrainingExamples,
    LearningRate,
    Epochs,
    BatchSize,
    IsHierarchical,
    Role,
    ParentId,
    ChildrenIds,
    SystemPrompt,
    Tools,
    Capabilities,
    Metadata,
}

const FIELD_PATHS: &[(&str, DraftField)] = &[
    ("name", DraftField::Name),
    ("description", DraftField::Description),
    ("type", DraftField::Type),
    ("modelId", DraftField::ModelId),
    ("customEndpoint", DraftField::CustomEndpoint),
    ("customEndpoint.url", DraftField::CustomEndpointUrl),
    ("customEndpoint.apiKey", DraftField::CustomEndpointApiKey),
    ("customEndpoint.modelName", DraftField::CustomEndpointModelName),
    ("channelConfig", DraftField::ChannelConfig),
    ("ragConfig.enabled", DraftField::RagEnabled),
    ("ragConfig.sources", DraftField::RagSources),
    ("ragConfig.embeddingModel", DraftField::RagEmbeddingModel),
    ("ragConfig.chunkingStrategy", DraftField::RagChunkingStrategy),
    ("ragConfig.chunkSize", DraftField::RagChunkSize),
    ("ragConfig.chunkOverlap", DraftField::RagChunkOverlap),
    ("ragConfig.hybridSearch", DraftField::RagHybridSearch),
    ("ragConfig.reranking", DraftField::RagReranking),
    ("fineTuningConfig.enabled", DraftField::FineTuningEnabled),
    ("fineTuningConfig.method", DraftField::FineTuningMethod),
    ("fineTuningConfig.fineTunedModelId", DraftField::FineTunedModelId),
    ("fineTuningConfig.trainingExamples", DraftField::TrainingExamples),
    ("fineTuningConfig.learningRate", DraftField::LearningRate),
    ("fineTuningConfig.epochs", DraftField::Epochs),
    ("fineTuningConfig.batchSize", DraftField::BatchSize),
    ("hierarchicalConfig.isHierarchical", DraftField::IsHierarchical),
    ("hierarchicalConfig.role", DraftField::Role),
    ("hierarchicalConfig.parentId", DraftField::ParentId),
    ("hierarchicalConfig.childrenIds", DraftField::ChildrenIds),
    ("systemPrompt", DraftField::SystemPrompt),
    ("tools", DraftField::Tools),
    ("capabilities", DraftField::Capabilities),
    ("metadata", DraftField::Metadata),
];

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DraftUpdateError {
    #[error("unknown draft field `{0}`")]
    UnknownField(String),
    #[error("invalid value for `{field}`: {message}")]
    InvalidValue { field: String, message: String },
}

impl DraftField {
    pub fn path(self) -> &'static str {
        FIELD_PATHS.iter().find(|(_, field)| *field == self).map_or("", |(path, _)| *path)
    }
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for DraftField {
    type Err = DraftUpdateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let path = value.trim();
        FIELD_PATHS
            .iter()
            .find(|(candidate, _)| *candidate == path)
            .map(|(_, field)| *field)
            .ok_or_else(|| DraftUpdateError::UnknownField(path.to_owned()))
    }
}

/// Returns a copy of `draft` with one field replaced. The input is never
/// modified, so a rejected value leaves the caller's draft intact.
pub fn update_field(
    draft: &AgentDraft,
    path: &str,
    value: Value,
) -> Result<AgentDraft, DraftUpdateError> {
    let field = path.parse::<DraftField>()?;
    let mut next = draft.clone();
    apply(&mut next, field, value)?;
    Ok(next)
}

pub(crate) fn apply(
    draft: &mut AgentDraft,
    field: DraftField,
    value: Value,
) -> Result<(), DraftUpdateError> {
    match field {
        DraftField::Name => draft.name = decode::<String>(field, value)?,
        DraftField::Description => draft.description = decode::<String>(field, value)?,
        DraftField::Type => draft.agent_type = decode::<Option<AgentType>>(field, value)?,
        DraftField::ModelId => draft.model_id = optional_text(field, value)?,
        DraftField::CustomEndpoint => {
            draft.custom_endpoint =
                decode::<Option<EndpointInput>>(field, value)?.map(EndpointInput::into_endpoint);
        }
        DraftField::CustomEndpointUrl => {
            endpoint_mut(draft).url = decode::<Option<String>>(field, value)?.unwrap_or_default();
        }
        DraftField::CustomEndpointApiKey => {
            endpoint_mut(draft).api_key = optional_text(field, value)?.map(SecretString::from);
        }
        DraftField::CustomEndpointModelName => {
            endpoint_mut(draft).model_name =
                decode::<Option<String>>(field, value)?.unwrap_or_default();
        }
        DraftField::ChannelConfig => {
            draft.channel_config = decode::<Option<ChannelConfig>>(field, value)?;
        }
        DraftField::RagEnabled => draft.rag_config.enabled = decode(field, value)?,
        DraftField::RagSources => {
            draft.rag_config.sources = decode::<Vec<SourceInput>>(field, value)?
                .into_iter()
                .map(SourceInput::into_source)
                .collect();
        }
        DraftField::RagEmbeddingModel => {
            draft.rag_config.embedding_model = optional_text(field, value)?;
        }
        DraftField::RagChunkingStrategy => {
            draft.rag_config.chunking_strategy =
                decode::<Option<ChunkingStrategy>>(field, value)?;
        }
        DraftField::RagChunkSize => draft.rag_config.chunk_size = decode(field, value)?,
        DraftField::RagChunkOverlap => draft.rag_config.chunk_overlap = decode(field, value)?,
        DraftField::RagHybridSearch => draft.rag_config.hybrid_search = decode(field, value)?,
        DraftField::RagReranking => draft.rag_config.reranking = decode(field, value)?,
        DraftField::FineTuningEnabled => {
            draft.fine_tuning_config.enabled = decode(field, value)?;
        }
        DraftField::FineTuningMethod => {
            draft.fine_tuning_config.method = decode::<FineTuningMethod>(field, value)?;
        }
        DraftField::FineTunedModelId => {
            draft.fine_tuning_config.fine_tuned_model_id = optional_text(field, value)?;
        }
        DraftField::TrainingExamples => {
            draft.fine_tuning_config.training_examples =
                decode::<Vec<TrainingExample>>(field, value)?;
        }
        DraftField::LearningRate => {
            draft.fine_tuning_config.learning_rate = decode(field, value)?;
        }
        DraftField::Epochs => draft.fine_tuning_config.epochs = decode(field, value)?,
        DraftField::BatchSize => draft.fine_tuning_config.batch_size = decode(field, value)?,
        DraftField::IsHierarchical => {
            draft.hierarchical_config.is_hierarchical = decode(field, value)?;
        }
        DraftField::Role => {
            draft.hierarchical_config.role = decode::<HierarchyRole>(field, value)?;
        }
        DraftField::ParentId => {
            draft.hierarchical_config.parent_id = optional_text(field, value)?.map(AgentId);
        }
        DraftField::ChildrenIds => {
            draft.hierarchical_config.children_ids = decode::<Vec<String>>(field, value)?
                .into_iter()
                .map(|id| id.trim().to_owned())
                .filter(|id| !id.is_empty())
                .map(AgentId)
                .collect::<BTreeSet<_>>();
        }
        DraftField::SystemPrompt => draft.system_prompt = optional_text(field, value)?,
        DraftField::Tools => {
            let mut seen = BTreeSet::new();
            draft.tools = decode::<Vec<String>>(field, value)?
                .into_iter()
                .map(|tool| tool.trim().to_owned())
                .filter(|tool| !tool.is_empty() && seen.insert(tool.clone()))
                .collect();
        }
        DraftField::Capabilities => {
            draft.capabilities = decode::<BTreeSet<Capability>>(field, value)?;
        }
        DraftField::Metadata => {
            draft.metadata = decode::<Option<BTreeMap<String, Value>>>(field, value)?
                .unwrap_or_default();
        }
    }
    Ok(())
}

fn decode<T>(field: DraftField, value: Value) -> Result<T, DraftUpdateError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(value).map_err(|error| DraftUpdateError::InvalidValue {
        field: field.path().to_owned(),
        message: error.to_string(),
    })
}

/// Blank strings clear the field the same way `null` does.
fn optional_text(field: DraftField, value: Value) -> Result<Option<String>, DraftUpdateError> {
    Ok(decode::<Option<String>>(field, value)?
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty()))
}

fn endpoint_mut(draft: &mut AgentDraft) -> &mut CustomEndpoint {
    draft.custom_endpoint.get_or_insert_with(CustomEndpoint::default)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct EndpointInput {
    #[serde(default)]
    url: String,
    #[serde(default)]
    api_key: Option<String>,
    #[serde(default)]
    model_name: String,
}

impl EndpointInput {
    fn into_endpoint(self) -> CustomEndpoint {
        CustomEndpoint {
            url: self.url,
            api_key: self.api_key.filter(|key| !key.is_empty()).map(SecretString::from),
            model_name: self.model_name,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SourceInput {
    Id(String),
    Ref(SourceRef),
}

impl SourceInput {
    fn into_source(self) -> SourceRef {
        match self {
            Self::Id(id) => SourceRef { id, name: None },
            Self::Ref(source) => source,
        }
    }
}
