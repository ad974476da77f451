use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use omra_core::domain::agent::AgentDraft;
use omra_core::wizard::update_field;
use serde::Deserialize;
use serde_json::Value;

/// One scripted field edit, applied in file order.
#[derive(Clone, Debug, Deserialize)]
pub struct FieldUpdate {
    pub field: String,
    #[serde(default)]
    pub value: Value,
}

pub fn load(path: &Path) -> Result<Vec<FieldUpdate>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read script `{}`", path.display()))?;
    serde_json::from_str::<Vec<FieldUpdate>>(&raw)
        .with_context(|| format!("script `{}` is not a list of field updates", path.display()))
}

/// Replays `updates` on `draft` without touching a session.
pub fn replay(draft: &AgentDraft, updates: &[FieldUpdate]) -> Result<AgentDraft> {
    updates.iter().try_fold(draft.clone(), |current, update| {
        update_field(&current, &update.field, update.value.clone())
            .with_context(|| format!("script update for `{}` was rejected", update.field))
    })
}
