use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use omra_core::domain::agent::{AgentDescriptor, AgentId};
use omra_core::wizard::{AgentCreationService, CreationError};
use serde_json::Value;

struct StoreState {
    next: u64,
    taken: BTreeSet<AgentId>,
    records: Vec<Value>,
}

/// Creation service backed by a JSON array on disk. Without a path the
/// records only live for the current process.
pub struct JsonStoreCreationService {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl JsonStoreCreationService {
    /// Opens the store, treating every id already in `taken` or in the file
    /// as unavailable for reservation.
    pub fn open(path: Option<&Path>, taken: BTreeSet<AgentId>) -> Result<Self, CreationError> {
        let records = match path {
            Some(path) if path.exists() => read_records(path)?,
            _ => Vec::new(),
        };

        let mut taken = taken;
        taken.extend(
            records
                .iter()
                .filter_map(|record| record.get("id").and_then(Value::as_str))
                .map(AgentId::from),
        );

        Ok(Self {
            path: path.map(Path::to_path_buf),
            state: Mutex::new(StoreState { next: 1, taken, records }),
        })
    }

    pub fn records(&self) -> Vec<Value> {
        match self.state.lock() {
            Ok(state) => state.records.clone(),
            Err(poisoned) => poisoned.into_inner().records.clone(),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StoreState) -> T) -> T {
        match self.state.lock() {
            Ok(mut state) => f(&mut state),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl StoreState {
    fn reserve(&mut self) -> AgentId {
        loop {
            let candidate = AgentId(format!("agent-{}", self.next));
            self.next += 1;
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

impl AgentCreationService for JsonStoreCreationService {
    fn reserve_id(&self) -> AgentId {
        self.with_state(StoreState::reserve)
    }

    fn create(&self, descriptor: AgentDescriptor) -> Result<AgentId, CreationError> {
        self.with_state(|state| {
            let id = match &descriptor.id {
                Some(id) => id.clone(),
                None => state.reserve(),
            };
            let duplicate = state
                .records
                .iter()
                .any(|record| record.get("id").and_then(Value::as_str) == Some(id.as_str()));
            if duplicate {
                return Err(CreationError::Duplicate(id));
            }

            let mut stored = descriptor;
            stored.id = Some(id.clone());
            let record = serde_json::to_value(&stored)
                .map_err(|error| CreationError::Unavailable(error.to_string()))?;
            state.records.push(record);

            if let Some(path) = &self.path {
                if let Err(error) = write_records(path, &state.records) {
                    state.records.pop();
                    return Err(error);
                }
            }
            Ok(id)
        })
    }
}

fn read_records(path: &Path) -> Result<Vec<Value>, CreationError> {
    let raw = fs::read_to_string(path).map_err(|error| {
        CreationError::Unavailable(format!("could not read store `{}`: {error}", path.display()))
    })?;
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(&raw).map_err(|error| {
        let message = format!("store `{}` is not a JSON array: {error}", path.display());
        CreationError::Unavailable(message)
    })
}

fn write_records(path: &Path, records: &[Value]) -> Result<(), CreationError> {
    let rendered = serde_json::to_string_pretty(records)
        .map_err(|error| CreationError::Unavailable(error.to_string()))?;
    fs::write(path, rendered).map_err(|error| {
        CreationError::Unavailable(format!("could not write store `{}`: {error}", path.display()))
    })
}
