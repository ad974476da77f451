use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::domain::agent::{AgentDescriptor, AgentId};

/// Persists finished descriptors. The wizard only hands descriptors over;
/// it never calls `create` itself.
pub trait AgentCreationService: Send + Sync {
    /// Id the new agent will be stored under, known before submission so
    /// hierarchy checks can detect self references.
    fn reserve_id(&self) -> AgentId;

    fn create(&self, descriptor: AgentDescriptor) -> Result<AgentId, CreationError>;
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CreationError {
    #[error("agent `{0}` already exists")]
    Duplicate(AgentId),
    #[error("creation service unavailable: {0}")]
    Unavailable(String),
}

#[derive(Default)]
struct Ledger {
    issued: u64,
    created: Vec<AgentDescriptor>,
}

/// Sequential ids (`agent-1`, `agent-2`, ...) and an in-process store.
#[derive(Clone, Default)]
pub struct InMemoryCreationService {
    ledger: Arc<Mutex<Ledger>>,
}

impl InMemoryCreationService {
    pub fn created(&self) -> Vec<AgentDescriptor> {
        match self.ledger.lock() {
            Ok(ledger) => ledger.created.clone(),
            Err(poisoned) => poisoned.into_inner().created.clone(),
        }
    }

    fn with_ledger<T>(&self, f: impl FnOnce(&mut Ledger) -> T) -> T {
        match self.ledger.lock() {
            Ok(mut ledger) => f(&mut ledger),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl AgentCreationService for InMemoryCreationService {
    fn reserve_id(&self) -> AgentId {
        self.with_ledger(|ledger| {
            ledger.issued += 1;
            AgentId(format!("agent-{}", ledger.issued))
        })
    }

    fn create(&self, descriptor: AgentDescriptor) -> Result<AgentId, CreationError> {
        self.with_ledger(|ledger| {
            let id = match &descriptor.id {
                Some(id) => id.clone(),
                None => {
                    ledger.issued += 1;
                    AgentId(format!("agent-{}", ledger.issued))
                }
            };
            if ledger.created.iter().any(|existing| existing.id.as_ref() == Some(&id)) {
                return Err(CreationError::Duplicate(id));
            }
            let mut stored = descriptor;
            stored.id = Some(id.clone());
            ledger.created.push(stored);
            Ok(id)
        })
    }
}
