pub mod audit;
pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod wizard;

pub use audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
pub use catalog::{
    AgentCatalog, AgentCatalogEntry, CatalogError, KnowledgeSourceCatalog, KnowledgeSourceEntry,
    ModelCatalog, ModelCatalogEntry, WizardCatalog,
};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat, WizardConfig};
pub use domain::agent::{
    AgentDescriptor, AgentDraft, AgentId, AgentType, HierarchyLinkPlan, HierarchyRole,
    ModelSelection,
};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use wizard::{
    AgentCreationService, CreationError, FieldIssue, InMemoryCreationService, SessionStatus,
    StepOutcome, WizardController, WizardError, WizardSession, WizardStep,
};
