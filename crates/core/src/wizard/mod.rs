pub mod controller;
pub mod creation;
pub mod fields;
pub mod hierarchy;
pub mod steps;
pub mod validation;

pub use controller::{SessionStatus, StepOutcome, WizardController, WizardError, WizardSession};
pub use creation::{AgentCreationService, CreationError, InMemoryCreationService};
pub use fields::{update_field, DraftField, DraftUpdateError};
pub use hierarchy::{hierarchy_issues, link_plan};
pub use steps::{next_reachable_step, Direction, FieldIssue, WizardStep};
pub use validation::{build_descriptor, validate_draft};
