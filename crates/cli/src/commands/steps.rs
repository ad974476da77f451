use std::path::Path;

use omra_core::config::{AppConfig, LoadOptions};
use omra_core::wizard::{WizardController, WizardStep};
use serde_json::json;

use crate::commands::script;
use crate::commands::CommandResult;

const COMMAND: &str = "steps";

/// Prints which steps the scripted draft would visit and which it skips.
pub fn run(script_path: &Path) -> CommandResult {
    let updates = match script::load(script_path) {
        Ok(updates) => updates,
        Err(error) => return CommandResult::failure(COMMAND, "script", format!("{error:#}"), 3),
    };

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                COMMAND,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let controller = WizardController::new(config.wizard);
    let draft = match script::replay(&controller.create_draft(), &updates) {
        Ok(draft) => draft,
        Err(error) => {
            return CommandResult::failure(COMMAND, "draft_update", format!("{error:#}"), 4);
        }
    };

    let reachable = controller.reachable_steps(&draft);
    let skipped = WizardStep::ALL
        .into_iter()
        .filter(|step| !reachable.contains(step))
        .collect::<Vec<_>>();

    let path = reachable.iter().map(|step| step.as_str()).collect::<Vec<_>>().join(" -> ");
    let message = if skipped.is_empty() {
        path
    } else {
        let names = skipped.iter().map(|step| step.as_str()).collect::<Vec<_>>().join(", ");
        format!("{path} (skipped: {names})")
    };

    CommandResult::success_with_details(
        COMMAND,
        message,
        Some(json!({ "reachable": reachable, "skipped": skipped })),
    )
}
