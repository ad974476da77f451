use omra_core::catalog::WizardCatalog;
use omra_core::config::{AppConfig, LoadOptions};
use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> String {
    let report = build_report();

    if json_output {
        return serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        });
    }

    render_human(&report)
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.extend(check_catalog(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            for name in ["catalog_readability", "catalog_link_consistency"] {
                checks.push(DoctorCheck {
                    name,
                    status: CheckStatus::Skipped,
                    details: "skipped because configuration did not load".to_string(),
                });
            }
        }
    }

    let all_pass = checks.iter().all(|check| check.status != CheckStatus::Fail);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_catalog(config: &AppConfig) -> Vec<DoctorCheck> {
    let Some(path) = config.catalog.path.as_deref() else {
        return vec![
            DoctorCheck {
                name: "catalog_readability",
                status: CheckStatus::Skipped,
                details: "no catalog configured; model and agent lookups are unrestricted"
                    .to_string(),
            },
            DoctorCheck {
                name: "catalog_link_consistency",
                status: CheckStatus::Skipped,
                details: "no catalog configured".to_string(),
            },
        ];
    };

    let catalog = match WizardCatalog::load(path) {
        Ok(catalog) => catalog,
        Err(error) => {
            return vec![
                DoctorCheck {
                    name: "catalog_readability",
                    status: CheckStatus::Fail,
                    details: error.to_string(),
                },
                DoctorCheck {
                    name: "catalog_link_consistency",
                    status: CheckStatus::Skipped,
                    details: "skipped because the catalog did not load".to_string(),
                },
            ];
        }
    };

    let readability = DoctorCheck {
        name: "catalog_readability",
        status: CheckStatus::Pass,
        details: format!("loaded {} agents from `{}`", catalog.agents.len(), path.display()),
    };

    let problems = catalog.agents.link_inconsistencies();
    let consistency = if problems.is_empty() {
        DoctorCheck {
            name: "catalog_link_consistency",
            status: CheckStatus::Pass,
            details: "parent and child links agree".to_string(),
        }
    } else {
        DoctorCheck {
            name: "catalog_link_consistency",
            status: CheckStatus::Fail,
            details: problems.join("; "),
        }
    };

    vec![readability, consistency]
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
