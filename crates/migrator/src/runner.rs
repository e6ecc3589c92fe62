//! Run workflow
//!
//! Drives a [`Migrator`] one pending unit at a time and asks an injected
//! [`RunDecider`] what to do before each unit and after each failure. The
//! runner itself never prompts or prints; it returns a [`RunSummary`] that a
//! front end renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::MigrationResult;
use crate::migrator::Migrator;
use crate::unit::UnitInfo;
use crate::version::Version;

/// Answer to "should this unit be applied?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Apply,
    Skip,
    Abort,
}

/// Strategy consulted by [`Runner::run`]
pub trait RunDecider: Send {
    /// Called before each pending unit
    fn should_apply(&mut self, unit: &UnitInfo) -> Decision;

    /// Called after a unit finished with errors; `false` stops the run
    fn should_continue_after_error(&mut self, unit: &UnitInfo, errors: &[String]) -> bool;
}

/// Non-interactive strategy: apply everything
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoDecider {
    continue_on_error: bool,
}

impl AutoDecider {
    /// Keep going after a unit reports errors
    pub fn continue_on_error() -> Self {
        Self {
            continue_on_error: true,
        }
    }

    /// Stop at the first unit that reports errors
    pub fn stop_on_error() -> Self {
        Self {
            continue_on_error: false,
        }
    }
}

impl RunDecider for AutoDecider {
    fn should_apply(&mut self, _unit: &UnitInfo) -> Decision {
        Decision::Apply
    }

    fn should_continue_after_error(&mut self, _unit: &UnitInfo, _errors: &[String]) -> bool {
        self.continue_on_error
    }
}

/// Terminal status of a unit in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitStatus {
    Processed,
    Skipped,
    Error,
    /// Already applied; used by status listings
    NotNeeded,
}

impl UnitStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitStatus::Processed => "PROCESSED",
            UnitStatus::Skipped => "SKIPPED",
            UnitStatus::Error => "ERROR",
            UnitStatus::NotNeeded => "NOT_NEEDED",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedUnit {
    pub info: UnitInfo,
    pub status: UnitStatus,
    pub timestamp: DateTime<Utc>,
    pub feedback: Vec<String>,
    pub errors: Vec<String>,
}

/// Everything a run attempted, in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Current version before the run
    pub from_version: Option<Version>,
    pub processed: Vec<ProcessedUnit>,
    /// The run stopped before reaching the last pending unit
    pub aborted: bool,
}

impl RunSummary {
    pub fn count(&self, status: UnitStatus) -> usize {
        self.processed.iter().filter(|unit| unit.status == status).count()
    }

    pub fn has_errors(&self) -> bool {
        self.count(UnitStatus::Error) > 0
    }

    /// Nothing was pending
    pub fn is_empty(&self) -> bool {
        self.processed.is_empty() && !self.aborted
    }
}

/// Runs pending units under a [`RunDecider`]
pub struct Runner;

impl Runner {
    pub async fn run(migrator: &mut Migrator, decider: &mut dyn RunDecider) -> MigrationResult<RunSummary> {
        let pending: Vec<UnitInfo> = migrator
            .pending_units()
            .await?
            .into_iter()
            .map(|unit| unit.info())
            .collect();
        let from_version = migrator.current_version().await?;

        let mut summary = RunSummary {
            from_version,
            processed: Vec::with_capacity(pending.len()),
            aborted: false,
        };

        if pending.is_empty() {
            tracing::info!("No pending migrations");
            return Ok(summary);
        }

        for info in pending {
            match decider.should_apply(&info) {
                Decision::Skip => {
                    tracing::info!("Skipping migration {}", info.version);
                    summary.processed.push(ProcessedUnit {
                        info,
                        status: UnitStatus::Skipped,
                        timestamp: Utc::now(),
                        feedback: Vec::new(),
                        errors: Vec::new(),
                    });
                    continue;
                }
                Decision::Abort => {
                    tracing::info!("Run aborted before migration {}", info.version);
                    summary.aborted = true;
                    break;
                }
                Decision::Apply => {}
            }

            migrator.up(std::slice::from_ref(&info.version)).await?;

            let feedback = migrator.feedback_for(&info.version).to_vec();
            let errors = migrator.errors_for(&info.version).to_vec();
            let failed = !errors.is_empty();

            let keep_going = !failed || decider.should_continue_after_error(&info, &errors);

            summary.processed.push(ProcessedUnit {
                info,
                status: if failed { UnitStatus::Error } else { UnitStatus::Processed },
                timestamp: Utc::now(),
                feedback,
                errors,
            });

            if !keep_going {
                summary.aborted = true;
                break;
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(version: &str) -> UnitInfo {
        UnitInfo {
            version: Version::parse(version).unwrap(),
            description: String::new(),
            author: String::new(),
            source_path: String::new(),
        }
    }

    #[test]
    fn test_status_display() {
        assert_eq!(UnitStatus::Processed.to_string(), "PROCESSED");
        assert_eq!(UnitStatus::NotNeeded.to_string(), "NOT_NEEDED");
        assert_eq!(
            serde_json::to_string(&UnitStatus::NotNeeded).unwrap(),
            "\"NOT_NEEDED\""
        );
    }

    #[test]
    fn test_auto_decider() {
        let unit = info("100");
        let errors = vec!["boom".to_string()];

        let mut stop = AutoDecider::stop_on_error();
        assert_eq!(stop.should_apply(&unit), Decision::Apply);
        assert!(!stop.should_continue_after_error(&unit, &errors));

        let mut keep = AutoDecider::continue_on_error();
        assert!(keep.should_continue_after_error(&unit, &errors));
    }
}
