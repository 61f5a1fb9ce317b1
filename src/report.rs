// outline-backup/src/report.rs
//! Per-driver results, so a run can surface a single pass/fail signal
//! instead of only console text.

use std::fmt;
use std::path::PathBuf;

use tracing::{error, info, warn};

/// One named resource (database, bucket, object, policy) that could not be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceFailure {
    pub resource: String,
    pub reason: String,
}

impl fmt::Display for ResourceFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.resource, self.reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Succeeded,
    PartialFailure(Vec<ResourceFailure>),
    Fatal(String),
}

#[derive(Debug, Clone, Default)]
pub struct DriverReport {
    pub driver: &'static str,
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
    pub failures: Vec<ResourceFailure>,
    pub fatal: Option<String>,
}

impl DriverReport {
    pub fn new(driver: &'static str) -> Self {
        DriverReport {
            driver,
            ..Default::default()
        }
    }

    pub fn completed(&mut self, resource: impl Into<String>) {
        self.completed.push(resource.into());
    }

    pub fn skipped(&mut self, resource: impl Into<String>) {
        self.skipped.push(resource.into());
    }

    /// Records an isolated failure; the pass carries on.
    pub fn failed(&mut self, resource: impl Into<String>, reason: impl fmt::Display) {
        let failure = ResourceFailure {
            resource: resource.into(),
            reason: reason.to_string(),
        };
        error!("[{}] {}", self.driver, failure);
        self.failures.push(failure);
    }

    /// Records a failure that ended the whole pass.
    pub fn abort(mut self, reason: impl fmt::Display) -> Self {
        let reason = format!("{:#}", reason);
        error!("[{}] pass aborted: {}", self.driver, reason);
        self.fatal = Some(reason);
        self
    }

    #[cfg(test)]
    pub fn has_failed(&self, resource: &str) -> bool {
        self.failures.iter().any(|f| f.resource == resource)
    }

    pub fn outcome(&self) -> PassOutcome {
        match (&self.fatal, self.failures.is_empty()) {
            (Some(reason), _) => PassOutcome::Fatal(reason.clone()),
            (None, true) => PassOutcome::Succeeded,
            (None, false) => PassOutcome::PartialFailure(self.failures.clone()),
        }
    }
}

/// Aggregate of one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub snapshot: PathBuf,
    pub reports: Vec<DriverReport>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.reports
            .iter()
            .all(|r| r.outcome() == PassOutcome::Succeeded)
    }

    #[cfg(test)]
    pub fn report(&self, driver: &str) -> Option<&DriverReport> {
        self.reports.iter().find(|r| r.driver == driver)
    }

    pub fn log(&self) {
        for report in &self.reports {
            match report.outcome() {
                PassOutcome::Succeeded => info!(
                    "✓ {}: {} done, {} skipped",
                    report.driver,
                    report.completed.len(),
                    report.skipped.len()
                ),
                PassOutcome::PartialFailure(failures) => {
                    warn!(
                        "⚠️ {}: {} done, {} skipped, {} failed",
                        report.driver,
                        report.completed.len(),
                        report.skipped.len(),
                        failures.len()
                    );
                    for failure in failures {
                        warn!("   - {}", failure);
                    }
                }
                PassOutcome::Fatal(reason) => error!("❌ {}: aborted ({})", report.driver, reason),
            }
        }
    }
}
