//! Advisory diagnostics gathered during a recognition run.

use serde::Serialize;
use std::fmt;

/// Non-fatal findings. Each kind is reported at most once per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    /// Pages of one questionnaire carried different questionnaire IDs.
    MultipageOrder,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::MultipageOrder => f.write_str(
                "questionnaire ids differ within a sheet; \
                 multipage scans may not be in the right order",
            ),
        }
    }
}

/// Collects warnings for one run; the driver takes them when it is done.
#[derive(Debug, Default)]
pub struct WarningCollector {
    seen: Vec<Warning>,
}

impl WarningCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `warning`; returns `true` the first time it is seen.
    pub fn warn_once(&mut self, warning: Warning) -> bool {
        if self.seen.contains(&warning) {
            return false;
        }
        log::warn!("{warning}");
        self.seen.push(warning);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.seen)
    }
}
