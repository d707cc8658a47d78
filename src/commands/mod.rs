pub mod assets;
pub mod install;
pub mod list;
pub mod uninstall;

/// Result of a batch of per-package operations: names that succeeded and
/// names that were skipped.
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
}

impl BatchOutcome {
    pub fn new() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl Default for BatchOutcome {
    fn default() -> Self {
        Self::new()
    }
}
