use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration for the listener coordinator.
///
/// Contains the knobs layered on top of the coordination protocol itself; the protocol's
/// correctness never depends on any of them.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CoordinatorConfig {
    /// Upper bound on bulk-dirtying convergence rounds, as a safety valve against
    /// pathological sustained contention. Unset means the loop runs until the conflict
    /// set is empty, which is the behavior the convergence argument covers.
    #[serde(default)]
    pub max_dirty_rounds: Option<u32>,
}

impl CoordinatorConfig {
    /// Validates coordinator configuration settings.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_dirty_rounds == Some(0) {
            return Err(ValidationError::MaxDirtyRoundsZero);
        }

        Ok(())
    }
}
