//! Campaign dispatch job.

use serde::{Deserialize, Serialize};

/// Job that fans a claimed campaign out into send batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchJob {
    /// The campaign to dispatch.
    pub campaign_id: String,
}

impl DispatchJob {
    /// Create a new dispatch job.
    #[must_use]
    pub const fn new(campaign_id: String) -> Self {
        Self { campaign_id }
    }
}
