//! Campaign finalization job.

use serde::{Deserialize, Serialize};

/// Job that checks whether a campaign's batches have all reported and, once
/// they have, marks it completed. Safe to run any number of times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeJob {
    /// The campaign to finalize.
    pub campaign_id: String,
}

impl FinalizeJob {
    /// Create a new finalize job.
    #[must_use]
    pub const fn new(campaign_id: String) -> Self {
        Self { campaign_id }
    }
}
