//! Campaign report job.

use serde::{Deserialize, Serialize};

/// Job that renders and mails the delivery report for a completed campaign.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportJob {
    /// The campaign to report on.
    pub campaign_id: String,
}

impl ReportJob {
    /// Create a new report job.
    #[must_use]
    pub const fn new(campaign_id: String) -> Self {
        Self { campaign_id }
    }
}
