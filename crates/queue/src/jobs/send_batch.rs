//! Batch send job.

use serde::{Deserialize, Serialize};

/// Job that sends one campaign email to each recipient in the batch.
///
/// Carries recipient IDs, not addresses: the send worker re-reads each
/// recipient row, so a recipient deleted between dispatch and send is
/// silently skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendBatchJob {
    /// The campaign being sent.
    pub campaign_id: String,
    /// Recipients in this batch.
    pub recipient_ids: Vec<String>,
}

impl SendBatchJob {
    /// Create a new send batch job.
    #[must_use]
    pub const fn new(campaign_id: String, recipient_ids: Vec<String>) -> Self {
        Self {
            campaign_id,
            recipient_ids,
        }
    }
}
