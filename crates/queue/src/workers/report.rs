//! Report worker.

use std::sync::Arc;

use apalis::prelude::*;
use mailspool_core::ReportService;
use tracing::{error, info};

use crate::jobs::ReportJob;

/// Context for the report worker.
#[derive(Clone)]
pub struct ReportContext {
    pub report_service: ReportService,
}

/// Worker function that builds and emails a campaign's delivery report.
///
/// # Errors
/// Returns an error if report generation or delivery fails.
pub async fn report_worker(job: ReportJob, ctx: Data<ReportContext>) -> Result<(), Error> {
    info!(campaign_id = %job.campaign_id, "Generating campaign report");

    match ctx.report_service.send_report(&job.campaign_id).await {
        Ok(rows) => {
            info!(campaign_id = %job.campaign_id, rows, "Campaign report sent");
            Ok(())
        }
        Err(e) => {
            error!(campaign_id = %job.campaign_id, error = %e, "Failed to send campaign report");
            Err(Error::Failed(Arc::new(e.into())))
        }
    }
}
