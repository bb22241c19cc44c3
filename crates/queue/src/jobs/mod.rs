//! Job definitions.
//!
//! One job type per pipeline lane. Each lane is backed by its own Redis
//! namespace so a slow send queue never starves dispatch or finalization.

mod dispatch;
mod finalize;
mod report;
mod send_batch;

pub use dispatch::DispatchJob;
pub use finalize::FinalizeJob;
pub use report::ReportJob;
pub use send_batch::SendBatchJob;
