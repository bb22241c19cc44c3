//! Job workers.

mod dispatch;
mod finalize;
mod report;
mod send_batch;

pub use dispatch::{DispatchContext, dispatch_worker};
pub use finalize::{FinalizeContext, finalize_worker};
pub use report::{ReportContext, report_worker};
pub use send_batch::{SendBatchContext, send_batch_worker};
