//! Per-request metering hook for usage accounting.
//!
//! The hook runs on a detached task: a client hanging up must not cancel an
//! in-flight metering write, so the record is handed to `tokio::spawn`
//! rather than awaited inside the request future.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;

/// One completed request, as reported to the metering hook.
#[derive(Debug, Clone, Serialize)]
pub struct MeterRecord {
    pub request_id: String,
    pub domain: String,
    pub tenant_id: Option<String>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub response_bytes: u64,
    pub duration_seconds: f64,
}

/// External callback invoked once per completed request (billing,
/// analytics). Implementations must tolerate out-of-order delivery.
pub trait MeteringHook: Send + Sync + 'static {
    fn record(&self, record: MeterRecord) -> BoxFuture<'static, ()>;
}

/// Hand a record to the hook on a task detached from the request.
pub fn submit(hook: &Arc<dyn MeteringHook>, record: MeterRecord) {
    let hook = Arc::clone(hook);
    tokio::spawn(async move {
        hook.record(record).await;
    });
}
