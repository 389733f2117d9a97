//! Optional tracing setup for embedders that want the pipeline's trace log
//! without wiring their own subscriber.

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_subscriber::fmt::time::UtcTime;

static TRACING_INIT: OnceLock<()> = OnceLock::new();

fn trace_log_path() -> PathBuf {
    env::var("LOOPCAP_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("loopcap_trace.jsonl"))
}

/// Install a JSON-lines file subscriber, once per process. Does nothing when
/// a global subscriber is already set, so embedding applications keep
/// control of their own logging.
pub fn init_tracing() {
    let _ = TRACING_INIT.get_or_init(|| {
        let path = trace_log_path();
        let file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => file,
            Err(_) => return,
        };
        let subscriber = tracing_subscriber::fmt()
            .json()
            .with_timer(UtcTime::rfc_3339())
            .with_writer(file)
            .with_current_span(false)
            .with_span_list(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}
