pub mod api; // REST surface over the pipeline and validator
pub mod cli;
pub mod config;
pub mod pipeline; // Documents → requirements → rules, summaries, model verdicts
pub mod validation; // Local checks, outliers, risk, remediation

use tracing_subscriber::EnvFilter;

/// Install the global `fmt` subscriber. `RUST_LOG` wins over the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter()));
    // A second call (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
