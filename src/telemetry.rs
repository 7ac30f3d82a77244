//! Tracing setup.
//!
//! LOG_LEVEL takes a full filter directive set (e.g. "debug" or
//! "info,challenge=debug,korrika_backend=debug"); LOG_FORMAT picks "pretty"
//! (default) or "json". Targets, files and line numbers are included so the
//! `challenge` / `korrika_backend` sources stay distinguishable next to the
//! per-request spans added by tower-http.

use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str =
    "info,challenge=debug,korrika_backend=debug,tower_http=info,axum=info";

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("LOG_LEVEL").unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    // The two branches build different subscriber types, so init inside each.
    if matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json")) {
        builder.json().init();
    } else {
        builder.init();
    }
}
