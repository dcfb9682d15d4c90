//! tracing-subscriber setup.

use crate::config::Env;
use tracing_subscriber::EnvFilter;

/// Default filter directive for an environment.
pub fn default_directive(env: Env) -> &'static str {
    match env {
        Env::Local | Env::Dev => "sso=debug,tower_http=info,info",
        Env::Prod => "info",
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the environment default.
pub fn init(env: Env) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(env)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
        .with_target(false);

    // A second init (e.g. from tests) keeps the first subscriber.
    let _ = builder.with_ansi(env == Env::Local).try_init();
}
