use tracing::Dispatch;
use tracing::dispatcher::{self, DefaultGuard};
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "CMPACT_LOG";

/// The diagnostics sink for one run.
///
/// Installed as the default dispatcher for the current thread only and
/// released when dropped. Worker pools pick it up through [`current`].
pub struct Diagnostics {
    _guard: DefaultGuard,
}

fn level_for(verbosity: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

pub fn init(verbosity: u8, quiet: bool) -> Diagnostics {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(format!("cmpact={}", level_for(verbosity, quiet))));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .finish();

    Diagnostics {
        _guard: dispatcher::set_default(&Dispatch::new(subscriber)),
    }
}

/// The dispatcher active on the calling thread.
pub fn current() -> Dispatch {
    dispatcher::get_default(|d| d.clone())
}
