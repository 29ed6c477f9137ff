//! Logging setup for the `ssbench` binary.

use std::env;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Installs a global subscriber that logs to stderr.
///
/// `verbose` raises the default level to `DEBUG` if `RUST_LOG` is not set.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { Level::DEBUG } else { Level::INFO };
    let (level, env_filter) = parse_rust_log(default_level);
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(format.with_filter(LevelFilter::from(level)))
        .with(env_filter)
        .init();
}

/// Parses `RUST_LOG` into a maximum level and a per-crate filter.
///
/// A bare level such as `debug` is applied to the harness crates. Anything else is used
/// literally as an [`EnvFilter`] directive.
pub fn parse_rust_log(default_level: Level) -> (Level, EnvFilter) {
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<Level>() {
            Ok(level) => level,
            Err(_) => return (Level::TRACE, EnvFilter::new(value)),
        },
        Err(_) => default_level,
    };

    // This is the maximum verbosity that will be logged, we filter this down to `level`.
    let env_filter = EnvFilter::new(
        "INFO,\
        ssbench=TRACE,\
        ssbench_core=TRACE,\
        ssbench_runner=TRACE,\
        ",
    );

    (level, env_filter)
}
