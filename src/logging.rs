use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn crate_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. `RUST_LOG` directives are kept, each `-v`
/// raises the level of this crate.
pub fn setup_tracing(verbosity: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy()
        .add_directive(
            format!("game_planner={}", crate_level(verbosity))
                .parse()
                .unwrap_or_else(|_| LevelFilter::INFO.into()),
        );

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
