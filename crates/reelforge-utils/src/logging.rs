//! Tracing initialization.
//!
//! Structured logging with an env-filter override (`RUST_LOG` wins), a
//! compact human format by default, and a more detailed format under
//! `--verbose`.

use std::io::IsTerminal;

use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Check if colored output should be used.
///
/// True only when stdout is a TTY and `NO_COLOR` is unset.
fn use_color() -> bool {
    std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none()
}

/// Initialize the tracing subscriber.
///
/// Safe to call once per process; a second call returns an error from the
/// subscriber registry, which callers may ignore in tests.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_tracing(verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| {
            if verbose {
                EnvFilter::try_new("reelforge=debug,info")
            } else {
                EnvFilter::try_new("reelforge=info,warn")
            }
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if verbose {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_ansi(use_color())
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()?;
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_ansi(use_color()).with_target(false).compact())
            .try_init()?;
    }

    Ok(())
}

/// Span covering one stage execution.
pub fn stage_span(run_id: &str, stage: &str) -> tracing::Span {
    tracing::span!(
        tracing::Level::INFO,
        "stage",
        run_id = %run_id,
        stage = %stage,
    )
}

/// Span covering one refinement iteration.
pub fn iteration_span(run_id: &str, iteration: u32) -> tracing::Span {
    tracing::span!(
        tracing::Level::INFO,
        "refine",
        run_id = %run_id,
        iteration,
    )
}
