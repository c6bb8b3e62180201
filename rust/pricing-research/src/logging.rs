//! Structured logging utilities.
//!
//! Subscriber setup, per-stage timing for research runs, and helpers for
//! consistent startup output.

use std::time::Instant;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ResearchResult, Stage};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins over `level` when set.
pub fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Timer for one pipeline stage of a research run.
///
/// Logs the start at `debug`, then the duration at `info` on success or at
/// `error` with the error on failure.
///
/// ```rust,ignore
/// let timer = StageTimer::new(Stage::Search, "US");
/// let results = timer.observe(search.search(&query).await)?;
/// ```
#[derive(Debug)]
pub struct StageTimer {
    stage: Stage,
    /// URL, country or query the stage is working on.
    target: String,
    start: Instant,
}

impl StageTimer {
    /// Creates a new stage timer and logs the start.
    #[must_use]
    pub fn new(stage: Stage, target: impl Into<String>) -> Self {
        let target = target.into();

        tracing::debug!(stage = %stage, target = %target, "Stage started");

        Self {
            stage,
            target,
            start: Instant::now(),
        }
    }

    /// Finishes the timer with result-aware logging.
    pub fn finish_with_result<T, E: std::fmt::Display>(self, result: Result<&T, &E>) {
        let duration_ms = self.start.elapsed().as_millis();

        match result {
            Ok(_) => {
                tracing::info!(
                    stage = %self.stage,
                    target = %self.target,
                    duration_ms = duration_ms,
                    "Stage completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    stage = %self.stage,
                    target = %self.target,
                    duration_ms = duration_ms,
                    error = %e,
                    "Stage failed"
                );
            }
        }
    }

    /// Log the outcome and hand the result back unchanged.
    pub fn observe<T>(self, result: ResearchResult<T>) -> ResearchResult<T> {
        self.finish_with_result(result.as_ref());
        result
    }
}

/// Macro for logging initialization steps with consistent formatting.
///
/// ```rust,ignore
/// log_init_step!(1, 4, "Language model", "openai (gpt-4o)");
/// ```
#[macro_export]
macro_rules! log_init_step {
    ($step:expr, $total:expr, $name:expr, $detail:expr) => {
        tracing::info!(
            step = $step,
            total = $total,
            "[{}/{}] {} - {}",
            $step,
            $total,
            $name,
            $detail
        );
    };
    ($step:expr, $total:expr, $name:expr) => {
        tracing::info!(step = $step, total = $total, "[{}/{}] {}", $step, $total, $name);
    };
}

/// Macro for logging warnings during initialization.
#[macro_export]
macro_rules! log_init_warning {
    ($msg:expr) => {
        tracing::warn!("⚠️  {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        tracing::warn!("⚠️  {}", format!($msg, $($arg)*));
    };
}

/// Macro for logging success messages.
#[macro_export]
macro_rules! log_success {
    ($msg:expr) => {
        tracing::info!("✅ {}", $msg);
    };
    ($msg:expr, $($arg:tt)*) => {
        tracing::info!("✅ {}", format!($msg, $($arg)*));
    };
}

/// Macro for logging startup banners.
#[macro_export]
macro_rules! log_banner {
    ($title:expr) => {
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("  {}", $title);
        tracing::info!("═══════════════════════════════════════════════════");
    };
    ($title:expr, $subtitle:expr) => {
        tracing::info!("═══════════════════════════════════════════════════");
        tracing::info!("  {}", $title);
        tracing::info!("  {}", $subtitle);
        tracing::info!("═══════════════════════════════════════════════════");
    };
}
