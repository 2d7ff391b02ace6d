//! Prometheus metrics collection for craftrelay.
//!
//! - `relay_command_total{command}` - Commands executed by full name
//! - `relay_command_duration_seconds{command}` - Command latency histogram
//! - `relay_command_errors_total{command,error}` - Failed dispatches by error code
//! - `relay_game_events_total{kind}` - Classified console events
//! - `relay_mirrored_total{direction}` - Messages replayed across the bridge
//! - `relay_impersonation_total` - Refused group-chat impersonation attempts

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::OnceLock;

/// Process registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters
// ========================================================================

/// Commands executed by full name.
pub static COMMAND_COUNTER: OnceLock<IntCounterVec> = OnceLock::new();

/// Command errors by full name and error code.
pub static COMMAND_ERRORS: OnceLock<IntCounterVec> = OnceLock::new();

/// Console events by kind.
pub static GAME_EVENTS: OnceLock<IntCounterVec> = OnceLock::new();

/// Mirrored messages by direction (`game_to_chat`, `chat_to_game`).
pub static MIRRORED: OnceLock<IntCounterVec> = OnceLock::new();

/// Refused impersonation attempts.
pub static IMPERSONATION_ATTEMPTS: OnceLock<IntCounter> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Command latency by full name.
pub static COMMAND_LATENCY: OnceLock<HistogramVec> = OnceLock::new();

/// Initialize the metrics registry.
///
/// Called once at start-up. Recording before `init` is a no-op.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            match $init {
                Ok(m) => {
                    if let Err(e) = r.register(Box::new(m.clone())) {
                        tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                    }
                    let _ = $metric.set(m);
                }
                Err(e) => {
                    tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                }
            }
        };
    }

    register!(COMMAND_COUNTER, IntCounterVec::new(Opts::new("relay_command_total", "Commands executed by name"), &["command"]));
    register!(COMMAND_LATENCY, HistogramVec::new(
        HistogramOpts::new("relay_command_duration_seconds", "Command latency by name")
            .buckets(vec![0.0001, 0.001, 0.01, 0.1, 0.5, 1.0, 2.5, 5.0]),
        &["command"]));
    register!(COMMAND_ERRORS, IntCounterVec::new(Opts::new("relay_command_errors_total", "Command errors by name and code"), &["command", "error"]));
    register!(GAME_EVENTS, IntCounterVec::new(Opts::new("relay_game_events_total", "Console events by kind"), &["kind"]));
    register!(MIRRORED, IntCounterVec::new(Opts::new("relay_mirrored_total", "Mirrored messages by direction"), &["direction"]));
    register!(IMPERSONATION_ATTEMPTS, IntCounter::new("relay_impersonation_total", "Refused impersonation attempts"));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

/// Record one executed command and its latency in seconds.
pub fn record_command(command: &str, duration: f64) {
    if let Some(counter) = COMMAND_COUNTER.get() {
        counter.with_label_values(&[command]).inc();
    }
    if let Some(histogram) = COMMAND_LATENCY.get() {
        histogram.with_label_values(&[command]).observe(duration);
    }
}

pub fn record_command_error(command: &str, error_code: &str) {
    if let Some(counter) = COMMAND_ERRORS.get() {
        counter.with_label_values(&[command, error_code]).inc();
    }
}

pub fn record_game_event(kind: &str) {
    if let Some(counter) = GAME_EVENTS.get() {
        counter.with_label_values(&[kind]).inc();
    }
}

pub fn record_mirrored(direction: &str) {
    if let Some(counter) = MIRRORED.get() {
        counter.with_label_values(&[direction]).inc();
    }
}

pub fn record_impersonation() {
    if let Some(counter) = IMPERSONATION_ATTEMPTS.get() {
        counter.inc();
    }
}
