//! Logging facilities.
//!
//! The macros below prefix each message with the current simulation time, the colored log level and the component
//! name, and use the component name as log target. The crate only emits records through the [`log`] facade, so
//! the application decides where they go (typically `env_logger`, filtered per component with `RUST_LOG`).

use colored::Colorize;
use log::Level;
use serde_json::json;

use crate::event::Event;

/// Logs a message at the error level.
#[macro_export]
macro_rules! log_error {
    ($ctx:expr, $msg:expr) => (
        $crate::log_at!($crate::__log::Level::Error, "ERROR", red, $ctx, "{}", $msg)
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        $crate::log_at!($crate::__log::Level::Error, "ERROR", red, $ctx, $format, $($arg)+)
    );
}

/// Logs a message at the warn level.
#[macro_export]
macro_rules! log_warn {
    ($ctx:expr, $msg:expr) => (
        $crate::log_at!($crate::__log::Level::Warn, "WARN", yellow, $ctx, "{}", $msg)
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        $crate::log_at!($crate::__log::Level::Warn, "WARN", yellow, $ctx, $format, $($arg)+)
    );
}

/// Logs a message at the info level.
#[macro_export]
macro_rules! log_info {
    ($ctx:expr, $msg:expr) => (
        $crate::log_at!($crate::__log::Level::Info, "INFO", green, $ctx, "{}", $msg)
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        $crate::log_at!($crate::__log::Level::Info, "INFO", green, $ctx, $format, $($arg)+)
    );
}

/// Logs a message at the debug level.
#[macro_export]
macro_rules! log_debug {
    ($ctx:expr, $msg:expr) => (
        $crate::log_at!($crate::__log::Level::Debug, "DEBUG", blue, $ctx, "{}", $msg)
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        $crate::log_at!($crate::__log::Level::Debug, "DEBUG", blue, $ctx, $format, $($arg)+)
    );
}

/// Logs a message at the trace level.
#[macro_export]
macro_rules! log_trace {
    ($ctx:expr, $msg:expr) => (
        $crate::log_at!($crate::__log::Level::Trace, "TRACE", cyan, $ctx, "{}", $msg)
    );
    ($ctx:expr, $format:expr, $($arg:tt)+) => (
        $crate::log_at!($crate::__log::Level::Trace, "TRACE", cyan, $ctx, $format, $($arg)+)
    );
}

#[doc(hidden)]
#[macro_export]
macro_rules! log_at {
    ($level:expr, $label:expr, $color:ident, $ctx:expr, $format:expr, $($arg:tt)+) => {{
        use $crate::colored::Colorize;
        $crate::__log::log!(
            target: $ctx.name(),
            $level,
            concat!("[{:.3} {} {}] ", $format),
            $ctx.time(),
            $label.$color(),
            $ctx.name(),
            $($arg)+
        )
    }};
}

fn event_json(event: &Event) -> serde_json::Value {
    json!({
        "id": event.id,
        "time": event.time,
        "priority": event.priority,
        "src": event.src,
        "dst": event.dst,
        "cause": event.cause,
        "type": event.data_type(),
        "data": serde_json::to_value(&event.data).unwrap_or_default(),
    })
}

/// Logs an event which has an unexpected payload or was received in a wrong state.
pub fn log_incorrect_event(event: Event, msg: &str) {
    log::error!(
        target: "simulation",
        "[{:.3} {} simulation] Incorrect event ({}): {}",
        event.time,
        "ERROR".red(),
        msg,
        event_json(&event)
    );
}

/// Logs an event whose payload type is not matched by the handler of its destination.
pub fn log_unhandled_event(event: Event) {
    log::error!(
        target: "simulation",
        "[{:.3} {} simulation] Unhandled event: {}",
        event.time,
        "ERROR".red(),
        event_json(&event)
    );
}

/// Logs an event whose destination has no registered handler.
pub fn log_undelivered_event(event: Event) {
    log::warn!(
        target: "simulation",
        "[{:.3} {} simulation] Undelivered event: {}",
        event.time,
        "WARN".yellow(),
        event_json(&event)
    );
}

pub(crate) fn log_debug_event(event: &Event, action: &str) {
    if log::log_enabled!(target: "simulation", Level::Debug) {
        log::debug!(
            target: "simulation",
            "[{:.3} {} simulation] Event {} {}",
            event.time,
            "DEBUG".blue(),
            action,
            event_json(event)
        );
    }
}

pub(crate) fn log_dispatch(event: &Event) {
    if log::log_enabled!(target: "simulation", Level::Trace) {
        log::trace!(
            target: "simulation",
            "[{:.3} {} simulation] Dispatching event {}",
            event.time,
            "TRACE".cyan(),
            event_json(event)
        );
    }
}
