//! ---
//! sh_section: "02-persistence-logging"
//! sh_subsection: "module"
//! sh_type: "source"
//! sh_scope: "code"
//! sh_description: "Structured logging adapters and sinks."
//! sh_version: "v0.1.0"
//! sh_owner: "tbd"
//! ---

/// Emit an event at the given level enriched with a [`crate::LogContext`].
#[doc(hidden)]
#[macro_export]
macro_rules! sh_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            execution = ctx.execution.unwrap_or(""),
            scenario = ctx.scenario.unwrap_or(""),
            step = ctx.step.unwrap_or_default(),
            task = ctx.task.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with scenario context.
#[macro_export]
macro_rules! sh_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::sh_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::sh_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with scenario context.
#[macro_export]
macro_rules! sh_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::sh_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::sh_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with scenario context.
#[macro_export]
macro_rules! sh_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::sh_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::sh_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit an error log enriched with scenario context.
#[macro_export]
macro_rules! sh_error {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::sh_event!(tracing::Level::ERROR, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::sh_event!(tracing::Level::ERROR, $crate::LogContext::default(), $($arg)+)
    };
}
