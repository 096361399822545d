//! Internal logging helpers for structured chunkdex events.

/// Single logging target for chunkdex.
pub(crate) const LOG_TARGET: &str = "chunkdex";

macro_rules! chunkdex_log {
    ($level:expr, $event:expr, $fmt:expr $(, $args:expr)* $(,)?) => {{
        if log::log_enabled!(target: crate::logging::LOG_TARGET, $level) {
            log::log!(
                target: crate::logging::LOG_TARGET,
                $level,
                "event={} {}",
                $event,
                format_args!($fmt $(, $args)*)
            );
        }
    }};
}

pub(crate) use chunkdex_log;

/// Level used for diagnostics that are only surfaced when the caller opted into verbose output.
pub(crate) fn verbose_level(verbose: bool) -> log::Level {
    if verbose {
        log::Level::Warn
    } else {
        log::Level::Debug
    }
}
