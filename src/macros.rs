//! RTT logging that compiles away on the host.

/// Log a line to the RTT terminal channel.
macro_rules! log_info {
    ($($arg:tt)*) => {{
        #[cfg(feature = "board")]
        {
            ::rtt_target::rprintln!($($arg)*);
        }
        #[cfg(not(feature = "board"))]
        {
            let _ = ::core::format_args!($($arg)*);
        }
    }};
}

/// Log a line to the RTT terminal channel with a warning prefix.
macro_rules! log_warn {
    ($($arg:tt)*) => {
        log_info!("WARN: {}", ::core::format_args!($($arg)*))
    };
}
