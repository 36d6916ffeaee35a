//! Logging macros with consistent fields.
//!
//! Records carry `subsystem` and, where a peer is involved, `peer`, so log
//! lines for one peer can be followed across subsystems.

/// Log a peer-related event with standard fields.
///
/// ```rust,ignore
/// log_peer_event!(debug, subsystem::NEIGHBOURS, "SYN sent", peer, state = ?state);
/// ```
#[macro_export]
macro_rules! log_peer_event {
    ($level:ident, $subsystem:expr, $msg:expr, $peer:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            peer = %$peer,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log an event with the subsystem field only.
#[macro_export]
macro_rules! log_event {
    ($level:ident, $subsystem:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            subsystem = $subsystem,
            $($($field)*,)?
            $msg
        )
    };
}
