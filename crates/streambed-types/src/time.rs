//! Millisecond event-time instants shared by windows, timers, and watermarks.

/// A 64-bit millisecond event-time instant.
pub type Timestamp = i64;

/// Stand-in for event time `-infinity`. Watermarks start here.
pub const MIN_TIMESTAMP: Timestamp = i64::MIN;

/// Stand-in for event time `+infinity`. Watermarks are driven here at the end of a key's input.
pub const MAX_TIMESTAMP: Timestamp = i64::MAX;

/// Delay added past `expiration(window)` before the GC timer actually fires, so that any user
/// timer set at exactly the expiration instant is guaranteed to fire first.
pub const GC_DELAY_MS: Timestamp = 1;
