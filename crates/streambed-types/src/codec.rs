//! Reference encoding for the closed, serde-enabled parts of a key's persisted state: pending
//! timers. A host persists a key by calling `into_parts` (§6) and encoding what it gets back; the
//! `StateStore` half is host-defined and type-erased (`Box<dyn Any>`), so this crate can't encode
//! it generically, but `TimerStore`'s contents are plain data and can be encoded once, here, with
//! the ambient `bincode` format (§1.1) rather than every host re-deriving its own.

use crate::error::{CoreError, Result};
use crate::timer::Timer;

/// Encodes a batch of timers with `bincode`.
pub fn encode_timers(timers: &[Timer]) -> Result<Vec<u8>> {
    bincode::serialize(timers).map_err(|e| CoreError::Codec(format!("failed to encode timers: {e}")))
}

/// Decodes a batch of timers previously produced by [`encode_timers`].
pub fn decode_timers(bytes: &[u8]) -> Result<Vec<Timer>> {
    bincode::deserialize(bytes).map_err(|e| CoreError::Codec(format!("failed to decode timers: {e}")))
}
