//! A declarative trigger tree compiled into an executable finite state machine.

pub mod machine;
pub mod tree;

pub use machine::{NullTriggerContext, TriggerContext, TriggerMachine};
pub use tree::Trigger;
