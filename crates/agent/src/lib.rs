//! The streaming turn engine for Monadic Chat.
//!
//! A turn follows a **Request → Stream → Dispatch** cycle:
//!
//! 1. **Commit** the pending user message and slide the context window
//! 2. **Send** the vendor request, retrying transient failures
//! 3. **Stream** the body, emitting one fragment per character
//! 4. **If function calls**: dispatch them, record the round, loop back to step 2
//! 5. **Otherwise**: emit the final message and return
//!
//! The loop stops when a response carries no function calls or the call
//! depth limit is reached.

pub mod builder;
pub mod turn;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use builder::build_app_session;
pub use turn::{StreamingToolCallSession, TurnOptions, TurnOutcome};
