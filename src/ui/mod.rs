//! Terminal UI layer for the persona chat.
//!
//! - [`chat_loop`]: the event loop. It reads terminal input, dispatches turns
//!   to background workers and drains their results back onto the loop.
//! - [`renderer`]: frame composition for the transcript, input box and status
//!   bar.
//!
//! Ownership boundary: this layer presents and captures interaction state,
//! while [`crate::core`] owns the turn pipeline and the backends.

pub mod chat_loop;
pub mod renderer;
