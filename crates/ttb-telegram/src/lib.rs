//! Telegram adapter (teloxide).
//!
//! This crate owns the dispatch table: inbound updates are classified,
//! gated by the identity check, and executed inside the fault-containment
//! boundary so every request gets exactly one reply.

pub mod handlers;
pub mod router;
