//! Domain layer containing relay logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, state machine, errors)
//! - `relay` - Queries, sessions, stream events and the event normalizer

pub mod foundation;
pub mod relay;
