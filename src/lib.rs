//! AI Relay - streaming bridge between browser clients and a conversational AI backend
//!
//! A query arrives over HTTP or a WebSocket push channel, is forwarded to the
//! upstream backend, and the streamed answer is normalized into text deltas,
//! citations and exactly one terminal event.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
