//! HTTP server assembly and response envelopes.

pub mod response;
pub mod server;

pub use server::{AppState, HttpServer};
