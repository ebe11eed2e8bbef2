//! calc-dispatch: arithmetic expressions evaluated over HTTP or farmed out
//! to pull-based workers over gRPC.

pub mod api;
pub mod auth;
pub mod calculator;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod runtime;
pub mod server;
pub mod store;
pub mod tasks;
