//! Pull-based task dispatch over gRPC: the orchestrator-side service and the
//! worker agent that polls it.

pub mod agent;
pub mod proto;
pub mod server;

pub use agent::Agent;
pub use server::CalculatorService;
