//! Tasks: the unit of dispatched work and its lease maintenance.

pub mod lease;
pub mod model;

pub use lease::spawn_lease_sweeper;
pub use model::{Task, TaskIdGenerator, TaskStatus};
