pub mod checklist;
pub mod config;
pub mod controller;
pub mod detect;
pub mod error;
pub mod github;
pub mod io;
pub mod lifecycle;
pub mod memory;
pub mod paths;
pub mod report;
pub mod signal;
pub mod store;
pub mod sync;
pub mod types;
pub mod validation;
pub mod verify;
pub mod worker;

pub use error::{Result, SprintError};
