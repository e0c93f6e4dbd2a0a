pub mod cancel;
pub mod config;
pub mod crafting;
pub mod error;
pub mod interaction;
pub mod io;
pub mod orchestrator;
pub mod predicate;
pub mod program;
pub mod status;
pub mod switch;
pub mod tables;
pub mod types;
pub mod unlock;
pub mod world;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancellationSignal;
pub use error::{Result, WranglerError};
pub use types::ClassJob;
