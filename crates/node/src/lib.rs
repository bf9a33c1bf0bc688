#![forbid(unsafe_code)]
#![allow(missing_docs)]

//! Node bootstrap: wiring and lifecycle for a laminar sequencer or follower.

pub mod config;
pub mod logging;
mod node;

pub use config::NodeConfig;
pub use logging::LoggingConfig;
pub use node::Node;
