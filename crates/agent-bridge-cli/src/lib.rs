//! Command-line front end for agent-bridge: argument parsing and logging
//! setup. `main.rs` is the composition root.

#![deny(unused_crate_dependencies)]

// Dependencies used by the main.rs binary
use agent_bridge_proxy as _;
use anyhow as _;
use dotenvy as _;
use tokio as _;
use tokio_util as _;
use tracing as _;

pub mod logging;
pub mod parser;

pub use logging::init_logging;
pub use parser::Cli;
