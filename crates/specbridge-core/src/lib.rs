pub mod config;
pub mod engine;
pub mod error;
pub mod io;
pub mod model;
pub mod paths;
pub mod source;
pub mod state;
pub mod target;
pub mod types;

pub use error::{Result, SpecBridgeError};
