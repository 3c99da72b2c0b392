pub mod config;
pub mod error;
pub mod geometry;
pub mod io;
pub mod math;
pub mod operations;
pub mod pipeline;

pub use config::InterfaceParams;
pub use error::{InterfaceError, Result};
pub use pipeline::{InterfacePipeline, InterfaceRun};
