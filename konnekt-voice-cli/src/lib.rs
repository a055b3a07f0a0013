pub mod application;
pub mod infrastructure;

pub use application::{envelope_schema, run_demo, DemoOptions, DemoReport};
pub use infrastructure::{CliError, LogConfig, Result};
