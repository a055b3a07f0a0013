mod demo;
mod schema;

pub use demo::{run_demo, DemoOptions, DemoReport};
pub use schema::envelope_schema;
