pub mod concat;
mod error;
pub mod pipeline;
pub mod plan;
pub mod probe;
pub mod process;
pub mod separate;
pub mod venv;

pub use error::{Error, Result};
pub use pipeline::{Job, Outputs, Pipeline};
