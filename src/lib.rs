pub mod canvas;
pub mod cli;
pub mod components;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod project;
pub mod settings;

pub use canvas::{Color, PixelBuffer};
pub use error::{DocumentError, TraceError};
pub use project::Project;
