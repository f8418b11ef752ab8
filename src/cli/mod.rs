pub mod commands;
pub mod error;
pub mod export;
pub mod output;

pub use commands::*;
pub use error::*;
pub use output::*;
