pub mod config;
pub mod error;
pub mod infrastructure;
pub mod services;
pub mod utils;

pub use error::{OpsError, Step};
