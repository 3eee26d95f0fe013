//! Common module
//!
//! This module contains shared errors and utility functions used throughout the application.

pub mod error;
pub mod fs;
pub mod log;

// Re-export commonly used types and functions
pub use error::{ProxyError, Result};
pub use fs::{check_file_exists, read_file};
pub use log::init_logger;
