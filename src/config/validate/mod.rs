//! Configuration validation
//!
//! Validates run configurations before any model or data is loaded.

mod error;
mod validator;

#[cfg(test)]
mod proptests;
#[cfg(test)]
mod tests;

pub use error::ValidationError;
pub use validator::{validate_config, validate_paths};
