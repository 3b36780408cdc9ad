//! Shared types for the handle checker workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
