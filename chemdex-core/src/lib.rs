//! Shared primitives and traits for the chemdex chemical search engine.
//!
//! `chemdex-core` provides the foundation that the other chemdex crates build
//! on:
//!
//! - **Error types** — [`ChemdexError`] and [`Result`] for structured error
//!   handling across parsing, chemistry and index layers
//! - **Traits** — Core abstractions like [`ContentAddressable`], [`Scored`],
//!   [`Annotated`]

pub mod error;
pub mod traits;

pub use error::{ChemdexError, Result};
pub use traits::*;
