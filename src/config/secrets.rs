//! Secret handling utilities.
//!
//! Re-exports secrecy types and provides helpers for working with
//! secrets in the jarvis-rs context.

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
