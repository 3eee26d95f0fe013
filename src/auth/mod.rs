//! Proxy authentication module
//!
//! This module checks the `Proxy-Authorization` header of each request
//! against the configured identity. There is no session state; every
//! request is authenticated on its own.

mod verifier;

pub use verifier::{AuthOutcome, CredentialVerifier};
