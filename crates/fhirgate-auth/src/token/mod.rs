//! Access to claims of an already verified token.
//!
//! Token verification happens upstream in the proxy. The engine only reads
//! the compartment claim through [`ClaimReader`].

pub mod claims;

pub use claims::{ClaimReader, string_claim};
