//! # fhirgate-core
//!
//! FHIR primitives shared by the fhirgate crates:
//!
//! - [`fhir_reference`] - parsing of reference strings (`Patient/123`, versioned,
//!   absolute, contained and URN forms)
//! - [`id`] - validation of FHIR logical ids

pub mod fhir_reference;
pub mod id;

pub use fhir_reference::{FhirReference, UnresolvableReference, parse_reference};
pub use id::{IdError, is_valid_id, validate_id};
