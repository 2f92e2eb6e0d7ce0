//! List-compartment access policy.
//!
//! The decision pipeline, leaves first:
//!
//! - [`request`] - the read-only view of an inbound request
//! - [`classifier`] - picks a [`Strategy`] from method and request shape
//! - [`rules`] - per-resource-type extraction rules
//! - [`body`] - minimal resource body parsing
//! - [`extractor`] - turns a classified request into candidate patients
//! - [`membership`] - asks the backend whether candidates are in a List
//! - [`checker`] - the ordered, deny-by-default decision policy
//! - [`factory`] - binds a caller's compartment claim into a checker
//!
//! ```ignore
//! let factory = AccessCheckerFactory::from_config(&config);
//! let checker = factory.create(&token, client)?;
//!
//! let request = IncomingRequest::from_path(HttpMethod::Get, "Observation?subject=PA", None)?;
//! if checker.check_access(&request).await?.is_allowed() {
//!     // forward
//! }
//! ```

pub mod body;
pub mod checker;
pub mod classifier;
pub mod decision;
pub mod extractor;
pub mod factory;
pub mod membership;
pub mod request;
pub mod rules;

pub use body::{BodyError, ParsedResource};
pub use checker::AccessChecker;
pub use classifier::{Strategy, classify};
pub use decision::{AccessDecision, DenyReason};
pub use extractor::{PatientReference, PatientSet, ReferenceExtractor, Targets};
pub use factory::AccessCheckerFactory;
pub use membership::{ListMembershipClient, MembershipQuery};
pub use request::{HttpMethod, IncomingRequest, SearchParams};
pub use rules::{ReferenceRule, ReferenceRules, ResourceFamily};
