//! Service layer for business logic
//!
//! HTTP handlers stay thin; validation and owner scoping live here.

pub mod blacklist;
pub mod profile_service;

pub use blacklist::BlacklistFilter;
pub use profile_service::{ProfileInput, ProfileService};
