//! Entitlement engine orchestrating attribute validation and association
//! reconciliation.
//!
//! This module is organized into focused submodules:
//!
//! - `builder`: Configuration types and the fluent builder
//! - `core`: Engine structure, construction and schema loading
//! - `operations`: Create, patch, associate and metadata operations

pub mod builder;
pub mod core;
pub mod operations;


// Re-export all public types to maintain API compatibility
pub use builder::{EngineConfig, EntitlementEngineBuilder};
pub use core::EntitlementEngine;
pub use operations::{CreateUserRequest, EntitlementOutcome, EntitlementResult, PatchUserRequest};
