//! State module for the provider.
//!
//! This module defines the persisted record of a resource's declarative
//! state. Storage itself belongs to the declarative engine.

mod types;

pub use types::ResourceState;
