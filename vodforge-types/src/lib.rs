//! Vodforge Types
//!
//! Shared type definitions for the transcoding pipeline: source assets,
//! rendition rows and their encoding state machine, the quality ladder,
//! and the error taxonomy used across all Vodforge crates.

pub mod asset;
pub mod error;
pub mod ladder;
pub mod rendition;

pub use asset::*;
pub use error::*;
pub use ladder::*;
pub use rendition::*;
