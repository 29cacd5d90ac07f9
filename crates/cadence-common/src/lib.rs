//! # Cadence Common
//!
//! Common types shared by the Cadence audio crates:
//! - Handle ids and the generational arena that issues them
//! - Audio clips and named assets
//! - Volume level helpers and the mixer decibel mapping
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod clip;
pub mod error;
pub mod ids;
pub mod level;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clip::*;
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::level::*;
}

pub use prelude::*;
