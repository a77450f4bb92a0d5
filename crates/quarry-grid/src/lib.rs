//! In-memory uniform-grid datasets for the Quarry field engine.
//!
//! A [`Dataset`] owns raw cell and particle arrays, dataset parameters,
//! a unit registry with code units, and a
//! [`FieldRegistry`](quarry_fields::FieldRegistry). Fields are read
//! through two kinds of evaluation context:
//!
//! - [`Grid`]: one patch of the domain, a 3-D stencil region that can be
//!   padded with ghost zones;
//! - [`AllData`]: the whole domain as one flat container.
//!
//! The domain is split into patches by [`partition`].

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod dataset;
pub mod edge;
pub mod error;
pub mod grid;
pub mod region;
pub mod union;

pub use config::DatasetConfig;
pub use dataset::Dataset;
pub use edge::EdgeBehavior;
pub use error::DatasetError;
pub use grid::Grid;
pub use region::{partition, Region};
pub use union::AllData;
