//! Core data types shared by the numeric tools.
//!
//! - [`ContactMatrix`]: dense square Hi-C matrix with an explicit per-pixel
//!   validity mask.
//! - [`ValidityMask`]: per-bin or per-pixel exclusion mask.
//! - [`LazyToeplitz`]: compact distance-decay background that materializes
//!   dense blocks on demand.
//! - [`DistanceBin`] and [`InsulationTrack`]: per-call results of the
//!   observed/expected and insulation tools.

mod matrix;
mod toeplitz;
mod track;

pub use matrix::{
    ContactMatrix,
    ValidityMask,
};
pub use toeplitz::LazyToeplitz;
pub use track::{
    DistanceBin,
    InsulationTrack,
};
