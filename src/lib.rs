//! Numeric core for Hi-C contact matrix analysis.
//!
//! The crate covers the matrix-level algorithms of a Hi-C pipeline:
//!
//! - iterative balancing of raw contact matrices ([`tools::balance`]),
//! - distance-stratified observed/expected normalization
//!   ([`tools::expected`]),
//! - diamond insulation scoring and boundary calling
//!   ([`tools::insulation`]),
//! - a lazy Toeplitz matrix for distance-decay backgrounds
//!   ([`data_structs::LazyToeplitz`]),
//! - diagonal, fill and robust-statistics helpers ([`utils`]).
//!
//! Every routine copies its input by default; `*_in_place` variants mutate
//! the caller's array instead. Missing values are explicit: pixels carry a
//! validity flag and per-bin results are `Option<f64>`.

#[macro_use]
pub mod error;
pub mod data_structs;
pub mod prelude;
pub mod tools;
pub mod utils;
