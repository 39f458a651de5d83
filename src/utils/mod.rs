//! This module contains various utility functions and helper macros used
//! throughout the hicxplorer crate.
//!
//! Key functionalities include:
//!
//! - Reading and writing matrix diagonals ([`get_diag`], [`set_diag`],
//!   [`fill_diagonal`]) with copying and in-place variants.
//! - Replacement of NaN / infinite entries and block coarsening of arrays.
//! - NaN-aware statistical reducers and robust statistics (MAD, comedian,
//!   score normalization, symmetry test).
//! - Macros for common struct operations (builder-style `with_*` methods).

mod array;
mod diag;
mod stats;

pub use array::*;
pub use diag::*;
pub use stats::*;

#[macro_export]
macro_rules! with_field_fn {
    ($field_name: ident, $field_type: ty) => {
        paste::paste! {
            #[cfg_attr(coverage_nightly, coverage(off))]
            pub fn [<with_$field_name>](mut self, value: $field_type) -> Self {
                self.$field_name = value;
                self
            }
        }
    };
}
