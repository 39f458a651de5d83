use serde::{
    Deserialize,
    Serialize,
};

use crate::with_field_fn;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsulationConfig {
    /// Size of the sliding diamond window in base pairs.
    pub window_bp:    u64,
    /// Maximal number of bad bins allowed on each side of the window.
    pub max_bad_bins: usize,
}

impl InsulationConfig {
    with_field_fn!(window_bp, u64);
    with_field_fn!(max_bad_bins, usize);

    pub fn new(
        window_bp: u64,
        max_bad_bins: usize,
    ) -> Self {
        Self {
            window_bp,
            max_bad_bins,
        }
    }

    /// Window size in bins for a given bin size.
    ///
    /// The window must be a positive multiple of the bin size.
    pub fn window_bins(
        &self,
        bin_size: u64,
    ) -> anyhow::Result<usize> {
        if bin_size == 0 {
            bail_config!("bin size must be positive");
        }
        if self.window_bp == 0 {
            bail_config!("insulation window must be positive");
        }
        if self.window_bp % bin_size != 0 {
            bail_config!(
                "the window size ({}) has to be a multiple of the bin size {}",
                self.window_bp,
                bin_size
            );
        }
        Ok((self.window_bp / bin_size) as usize)
    }
}

impl Default for InsulationConfig {
    fn default() -> Self {
        Self {
            window_bp:    100_000,
            max_bad_bins: 2,
        }
    }
}
