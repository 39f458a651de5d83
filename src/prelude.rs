pub use crate::data_structs::*;
pub use crate::error::{
    hic_error,
    HicError,
};
pub use crate::tools::balance::{
    balance,
    balance_in_place,
    BalanceConfig,
    Balanced,
    BiasCorrection,
    ConvergenceReport,
};
pub use crate::tools::expected::{
    logbins,
    observed_over_expected,
    observed_over_expected_in_place,
    DistanceProfile,
    ExpectedConfig,
    ObservedOverExpected,
};
pub use crate::tools::insulation::{
    bad_bin_windows,
    find_insulating_boundaries,
    insul_diamond,
    score_insulation,
    BoundaryFinder,
    ChromInsulation,
    ChromosomeSource,
    InMemoryChromosome,
    InsulationConfig,
    InsulationScores,
    InsulationTable,
};
pub use crate::tools::PipelineConfig;
