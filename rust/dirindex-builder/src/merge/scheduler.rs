use dirindex_common::Result;
use rayon::prelude::*;

use crate::{config::ImportConfig, index::AttributeIndex, store::IndexStore};

use super::MergeStats;

/// Merges the intermediate files of several indexes, one rayon task per index.
///
/// Each merge runs without an ambient transaction. Results are returned in the
/// order of `jobs`; a failed index does not stop the others.
pub fn merge_indexes<S>(
    jobs: &[AttributeIndex<S>],
    import_config: &ImportConfig,
) -> Vec<Result<MergeStats>>
where
    S: IndexStore,
{
    jobs.par_iter()
        .map(|index| index.merge(None, import_config))
        .collect()
}
