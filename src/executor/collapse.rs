//! # Collapse: merge groups down to a pairwise symbol-disjoint set
//!
//! Used after every clause that might have introduced new overlapping
//! columns. Merges any two groups sharing at least one column,
//! left-to-right, iterating to a fixed point. Order is deterministic so
//! two runs over the same input produce the same grouping, even though
//! the final relation content doesn't depend on it.
//!
//! Each merge goes through `Relation::join`, which is itself the §4.4
//! strategy selector: build/probe hash join unless both sides are still
//! `Streaming` and `symmetric_hash_join` is enabled, in which case it
//! runs the symmetric streaming join instead of forcing a materialize.

use crate::error::EngineResult;
use crate::options::ExecutorOptions;
use crate::relation::Relation;

/// Merge `groups` until every pair is symbol-disjoint.
pub fn collapse(mut groups: Vec<Relation>, options: &ExecutorOptions) -> EngineResult<Vec<Relation>> {
    loop {
        let mut merged_any = false;
        'search: for i in 0..groups.len() {
            for j in (i + 1)..groups.len() {
                if shares_a_column(&groups[i], &groups[j]) {
                    let joined = groups[i].join(&groups[j], options)?;
                    // Remove the higher index first so the lower index
                    // stays valid.
                    groups.remove(j);
                    groups.remove(i);
                    groups.push(joined);
                    merged_any = true;
                    break 'search;
                }
            }
        }
        if !merged_any {
            return Ok(groups);
        }
    }
}

fn shares_a_column(a: &Relation, b: &Relation) -> bool {
    a.columns().iter().any(|c| b.columns().contains(c))
}
