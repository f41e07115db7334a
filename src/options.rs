//! # Executor options and configuration
//!
//! `ExecutorOptions` is the record enumerated in §6: the feature toggles
//! and thresholds that change how the executor behaves for a given call.
//! `EngineConfig` is the ambient, `figment`-loadable source of defaults
//! for the numeric options, merged from a TOML source plus
//! `DATALOG_ENGINE__`-prefixed environment variables. Reading a config
//! file off disk at process start is a host's job; this type only owns
//! the merge chain and defaults.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// Feature toggles and thresholds read by the clause/phase/subquery
/// executors. Constructed directly for tests and fine-grained control, or
/// derived from an `EngineConfig` for a host that wants file/env-driven
/// defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorOptions {
    /// Enable lazy chain-of-iterators for Filter / Project /
    /// FunctionEvaluator / PredicateFilter.
    pub iterator_composition: bool,
    /// Allow iterators to reuse a tuple buffer between `next()` calls;
    /// consumers that retain tuples must copy.
    pub true_streaming: bool,
    /// Use the symmetric hash join variant for streaming × streaming
    /// joins.
    pub symmetric_hash_join: bool,
    /// Permit single-pass aggregation when applicable.
    pub streaming_aggregation: bool,
    /// Minimum input size to prefer streaming over batch aggregation.
    pub streaming_aggregation_threshold: usize,
    /// Enable worker-pool parallelism for subquery execution.
    pub parallel_subqueries: bool,
    /// 0 means hardware concurrency.
    pub max_subquery_workers: usize,
    /// Stream results of parallel subqueries through a union relation
    /// rather than materializing and concatenating.
    pub streaming_subquery_union: bool,
    pub subquery_decorrelation: bool,
    pub parallel_decorrelation: bool,
    pub use_batched_subquery: bool,
    pub use_query_executor: bool,
    pub debug_logging: bool,
    pub streaming_aggregation_debug: bool,
    /// Minimum binding count before the strategy selector prefers
    /// parallel over sequential subquery execution.
    pub parallel_subquery_threshold: usize,
    /// Starting hashmap capacity for the symmetric hash join's two
    /// tables.
    pub symmetric_hash_join_capacity: usize,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        ExecutorOptions {
            iterator_composition: true,
            true_streaming: true,
            symmetric_hash_join: true,
            streaming_aggregation: true,
            streaming_aggregation_threshold: 10_000,
            parallel_subqueries: true,
            max_subquery_workers: 0,
            streaming_subquery_union: false,
            subquery_decorrelation: true,
            parallel_decorrelation: true,
            use_batched_subquery: true,
            use_query_executor: true,
            debug_logging: false,
            streaming_aggregation_debug: false,
            parallel_subquery_threshold: 100,
            symmetric_hash_join_capacity: 1024,
        }
    }
}

impl ExecutorOptions {
    /// Resolve `max_subquery_workers`: `0` means hardware concurrency.
    pub fn worker_count(&self) -> usize {
        if self.max_subquery_workers == 0 {
            num_cpus::get().max(1)
        } else {
            self.max_subquery_workers
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        ExecutorOptions {
            streaming_aggregation_threshold: config.streaming_aggregation_threshold,
            max_subquery_workers: config.max_subquery_workers,
            parallel_subquery_threshold: config.parallel_subquery_threshold,
            symmetric_hash_join_capacity: config.symmetric_hash_join_capacity,
            ..ExecutorOptions::default()
        }
    }
}

/// Ambient, externally loadable defaults for the numeric tunables in
/// `ExecutorOptions`. A host reads this with `EngineConfig::load_from`
/// (TOML provider plus environment, the latter taking precedence); the
/// core itself never touches the filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub streaming_aggregation_threshold: usize,
    pub max_subquery_workers: usize,
    pub parallel_subquery_threshold: usize,
    pub symmetric_hash_join_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            streaming_aggregation_threshold: 10_000,
            max_subquery_workers: 0,
            parallel_subquery_threshold: 100,
            symmetric_hash_join_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Merge defaults, an optional TOML file's contents, and
    /// `DATALOG_ENGINE__`-prefixed environment variables, in that order
    /// of increasing precedence. `toml_source` is the file's contents,
    /// not a path — reading the file off disk is left to the host per
    /// the out-of-scope boundary on config bootstrapping.
    pub fn load_from(toml_source: Option<&str>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(EngineConfig::default()));
        if let Some(source) = toml_source {
            figment = figment.merge(Toml::string(source));
        }
        figment = figment.merge(Env::prefixed("DATALOG_ENGINE__").split("__"));
        figment.extract()
    }
}
