//! # Hash index: the build side of a hash join
//!
//! Generalizes a single-column index into a composite multi-column key
//! keyed by value equality (not position), with an optional Bloom filter
//! over the same keys for a fast negative-probe path.
//!
//! ```rust
//! use datalog_engine::join::hash::{HashIndex, JoinKeySpec};
//! use datalog_engine::value::{Tuple, Value};
//!
//! let spec = JoinKeySpec::new(vec![0]);
//! let mut index = HashIndex::new(spec, 16);
//! index.insert(Tuple::new(vec![Value::Int(1), Value::Int(99)]));
//! let matches: Vec<_> = index.probe(&[Value::Int(1)]).collect();
//! assert_eq!(matches.len(), 1);
//! ```

use crate::join::bloom::BloomFilter;
use crate::value::{Tuple, Value};
use std::collections::HashMap;

/// Which positions of a tuple make up the composite join key.
#[derive(Debug, Clone)]
pub struct JoinKeySpec {
    pub indices: Vec<usize>,
}

impl JoinKeySpec {
    pub fn new(indices: Vec<usize>) -> Self {
        JoinKeySpec { indices }
    }

    pub fn key_of(&self, tuple: &Tuple) -> Vec<Value> {
        self.indices.iter().map(|&i| tuple.values()[i].clone()).collect()
    }
}

/// A composite-key hashmap of build-side tuples, with an optional Bloom
/// filter for fast negative probes.
pub struct HashIndex {
    spec: JoinKeySpec,
    table: HashMap<Vec<Value>, Vec<Tuple>>,
    bloom: Option<BloomFilter>,
}

impl HashIndex {
    pub fn new(spec: JoinKeySpec, starting_capacity: usize) -> Self {
        HashIndex {
            spec,
            table: HashMap::with_capacity(starting_capacity),
            bloom: None,
        }
    }

    /// Build with a Bloom filter sized for `expected_items` insertions.
    pub fn with_bloom(spec: JoinKeySpec, starting_capacity: usize, expected_items: usize) -> Self {
        HashIndex {
            spec,
            table: HashMap::with_capacity(starting_capacity),
            bloom: Some(BloomFilter::new(expected_items.max(1), 0.01)),
        }
    }

    pub fn insert(&mut self, tuple: Tuple) {
        let key = self.spec.key_of(&tuple);
        if let Some(bloom) = &mut self.bloom {
            bloom.insert(&key);
        }
        self.table.entry(key).or_default().push(tuple);
    }

    pub fn build<I: IntoIterator<Item = Tuple>>(spec: JoinKeySpec, tuples: I, use_bloom: bool) -> Self {
        let tuples: Vec<Tuple> = tuples.into_iter().collect();
        let mut index = if use_bloom {
            HashIndex::with_bloom(spec, tuples.len(), tuples.len())
        } else {
            HashIndex::new(spec, tuples.len())
        };
        for tuple in tuples {
            index.insert(tuple);
        }
        index
    }

    /// Probe for tuples matching `key`. When a Bloom filter is present
    /// and reports the key as definitely absent, this skips the hashmap
    /// lookup entirely.
    pub fn probe(&self, key: &[Value]) -> impl Iterator<Item = &Tuple> {
        let present = match &self.bloom {
            Some(bloom) => bloom.might_contain(&key.to_vec()),
            None => true,
        };
        if !present {
            return [].iter();
        }
        self.table.get(key).map(|v| v.iter()).unwrap_or([].iter())
    }

    pub fn key_spec(&self) -> &JoinKeySpec {
        &self.spec
    }

    pub fn len(&self) -> usize {
        self.table.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
