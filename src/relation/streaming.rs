//! # Lazy caching for streaming relations
//!
//! The three-state machine from §4.3: **fresh**, **caching-in-progress**,
//! **cache-ready**. `materialize()` opts a streaming relation into replay
//! before the first `iterator()` call; the first consumer after that
//! builds the cache as a side effect of running the source iterator to
//! completion, and later consumers either block on a completion channel
//! (if caching is in flight) or replay immediately (once ready).
//!
//! Cache completion is signalled by dropping the one-shot channel's
//! sender: `crossbeam-channel` guarantees every current and future
//! `recv()` on any clone of the receiver returns immediately once every
//! sender is gone, which is exactly the broadcast-style wakeup this
//! state machine needs.

use crate::error::DoubleIterationError;
use crate::value::Tuple;
use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub type TupleIter = Box<dyn Iterator<Item = Tuple> + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheState {
    Fresh,
    Caching,
    Ready,
}

struct Inner {
    source: Mutex<Option<TupleIter>>,
    materialize_requested: AtomicBool,
    iterated_once: AtomicBool,
    cache_state: Mutex<CacheState>,
    cache: Mutex<Vec<Tuple>>,
    done_tx: Mutex<Option<Sender<()>>>,
    done_rx: Receiver<()>,
}

/// A single-use (by default) iterator source with opt-in lazy caching.
#[derive(Clone)]
pub struct CacheSlot(Arc<Inner>);

impl CacheSlot {
    pub fn new(source: TupleIter) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(0);
        CacheSlot(Arc::new(Inner {
            source: Mutex::new(Some(source)),
            materialize_requested: AtomicBool::new(false),
            iterated_once: AtomicBool::new(false),
            cache_state: Mutex::new(CacheState::Fresh),
            cache: Mutex::new(Vec::new()),
            done_tx: Mutex::new(Some(tx)),
            done_rx: rx,
        }))
    }

    /// Opt this relation into replay. Must be called before the first
    /// `iterator()` to have any effect; calling it afterward is a no-op
    /// because the cache-or-not decision for the first consumer has
    /// already been made.
    pub fn materialize(&self) {
        self.0.materialize_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_materialize_requested(&self) -> bool {
        self.0.materialize_requested.load(Ordering::SeqCst)
    }

    /// Produce an iterator per the state machine, or `DoubleIterationError`
    /// if this slot was never opted into caching and has already been
    /// consumed once.
    pub fn iterator(&self) -> Result<TupleIter, DoubleIterationError> {
        if !self.is_materialize_requested() {
            if self.0.iterated_once.swap(true, Ordering::SeqCst) {
                return Err(DoubleIterationError);
            }
            let source = self
                .0
                .source
                .lock()
                .take()
                .expect("uncached streaming source taken exactly once");
            return Ok(source);
        }

        let mut state = self.0.cache_state.lock();
        match *state {
            CacheState::Fresh => {
                *state = CacheState::Caching;
                drop(state);
                let source = self
                    .0
                    .source
                    .lock()
                    .take()
                    .expect("cached streaming source taken exactly once");
                Ok(Box::new(CachingIterator {
                    source,
                    slot: self.clone(),
                    exhausted: false,
                }))
            }
            CacheState::Caching => {
                drop(state);
                // Disconnection (every sender dropped) is how completion
                // is signalled; an Ok(()) send never actually happens.
                let _ = self.0.done_rx.recv();
                Ok(self.replay())
            }
            CacheState::Ready => {
                drop(state);
                Ok(self.replay())
            }
        }
    }

    fn replay(&self) -> TupleIter {
        Box::new(self.0.cache.lock().clone().into_iter())
    }

    /// Block under caching-in-progress so callers get an answer
    /// consistent with the eventual cached state, per §4.3.
    pub fn size_blocking(&self) -> Option<usize> {
        self.wait_for_ready_if_caching();
        if *self.0.cache_state.lock() == CacheState::Ready {
            Some(self.0.cache.lock().len())
        } else {
            None
        }
    }

    pub fn is_empty_blocking(&self) -> Option<bool> {
        self.size_blocking().map(|n| n == 0)
    }

    fn wait_for_ready_if_caching(&self) {
        let caching = *self.0.cache_state.lock() == CacheState::Caching;
        if caching {
            let _ = self.0.done_rx.recv();
        }
    }

    fn record_tuple(&self, tuple: Tuple) {
        self.0.cache.lock().push(tuple);
    }

    fn finish_caching(&self) {
        *self.0.cache_state.lock() = CacheState::Ready;
        // Dropping the sender closes the channel, waking every blocked
        // and every future `recv()` on `done_rx`.
        self.0.done_tx.lock().take();
    }
}

struct CachingIterator {
    source: TupleIter,
    slot: CacheSlot,
    exhausted: bool,
}

impl Iterator for CachingIterator {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        if self.exhausted {
            return None;
        }
        match self.source.next() {
            Some(tuple) => {
                // Copy before retention: the cache outlives this
                // iterator and the upstream source may reuse a buffer.
                self.slot.record_tuple(tuple.clone());
                Some(tuple)
            }
            None => {
                self.exhausted = true;
                self.slot.finish_caching();
                None
            }
        }
    }
}

impl Drop for CachingIterator {
    fn drop(&mut self) {
        // Idempotent Close(): if the consumer drops us before exhaustion
        // (e.g. an early break), still finish caching so waiters aren't
        // left blocked forever. Whatever was produced so far becomes the
        // (partial) cache.
        if !self.exhausted {
            self.slot.finish_caching();
        }
    }
}
