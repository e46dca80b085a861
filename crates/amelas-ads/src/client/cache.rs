// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Symbol name to device handle cache.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use parking_lot::Mutex;

use crate::types::SymbolHandle;

/// Outcome of inserting a freshly resolved handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheInsert {
    /// The handle is now cached.
    Inserted(SymbolHandle),
    /// Another caller cached a handle first; the fresh one is surplus.
    Existing {
        /// Handle already in the cache.
        cached: SymbolHandle,
        /// Handle that lost the race and must be released.
        surplus: SymbolHandle,
    },
}

/// Lazily populated symbol → handle map.
///
/// A symbol maps to at most one handle. Entries live until they are removed
/// explicitly or the cache is drained on disconnect.
#[derive(Debug, Default)]
pub struct HandleCache {
    entries: Mutex<HashMap<String, SymbolHandle>>,
}

impl HandleCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle for `symbol`.
    pub fn get(&self, symbol: &str) -> Option<SymbolHandle> {
        self.entries.lock().get(symbol).copied()
    }

    /// Caches `handle` unless `symbol` already has one.
    pub(crate) fn insert(&self, symbol: &str, handle: SymbolHandle) -> CacheInsert {
        match self.entries.lock().entry(symbol.to_string()) {
            Entry::Occupied(entry) if *entry.get() != handle => CacheInsert::Existing {
                cached: *entry.get(),
                surplus: handle,
            },
            Entry::Occupied(entry) => CacheInsert::Inserted(*entry.get()),
            Entry::Vacant(entry) => CacheInsert::Inserted(*entry.insert(handle)),
        }
    }

    /// Removes and returns the handle for `symbol`.
    pub fn remove(&self, symbol: &str) -> Option<SymbolHandle> {
        self.entries.lock().remove(symbol)
    }

    /// Removes every entry, returning them.
    pub fn drain(&self) -> Vec<(String, SymbolHandle)> {
        self.entries.lock().drain().collect()
    }

    /// Returns the cached symbol names.
    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.entries.lock().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Returns the number of cached handles.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
