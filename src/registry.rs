//! Handle registry: arena storage plus a stimulus-signature index.
//!
//! The arena (`Vec<Handle>`) owns handle storage; ids are opaque sequential
//! keys, never positions. A `HashMap` from stimulus signature to handle ids
//! makes candidate lookup O(1) in the number of registered signatures, and a
//! second id→position map resolves ids after pruning compacts the arena.

use std::collections::HashMap;

use crate::handle::{Handle, HandleId};

/// Append-mostly collection of handles with indexed stimulus lookup.
#[derive(Debug, Clone, Default)]
pub struct HandleRegistry {
    arena: Vec<Handle>,
    position: HashMap<HandleId, usize>,
    by_stimulus: HashMap<String, Vec<HandleId>>,
    next_id: u64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new handle and return its id. Ids are assigned sequentially
    /// starting at 1 and are never reused, even after pruning.
    pub fn create(
        &mut self,
        stimulus_sig: impl Into<String>,
        response_sig: impl Into<String>,
        eligibility: f64,
        truth: f64,
    ) -> HandleId {
        self.next_id += 1;
        let id = HandleId(self.next_id);
        let handle = Handle::new(id, stimulus_sig, response_sig, eligibility, truth);
        self.by_stimulus
            .entry(handle.stimulus_sig.clone())
            .or_default()
            .push(id);
        self.position.insert(id, self.arena.len());
        self.arena.push(handle);
        id
    }

    /// Insert a pre-built handle for tests and report reconstruction.
    /// The id counter advances past the inserted id.
    pub fn insert(&mut self, handle: Handle) {
        self.next_id = self.next_id.max(handle.id.get());
        self.by_stimulus
            .entry(handle.stimulus_sig.clone())
            .or_default()
            .push(handle.id);
        self.position.insert(handle.id, self.arena.len());
        self.arena.push(handle);
    }

    pub fn get(&self, id: HandleId) -> Option<&Handle> {
        self.position.get(&id).map(|&pos| &self.arena[pos])
    }

    pub fn get_mut(&mut self, id: HandleId) -> Option<&mut Handle> {
        let pos = *self.position.get(&id)?;
        Some(&mut self.arena[pos])
    }

    /// Ids of all handles whose stimulus signature matches, unordered.
    pub fn matching(&self, stimulus_sig: &str) -> Vec<HandleId> {
        self.by_stimulus
            .get(stimulus_sig)
            .cloned()
            .unwrap_or_default()
    }

    /// Ids of all matching handles, sorted by (strength desc, hits desc).
    /// This is the tie-break used everywhere in selection; no randomness.
    pub fn matching_ranked(&self, stimulus_sig: &str) -> Vec<HandleId> {
        let mut ids = self.matching(stimulus_sig);
        self.rank(&mut ids);
        ids
    }

    /// Sort ids in place by (strength desc, hits desc).
    pub fn rank(&self, ids: &mut [HandleId]) {
        ids.sort_by(|a, b| {
            let (ha, hb) = (&self.arena[self.position[a]], &self.arena[self.position[b]]);
            hb.strength()
                .total_cmp(&ha.strength())
                .then(hb.hits.cmp(&ha.hits))
        });
    }

    /// Whether a handle exists for this exact (stimulus, response) pair.
    pub fn pair_exists(&self, stimulus_sig: &str, response_sig: &str) -> bool {
        self.matching(stimulus_sig)
            .iter()
            .any(|id| self.get(*id).is_some_and(|h| h.response_sig == response_sig))
    }

    /// The handle for an exact (stimulus, response) pair, if any.
    pub fn find_pair(&self, stimulus_sig: &str, response_sig: &str) -> Option<HandleId> {
        self.matching(stimulus_sig)
            .into_iter()
            .find(|id| self.get(*id).is_some_and(|h| h.response_sig == response_sig))
    }

    /// Apply one decay tick to every handle and prune those whose strength
    /// falls below `prune_below` (pruning disabled when the floor is 0).
    /// Returns the number of handles pruned.
    pub fn decay_all(&mut self, rate: f64, prune_below: f64) -> usize {
        if rate <= 0.0 {
            return 0;
        }
        for h in &mut self.arena {
            h.decay(rate);
        }
        if prune_below <= 0.0 {
            return 0;
        }
        let before = self.arena.len();
        self.arena.retain(|h| h.strength() >= prune_below);
        let pruned = before - self.arena.len();
        if pruned > 0 {
            self.reindex();
        }
        pruned
    }

    fn reindex(&mut self) {
        self.position.clear();
        self.by_stimulus.clear();
        for (pos, h) in self.arena.iter().enumerate() {
            self.position.insert(h.id, pos);
            self.by_stimulus
                .entry(h.stimulus_sig.clone())
                .or_default()
                .push(h.id);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Handle> {
        self.arena.iter()
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// All handles, strongest first, for display and diagnostics.
    pub fn ranked(&self) -> Vec<&Handle> {
        let mut all: Vec<&Handle> = self.arena.iter().collect();
        all.sort_by(|a, b| {
            b.strength()
                .total_cmp(&a.strength())
                .then(b.hits.cmp(&a.hits))
        });
        all
    }
}
