use midipro_ports::backend::BackendError;
use midipro_ports::types::SoundfontId;
use std::collections::BTreeMap;

/// Loaded soundfonts keyed by handle.
///
/// Handles are handed out from 1 upwards and never reused, even after the
/// entry is removed or the registry is cleared.
#[derive(Debug)]
pub struct SoundfontRegistry<R> {
    next_id: i32,
    entries: BTreeMap<SoundfontId, R>,
}

impl<R> Default for SoundfontRegistry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> SoundfontRegistry<R> {
    pub fn new() -> Self {
        Self {
            next_id: SoundfontId::FIRST.get(),
            entries: BTreeMap::new(),
        }
    }

    /// Handle the next successful insert will receive.
    pub fn peek_next_id(&self) -> SoundfontId {
        SoundfontId(self.next_id)
    }

    pub fn insert(&mut self, resource: R) -> SoundfontId {
        let id = SoundfontId(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, resource);
        id
    }

    pub fn get(&self, id: SoundfontId) -> Result<&R, BackendError> {
        self.entries
            .get(&id)
            .ok_or(BackendError::UnknownSoundfont(id))
    }

    pub fn get_mut(&mut self, id: SoundfontId) -> Result<&mut R, BackendError> {
        self.entries
            .get_mut(&id)
            .ok_or(BackendError::UnknownSoundfont(id))
    }

    pub fn remove(&mut self, id: SoundfontId) -> Result<R, BackendError> {
        self.entries
            .remove(&id)
            .ok_or(BackendError::UnknownSoundfont(id))
    }

    pub fn contains(&self, id: SoundfontId) -> bool {
        self.entries.contains_key(&id)
    }

    /// Empties the registry, handing back every resource in handle order.
    pub fn drain(&mut self) -> Vec<(SoundfontId, R)> {
        std::mem::take(&mut self.entries).into_iter().collect()
    }

    pub fn ids(&self) -> Vec<SoundfontId> {
        self.entries.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SoundfontId, &R)> {
        self.entries.iter().map(|(id, r)| (*id, r))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
