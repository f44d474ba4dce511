//! Client-side registry of buffer ids.
//!
//! Ids are picked here, before the `store` round trip, so the client knows the
//! id without asking the worker. The worker never allocates ids.

use portrpc::ids::IdSet;

use crate::protocol::BufferId;

#[derive(Debug, Default)]
pub struct ResourceIds {
    ids: IdSet,
}

impl ResourceIds {
    pub fn new() -> Self {
        Self { ids: IdSet::new() }
    }

    /// Reserves an id that is not held by any live buffer.
    pub fn allocate(&self) -> BufferId {
        BufferId(self.ids.add_unique())
    }

    /// Returns `id` to the pool. Returns `false` if it was not reserved.
    pub fn release(&self, id: BufferId) -> bool {
        self.ids.remove(id.0)
    }

    pub fn contains(&self, id: BufferId) -> bool {
        self.ids.contains(id.0)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
