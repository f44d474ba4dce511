//! # Identifier allocation
//!
//! Identifiers are plain integers drawn at random from the safe-integer range
//! and checked against the set of identifiers currently in use.
//!
//! ## Philosophy
//!
//! - **Claim, don't check**: The allocator never inspects a set itself. It offers
//!   candidates to a `claim` closure that inserts atomically and reports success,
//!   so there is no window between "found a free id" and "marked it as used".
//! - **Uniqueness over order**: Identifiers carry no ordering. Collisions are rare
//!   given the range and are resolved by drawing again.

use dashmap::DashSet;
use rand::Rng;

/// Largest integer that survives a round trip through an IEEE-754 double.
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

/// Identifier of an in-flight call, unique among pending calls on one broker.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallId(pub u64);

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// Draws candidates from the thread-local rng until `claim` accepts one.
pub fn allocate(claim: impl FnMut(u64) -> bool) -> u64 {
    allocate_with(&mut rand::thread_rng(), claim)
}

/// Draws candidates from `rng` until `claim` accepts one.
///
/// `claim` must insert the candidate into its set and return `true`, or return
/// `false` if the candidate is already taken. There is no retry limit.
pub fn allocate_with<R: Rng>(rng: &mut R, mut claim: impl FnMut(u64) -> bool) -> u64 {
    let mut attempts = 0u32;
    loop {
        let candidate = rng.gen_range(0..=MAX_SAFE_INTEGER);
        if claim(candidate) {
            if attempts > 0 {
                tracing::trace!(candidate, attempts, "identifier allocated after collisions");
            }
            return candidate;
        }
        attempts += 1;
    }
}

/// A concurrent set of identifiers in use.
#[derive(Debug, Default)]
pub struct IdSet {
    ids: DashSet<u64>,
}

impl IdSet {
    pub fn new() -> Self {
        Self { ids: DashSet::new() }
    }

    /// Allocates a fresh identifier and marks it as used.
    pub fn add_unique(&self) -> u64 {
        allocate(|candidate| self.ids.insert(candidate))
    }

    /// Marks `id` as used. Returns `false` if it already was.
    pub fn insert(&self, id: u64) -> bool {
        self.ids.insert(id)
    }

    /// Releases `id`. Returns `false` if it was not in use.
    pub fn remove(&self, id: u64) -> bool {
        self.ids.remove(&id).is_some()
    }

    pub fn contains(&self, id: u64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
