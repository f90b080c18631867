//! Core types for the state partition index.

use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

/// A discrete state an object can occupy.
///
/// `Default` doubles as the sentinel reported for untracked objects.
pub trait State: Copy + Eq + Hash + Default + fmt::Debug + fmt::Display {}

impl<T> State for T where T: Copy + Eq + Hash + Default + fmt::Debug + fmt::Display {}

static INDEX_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier of one index instance.
///
/// Allocated from a process-wide counter, so two indexes never share an id
/// even if one is dropped and another is created in its place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexId(u64);

impl IndexId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(INDEX_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for IndexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable handle to a bucket in an index arena.
///
/// Scoped to the index that issued it. The generation changes every time an
/// arena slot is recycled, so a handle that outlived its bucket never
/// resolves to a newer one.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct BucketId {
    pub(crate) index: IndexId,
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl BucketId {
    pub(crate) fn new(index: IndexId, slot: u32, generation: u32) -> Self {
        Self {
            index,
            slot,
            generation,
        }
    }

    /// The index this handle belongs to.
    pub fn index(&self) -> IndexId {
        self.index
    }
}

impl fmt::Debug for BucketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BucketId({}:{}@{})", self.index, self.slot, self.generation)
    }
}

/// Back-reference from a tracked object to the bucket holding it.
///
/// Embedded in the collaborator's object. Only the index reads or writes the
/// handle; from outside the crate a slot can only be created and queried for
/// whether it is currently tracked.
#[derive(Default)]
pub struct BucketSlot {
    bucket: Cell<Option<BucketId>>,
}

impl BucketSlot {
    /// Create an untracked slot.
    pub const fn new() -> Self {
        Self {
            bucket: Cell::new(None),
        }
    }

    /// Whether some index currently holds this object in a bucket.
    pub fn is_tracked(&self) -> bool {
        self.bucket.get().is_some()
    }

    pub(crate) fn get(&self) -> Option<BucketId> {
        self.bucket.get()
    }

    pub(crate) fn set(&self, id: BucketId) {
        self.bucket.set(Some(id));
    }

    pub(crate) fn clear(&self) {
        self.bucket.set(None);
    }

    /// Null the handle only if it still points at `id`.
    pub(crate) fn release(&self, id: BucketId) -> bool {
        if self.bucket.get() == Some(id) {
            self.bucket.set(None);
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for BucketSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bucket.get() {
            Some(id) => write!(f, "BucketSlot({:?})", id),
            None => write!(f, "BucketSlot(untracked)"),
        }
    }
}

/// An object whose state can be tracked by a [`StatePartitionIndex`](crate::StatePartitionIndex).
///
/// The index never owns the object. It only needs the one slot where it keeps
/// the handle of the bucket the object currently lives in.
pub trait Trackable {
    /// The object's back-reference slot.
    fn bucket_slot(&self) -> &BucketSlot;
}

/// How much work a mutating call did.
///
/// `Defragmented` is a performance signal, not a failure: the call had to
/// merge fragments, which is linear in the live membership of a state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunCost {
    /// Pure constant-time (or fragment-linear purge) work.
    Constant,
    /// A defragmentation ran during this call.
    Defragmented,
}

impl RunCost {
    /// True when no defragmentation ran.
    pub fn is_constant(self) -> bool {
        matches!(self, RunCost::Constant)
    }

    /// Fold two results; constant only if both were.
    pub fn and(self, other: RunCost) -> RunCost {
        if self.is_constant() && other.is_constant() {
            RunCost::Constant
        } else {
            RunCost::Defragmented
        }
    }
}

impl Default for RunCost {
    fn default() -> Self {
        RunCost::Constant
    }
}

/// Address-derived identity of a tracked object.
pub(crate) fn object_key<O>(obj: &O) -> usize {
    obj as *const O as usize
}
