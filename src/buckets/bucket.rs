//! A single state fragment.

use crate::types::{object_key, BucketId, State, Trackable};
use indexmap::IndexMap;
use std::rc::{Rc, Weak};

/// Membership for one fragment of a state.
///
/// Members are held weakly, keyed by object address. Dropping a bucket
/// severs every remaining member's back-reference, so no live object is left
/// pointing at a freed bucket.
pub struct StateBucket<S: State, O: Trackable> {
    /// Handle of this bucket in the arena.
    id: BucketId,

    /// State this fragment was last reconciled to. May lag behind the chain
    /// key between a splice and the purge that follows it.
    pub(crate) tag: S,

    /// Object address -> weak reference.
    members: IndexMap<usize, Weak<O>>,
}

impl<S: State, O: Trackable> StateBucket<S, O> {
    pub(crate) fn new(id: BucketId, tag: S) -> Self {
        Self {
            id,
            tag,
            members: IndexMap::new(),
        }
    }

    pub fn id(&self) -> BucketId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Insert `obj` and point its back-reference here.
    pub(crate) fn insert(&mut self, obj: &Rc<O>) {
        self.members.insert(object_key(&**obj), Rc::downgrade(obj));
        obj.bucket_slot().set(self.id);
    }

    /// Remove by identity. Returns false if the object was not a member.
    pub(crate) fn remove(&mut self, obj: &O) -> bool {
        self.members.swap_remove(&object_key(obj)).is_some()
    }

    pub(crate) fn contains(&self, obj: &O) -> bool {
        self.members.contains_key(&object_key(obj))
    }

    /// The member behind `weak`, if it is alive and still points here.
    ///
    /// A member whose object was dropped without clearing, or was taken over
    /// by another index, is stale.
    fn live_member(id: BucketId, weak: &Weak<O>) -> Option<Rc<O>> {
        weak.upgrade()
            .filter(|obj| obj.bucket_slot().get() == Some(id))
    }

    /// Drop stale members. Returns how many were removed.
    pub(crate) fn prune(&mut self) -> usize {
        let id = self.id;
        let before = self.members.len();
        self.members
            .retain(|_, weak| Self::live_member(id, weak).is_some());
        before - self.members.len()
    }

    /// Move every live member of `donor` into `self` and re-point it. Stale
    /// members are discarded.
    ///
    /// Returns the number of members moved.
    pub(crate) fn absorb(&mut self, donor: &mut StateBucket<S, O>) -> usize {
        let donor_id = donor.id;
        let mut moved = 0;
        self.members.reserve(donor.members.len());
        for (key, weak) in donor.members.drain(..) {
            if let Some(obj) = Self::live_member(donor_id, &weak) {
                obj.bucket_slot().set(self.id);
                self.members.insert(key, weak);
                moved += 1;
            }
        }
        moved
    }

    /// Append live members in insertion order, dropping stale ones. Returns
    /// how many stale entries were removed.
    pub(crate) fn collect_into(&mut self, out: &mut Vec<Rc<O>>) -> usize {
        let id = self.id;
        let before = self.members.len();
        self.members.retain(|_, weak| match Self::live_member(id, weak) {
            Some(obj) => {
                out.push(obj);
                true
            }
            None => false,
        });
        before - self.members.len()
    }
}

impl<S: State, O: Trackable> PartialEq<S> for StateBucket<S, O> {
    fn eq(&self, other: &S) -> bool {
        self.tag == *other
    }
}

impl<S: State, O: Trackable> Drop for StateBucket<S, O> {
    fn drop(&mut self) {
        for weak in self.members.values() {
            // The index does not own members; it only forgets them.
            if let Some(obj) = weak.upgrade() {
                obj.bucket_slot().release(self.id);
            }
        }
    }
}
