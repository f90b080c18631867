//! Slab of buckets with intrusive per-state chains.
//!
//! Buckets live in a `Vec` of slots addressed by [`BucketId`]. Handles carry
//! the owning index's id, so an arena never resolves another index's handle.
//! Freed slots go onto a free list and bump their generation. Each slot carries a `next`
//! link, so a [`Chain`] is just `(head, tail, len)` and splicing or swapping
//! chains is handle reassignment.

use super::bucket::StateBucket;
use crate::types::{BucketId, IndexId, State, Trackable};
use std::rc::Rc;

/// Ordered list of fragments belonging to one state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Chain {
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl Chain {
    /// Number of fragments linked into this chain.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

struct Slot<S: State, O: Trackable> {
    generation: u32,
    next: Option<u32>,
    bucket: Option<StateBucket<S, O>>,
}

/// Owner of every bucket in an index.
pub struct BucketArena<S: State, O: Trackable> {
    /// Index that owns this arena; stamped into every handle.
    owner: IndexId,
    /// All slots (occupied and free).
    slots: Vec<Slot<S, O>>,
    /// Indices of free slots available for reuse.
    free_list: Vec<u32>,
}

impl<S: State, O: Trackable> BucketArena<S, O> {
    pub fn new(owner: IndexId) -> Self {
        Self {
            owner,
            slots: Vec::new(),
            free_list: Vec::new(),
        }
    }

    /// Allocate an empty bucket tagged `tag`. Not linked into any chain.
    pub fn alloc(&mut self, tag: S) -> BucketId {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            let id = BucketId::new(self.owner, index, slot.generation);
            slot.next = None;
            slot.bucket = Some(StateBucket::new(id, tag));
            id
        } else {
            let index = self.slots.len() as u32;
            let id = BucketId::new(self.owner, index, 0);
            self.slots.push(Slot {
                generation: 0,
                next: None,
                bucket: Some(StateBucket::new(id, tag)),
            });
            id
        }
    }

    /// Drop the bucket at `index` and recycle its slot.
    ///
    /// Dropping the bucket severs any remaining members' back-references.
    fn free(&mut self, index: u32) {
        let slot = &mut self.slots[index as usize];
        let bucket = slot.bucket.take();
        slot.next = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(index);
        drop(bucket);
    }

    pub fn owner(&self) -> IndexId {
        self.owner
    }

    /// Resolve a handle, rejecting foreign handles and stale generations.
    pub fn get(&self, id: BucketId) -> Option<&StateBucket<S, O>> {
        if id.index != self.owner {
            return None;
        }
        let slot = self.slots.get(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.bucket.as_ref()
    }

    pub fn get_mut(&mut self, id: BucketId) -> Option<&mut StateBucket<S, O>> {
        if id.index != self.owner {
            return None;
        }
        let slot = self.slots.get_mut(id.slot as usize)?;
        if slot.generation != id.generation {
            return None;
        }
        slot.bucket.as_mut()
    }

    fn bucket(&self, index: u32) -> &StateBucket<S, O> {
        self.slots[index as usize]
            .bucket
            .as_ref()
            .expect("chain links only occupied slots")
    }

    fn bucket_mut(&mut self, index: u32) -> &mut StateBucket<S, O> {
        self.slots[index as usize]
            .bucket
            .as_mut()
            .expect("chain links only occupied slots")
    }

    /// Number of occupied slots.
    pub fn live(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Head fragment of `chain`, allocating one tagged `tag` if it is empty.
    pub fn head_or_alloc(&mut self, chain: &mut Chain, tag: S) -> BucketId {
        if let Some(head) = chain.head {
            return self.bucket(head).id();
        }
        let id = self.alloc(tag);
        chain.head = Some(id.slot);
        chain.tail = Some(id.slot);
        chain.len = 1;
        id
    }

    /// Move every fragment of `from` to the front of `to`, leaving `from`
    /// empty. Tags are not touched.
    pub fn splice_front(&mut self, from: &mut Chain, to: &mut Chain) {
        let (Some(head), Some(tail)) = (from.head, from.tail) else {
            return;
        };
        self.slots[tail as usize].next = to.head;
        to.head = Some(head);
        if to.tail.is_none() {
            to.tail = Some(tail);
        }
        to.len += from.len;
        *from = Chain::default();
    }

    /// Iterate the fragments of `chain` from head to tail.
    pub fn iter<'a>(&'a self, chain: &Chain) -> ChainIter<'a, S, O> {
        ChainIter {
            arena: self,
            cursor: chain.head,
        }
    }

    /// Unlink and free empty fragments, retag the survivors with `tag`.
    ///
    /// Returns `(live members, surviving fragments)`. Linear in fragments.
    pub fn purge(&mut self, chain: &mut Chain, tag: S) -> (usize, usize) {
        let mut live = 0;
        let mut fragments = 0;
        let mut prev: Option<u32> = None;
        let mut cursor = chain.head;

        while let Some(index) = cursor {
            let next = self.slots[index as usize].next;

            if self.bucket(index).is_empty() {
                match prev {
                    Some(p) => self.slots[p as usize].next = next,
                    None => chain.head = next,
                }
                self.free(index);
            } else {
                let bucket = self.bucket_mut(index);
                bucket.tag = tag;
                live += bucket.len();
                fragments += 1;
                prev = Some(index);
            }
            cursor = next;
        }

        chain.tail = prev;
        chain.len = fragments;
        (live, fragments)
    }

    /// Append the live members of `chain` to `out`, dropping stale entries
    /// on the way. Returns how many stale entries were removed.
    pub fn collect_live(&mut self, chain: &Chain, out: &mut Vec<Rc<O>>) -> usize {
        let mut removed = 0;
        let mut cursor = chain.head;
        while let Some(index) = cursor {
            cursor = self.slots[index as usize].next;
            removed += self.bucket_mut(index).collect_into(out);
        }
        removed
    }

    /// Merge every fragment after the head into the head and free the donors.
    /// Stale members are dropped, and a head left empty is freed too.
    ///
    /// Returns the number of members moved. Linear in the membership.
    pub fn defragment(&mut self, chain: &mut Chain) -> usize {
        let Some(head) = chain.head else {
            return 0;
        };

        self.bucket_mut(head).prune();
        let mut moved = 0;
        let mut cursor = self.slots[head as usize].next.take();
        while let Some(index) = cursor {
            cursor = self.slots[index as usize].next;
            if let Some(mut donor) = self.slots[index as usize].bucket.take() {
                moved += self.bucket_mut(head).absorb(&mut donor);
                // Put the emptied bucket back so `free` drops it uniformly.
                self.slots[index as usize].bucket = Some(donor);
            }
            self.free(index);
        }

        if self.bucket(head).is_empty() {
            self.free(head);
            *chain = Chain::default();
        } else {
            chain.tail = Some(head);
            chain.len = 1;
        }
        moved
    }
}

/// Iterator over the fragments of one chain.
pub struct ChainIter<'a, S: State, O: Trackable> {
    arena: &'a BucketArena<S, O>,
    cursor: Option<u32>,
}

impl<'a, S: State, O: Trackable> Iterator for ChainIter<'a, S, O> {
    type Item = &'a StateBucket<S, O>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.cursor?;
        self.cursor = self.arena.slots[index as usize].next;
        Some(self.arena.bucket(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BucketSlot;

    #[derive(Default)]
    struct Item {
        slot: BucketSlot,
    }

    impl Trackable for Item {
        fn bucket_slot(&self) -> &BucketSlot {
            &self.slot
        }
    }

    type Arena = BucketArena<u8, Item>;

    /// Build a chain of `sizes.len()` fragments holding `sizes[i]` members.
    fn chain_with(arena: &mut Arena, tag: u8, sizes: &[usize]) -> (Chain, Vec<Rc<Item>>) {
        let mut chain = Chain::default();
        let mut items = Vec::new();
        for &size in sizes.iter().rev() {
            let mut single = Chain::default();
            let id = arena.head_or_alloc(&mut single, tag);
            for _ in 0..size {
                let item = Rc::new(Item::default());
                arena.get_mut(id).unwrap().insert(&item);
                items.push(item);
            }
            arena.splice_front(&mut single, &mut chain);
        }
        (chain, items)
    }

    #[test]
    fn test_alloc_reuses_freed_slot_with_new_generation() {
        let mut arena = Arena::new(IndexId::next());
        let mut chain = Chain::default();
        let first = arena.head_or_alloc(&mut chain, 0);

        arena.purge(&mut chain, 0);
        assert!(chain.is_empty());
        assert!(arena.get(first).is_none());

        let second = arena.alloc(0);
        assert_eq!(second.slot, first.slot);
        assert_ne!(second.generation, first.generation);
        assert_eq!(arena.live(), 1);
    }

    #[test]
    fn test_rejects_handles_from_another_arena() {
        let mut mine = Arena::new(IndexId::next());
        let mut theirs = Arena::new(IndexId::next());
        let ours = mine.alloc(0);
        let foreign = theirs.alloc(0);

        assert_eq!((ours.slot, ours.generation), (foreign.slot, foreign.generation));
        assert!(mine.get(ours).is_some());
        assert!(mine.get(foreign).is_none());
        assert!(mine.get_mut(foreign).is_none());
    }

    #[test]
    fn test_splice_front_orders_donor_first() {
        let mut arena = Arena::new(IndexId::next());
        let (mut a, _ia) = chain_with(&mut arena, 1, &[1, 2]);
        let (mut b, _ib) = chain_with(&mut arena, 2, &[3]);

        arena.splice_front(&mut a, &mut b);

        assert!(a.is_empty());
        assert_eq!(b.len(), 3);
        let sizes: Vec<usize> = arena.iter(&b).map(|f| f.len()).collect();
        assert_eq!(sizes, vec![1, 2, 3]);
    }

    #[test]
    fn test_splice_into_empty_sets_tail() {
        let mut arena = Arena::new(IndexId::next());
        let (mut a, _items) = chain_with(&mut arena, 1, &[1, 1]);
        let mut b = Chain::default();

        arena.splice_front(&mut a, &mut b);
        let (mut c, _more) = chain_with(&mut arena, 1, &[5]);
        arena.splice_front(&mut c, &mut b);

        let sizes: Vec<usize> = arena.iter(&b).map(|f| f.len()).collect();
        assert_eq!(sizes, vec![5, 1, 1]);
    }

    #[test]
    fn test_purge_drops_empty_and_retags() {
        let mut arena = Arena::new(IndexId::next());
        let (mut chain, _items) = chain_with(&mut arena, 7, &[0, 4, 0, 5, 0]);

        let (live, fragments) = arena.purge(&mut chain, 9);

        assert_eq!((live, fragments), (9, 2));
        assert_eq!(chain.len(), 2);
        assert!(arena.iter(&chain).all(|f| *f == 9));
        assert_eq!(arena.live(), 2);

        // Tail must still be valid for later splices.
        let (mut extra, _more) = chain_with(&mut arena, 9, &[6]);
        arena.splice_front(&mut chain, &mut extra);
        let sizes: Vec<usize> = arena.iter(&extra).map(|f| f.len()).collect();
        assert_eq!(sizes, vec![4, 5, 6]);
    }

    #[test]
    fn test_defragment_merges_into_head() {
        let mut arena = Arena::new(IndexId::next());
        let (mut chain, items) = chain_with(&mut arena, 1, &[1, 1, 1, 1]);
        let head = arena.iter(&chain).next().unwrap().id();

        let moved = arena.defragment(&mut chain);

        assert_eq!(moved, 3);
        assert_eq!(chain.len(), 1);
        assert_eq!(arena.live(), 1);
        assert_eq!(arena.get(head).unwrap().len(), 4);
        assert!(items.iter().all(|i| i.slot.get() == Some(head)));
    }

    #[test]
    fn test_defragment_drops_dead_members() {
        let mut arena = Arena::new(IndexId::next());
        let (mut chain, mut items) = chain_with(&mut arena, 1, &[2, 2]);
        // Items are pushed tail fragment first; keep one from each fragment.
        items.remove(3);
        items.remove(0);

        let moved = arena.defragment(&mut chain);

        assert_eq!(moved, 1);
        assert_eq!(chain.len(), 1);
        assert_eq!(arena.iter(&chain).map(|f| f.len()).sum::<usize>(), 2);
    }

    #[test]
    fn test_defragment_frees_chain_of_dead_members() {
        let mut arena = Arena::new(IndexId::next());
        let (mut chain, items) = chain_with(&mut arena, 1, &[3, 1]);
        drop(items);

        assert_eq!(arena.defragment(&mut chain), 0);
        assert!(chain.is_empty());
        assert_eq!(arena.live(), 0);
    }

    #[test]
    fn test_collect_live_prunes_in_place() {
        let mut arena = Arena::new(IndexId::next());
        let (mut chain, mut items) = chain_with(&mut arena, 1, &[2, 1]);
        items.truncate(1);

        let mut out = Vec::new();
        assert_eq!(arena.collect_live(&chain, &mut out), 2);
        assert_eq!(out.len(), 1);

        // The fragment left empty goes on the next purge.
        assert_eq!(arena.purge(&mut chain, 1), (1, 1));
    }
}
