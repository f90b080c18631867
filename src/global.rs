//! Per-thread default index instances.
//!
//! Collaborators that want ergonomic access without threading an index
//! through their code can use [`with_default`]. There is one default instance
//! per `(S, O)` pair per thread; the index is single-threaded, so a
//! process-wide instance would not be usable anyway.
//!
//! The instance lives until the thread exits. Dropping it nulls every live
//! member's back-reference, like dropping any other index.

use crate::index::StatePartitionIndex;
use crate::types::{State, Trackable};
use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;

thread_local! {
    static DEFAULTS: RefCell<HashMap<TypeId, Box<dyn Any>>> = RefCell::new(HashMap::new());
}

/// Run `f` with this thread's default index for `(S, O)`, creating it on
/// first use.
///
/// # Panics
///
/// Panics if called re-entrantly from inside `f`, including from the `Drop`
/// of an object released inside `f`.
pub fn with_default<S, O, R>(f: impl FnOnce(&mut StatePartitionIndex<S, O>) -> R) -> R
where
    S: State + 'static,
    O: Trackable + 'static,
{
    DEFAULTS.with(|defaults| {
        let mut defaults = defaults.borrow_mut();
        let index = defaults
            .entry(TypeId::of::<StatePartitionIndex<S, O>>())
            .or_insert_with(|| Box::new(StatePartitionIndex::<S, O>::new()))
            .downcast_mut::<StatePartitionIndex<S, O>>()
            .expect("default index keyed by its own TypeId");
        f(index)
    })
}

/// Whether this thread's default index for `(S, O)` has been created.
pub fn has_default<S, O>() -> bool
where
    S: State + 'static,
    O: Trackable + 'static,
{
    DEFAULTS.with(|defaults| {
        defaults
            .borrow()
            .contains_key(&TypeId::of::<StatePartitionIndex<S, O>>())
    })
}

/// Drop this thread's default index for `(S, O)`, if any.
///
/// Members still alive become untracked.
pub fn reset_default<S, O>()
where
    S: State + 'static,
    O: Trackable + 'static,
{
    let removed = DEFAULTS.with(|defaults| {
        defaults
            .borrow_mut()
            .remove(&TypeId::of::<StatePartitionIndex<S, O>>())
    });
    // Dropped outside the borrow: bucket teardown may run member code.
    drop(removed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BucketSlot;
    use std::rc::Rc;

    #[derive(Default)]
    struct Leaf {
        slot: BucketSlot,
    }

    impl Trackable for Leaf {
        fn bucket_slot(&self) -> &BucketSlot {
            &self.slot
        }
    }

    #[test]
    fn test_default_instance_persists_between_calls() {
        let leaf = Rc::new(Leaf::default());

        with_default::<u8, Leaf, _>(|index| index.set_state(&leaf, 3));
        assert!(has_default::<u8, Leaf>());
        let state = with_default::<u8, Leaf, _>(|index| index.get_state(&leaf));
        assert_eq!(state, 3);

        reset_default::<u8, Leaf>();
        assert!(!has_default::<u8, Leaf>());
        assert!(!leaf.slot.is_tracked());
    }

    #[test]
    fn test_instances_are_per_type() {
        let leaf = Rc::new(Leaf::default());
        with_default::<u8, Leaf, _>(|index| index.set_state(&leaf, 1));

        let usage = with_default::<u16, Leaf, _>(|index| index.get_state_usage(1));
        assert_eq!(usage, 0);

        reset_default::<u8, Leaf>();
        reset_default::<u16, Leaf>();
    }
}
