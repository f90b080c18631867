//! The state partition index.

use crate::buckets::{BucketArena, Chain, StateBucket};
use crate::error::{IndexError, Result};
use crate::report::{StateUsage, UsageReport};
use crate::states::NamedState;
use crate::types::{IndexId, RunCost, State, Trackable};
use indexmap::IndexMap;
use std::io::{self, Write};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// Index configuration.
#[derive(Clone, Debug)]
pub struct IndexConfig {
    /// A purge defragments a state when its average live members per
    /// fragment is at or below this ratio.
    pub defrag_ratio: f64,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { defrag_ratio: 3.0 }
    }
}

impl IndexConfig {
    /// Reject ratios that cannot be compared meaningfully.
    pub fn validate(&self) -> Result<()> {
        if !self.defrag_ratio.is_finite() || self.defrag_ratio < 0.0 {
            return Err(IndexError::InvalidConfig(format!(
                "defrag_ratio must be finite and non-negative, got {}",
                self.defrag_ratio
            )));
        }
        Ok(())
    }
}

/// Tracks which state each of a population of objects is in, with bulk
/// re-classification of whole states.
///
/// Every state owns a chain of buckets ("fragments"). Single-object updates
/// touch one bucket; [`migrate_given_state_to`](Self::migrate_given_state_to)
/// and [`swap_states`](Self::swap_states) move whole chains without visiting
/// members. Fragmentation is kept in check by
/// [`purge_state_usage`](Self::purge_state_usage), which bulk operations
/// run on every chain they touch.
///
/// Bucket tags are reconciled lazily by the purge step. Bulk operations end
/// with a purge of every chain they modify, so by the time any call returns,
/// every fragment's tag matches its chain.
///
/// Objects are never owned. Dropping the index drops its buckets, and each
/// bucket nulls the back-reference of every member still alive.
///
/// The index is single-threaded: it holds `Rc`/`Weak` references and is
/// neither `Send` nor `Sync`.
pub struct StatePartitionIndex<S: State, O: Trackable> {
    config: IndexConfig,

    /// Owner of all buckets.
    arena: BucketArena<S, O>,

    /// State -> chain of fragments, in first-use order.
    chains: IndexMap<S, Chain>,
}

impl<S: State, O: Trackable> StatePartitionIndex<S, O> {
    /// Create an empty index with the default configuration.
    pub fn new() -> Self {
        Self {
            config: IndexConfig::default(),
            arena: BucketArena::new(IndexId::next()),
            chains: IndexMap::new(),
        }
    }

    /// Create an empty index with a custom configuration.
    pub fn with_config(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            arena: BucketArena::new(IndexId::next()),
            chains: IndexMap::new(),
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Id stamped into every bucket handle this index issues.
    pub fn id(&self) -> IndexId {
        self.arena.owner()
    }

    /// Bucket currently holding `obj`, if the back-reference is valid.
    fn resolve(&self, obj: &O) -> Option<&StateBucket<S, O>> {
        let id = obj.bucket_slot().get()?;
        if id.index() != self.id() {
            debug!("Object is tracked by index {}, not {}", id.index(), self.id());
            return None;
        }
        match self.arena.get(id) {
            Some(bucket) if bucket.contains(obj) => Some(bucket),
            Some(bucket) => {
                warn!(
                    "Back-reference {:?} (state {}) does not contain the object",
                    id, bucket.tag
                );
                None
            }
            None => {
                warn!("Back-reference {:?} is stale", id);
                None
            }
        }
    }

    // --- Single-object operations ---

    /// Current state of `obj`.
    ///
    /// Untracked objects report `S::default()` and log a warning.
    pub fn get_state(&self, obj: &O) -> S {
        match self.resolve(obj) {
            Some(bucket) => bucket.tag,
            None => {
                warn!("Trying to get state of an untracked object");
                S::default()
            }
        }
    }

    /// Whether `obj` is held by one of this index's buckets.
    pub fn is_tracked(&self, obj: &O) -> bool {
        self.resolve(obj).is_some()
    }

    /// Put `obj` into state `s`. A no-op if it is already there.
    pub fn set_state(&mut self, obj: &Rc<O>, s: S) -> RunCost {
        if let Some(bucket) = self.resolve(obj) {
            if *bucket == s {
                return RunCost::Constant;
            }
        }

        let slot = obj.bucket_slot();
        let cost = match slot.get() {
            Some(id) if id.index() != self.id() => {
                // The previous index keeps a stale entry until its next
                // pruning pass.
                debug!("Taking over object tracked by index {}", id.index());
                slot.clear();
                RunCost::Constant
            }
            _ => self.clear_state(obj),
        };

        let chain = self.chains.entry(s).or_default();
        let id = self.arena.head_or_alloc(chain, s);
        if let Some(head) = self.arena.get_mut(id) {
            head.insert(obj);
        }
        trace!("Object entered state {} in {:?}", s, id);
        cost
    }

    /// Stop tracking `obj`. A no-op if it is untracked.
    ///
    /// Safe to call from the object's `Drop`.
    pub fn clear_state(&mut self, obj: &O) -> RunCost {
        let slot = obj.bucket_slot();
        let Some(id) = slot.get() else {
            return RunCost::Constant;
        };
        if id.index() != self.id() {
            warn!(
                "Trying to clear state of an object tracked by index {}",
                id.index()
            );
            return RunCost::Constant;
        }

        match self.arena.get_mut(id) {
            Some(bucket) => {
                if !bucket.remove(obj) {
                    warn!(
                        "Trying to clear state of an object missing from its recorded bucket {:?} (state {})",
                        id, bucket.tag
                    );
                }
            }
            None => warn!("Clearing stale back-reference {:?}", id),
        }

        // Empty buckets are left for the next purge.
        slot.clear();
        RunCost::Constant
    }

    // --- Bulk operations ---

    /// Move every member of `from` into `to` by splicing chains.
    pub fn migrate_given_state_to(&mut self, from: S, to: S) -> RunCost {
        if from == to {
            return RunCost::Constant;
        }
        let Some(mut donor) = self.chains.shift_remove(&from) else {
            return RunCost::Constant;
        };

        let fragments = donor.len();
        let target = self.chains.entry(to).or_default();
        self.arena.splice_front(&mut donor, target);
        debug!("Migrated {} fragments from {} to {}", fragments, from, to);

        self.purge_state_usage(to)
    }

    /// Migrate every other state into `to`.
    pub fn migrate_all_states_to(&mut self, to: S) -> RunCost {
        let sources: Vec<S> = self.chains.keys().copied().filter(|s| *s != to).collect();
        sources
            .into_iter()
            .fold(RunCost::Constant, |cost, from| {
                cost.and(self.migrate_given_state_to(from, to))
            })
    }

    /// Exchange the populations of two states.
    pub fn swap_states(&mut self, one: S, two: S) -> RunCost {
        if one == two {
            return RunCost::Constant;
        }

        let first = *self.chains.entry(one).or_default();
        let second = std::mem::replace(self.chains.entry(two).or_default(), first);
        self.chains.insert(one, second);
        debug!("Swapped states {} and {}", one, two);

        let cost = self.purge_state_usage(one);
        cost.and(self.purge_state_usage(two))
    }

    // --- Maintenance ---

    /// Free empty fragments of `s`, retag the rest, and defragment when the
    /// chain is too sparse.
    ///
    /// Linear in the number of fragments. Returns
    /// [`RunCost::Defragmented`] when the sparseness check fired.
    pub fn purge_state_usage(&mut self, s: S) -> RunCost {
        let Some(chain) = self.chains.get_mut(&s) else {
            return RunCost::Constant;
        };

        let (live, fragments) = self.arena.purge(chain, s);
        if fragments > 0 && (live as f64 / fragments as f64) <= self.config.defrag_ratio {
            let moved = self.arena.defragment(chain);
            debug!(
                "Defragmented state {}: {} fragments, {} members, {} moved",
                s, fragments, live, moved
            );
            return RunCost::Defragmented;
        }
        RunCost::Constant
    }

    /// Merge every fragment of `s` into its first one.
    ///
    /// Linear in the live membership of `s`.
    pub fn defragment_state_usage(&mut self, s: S) {
        if let Some(chain) = self.chains.get_mut(&s).filter(|c| !c.is_empty()) {
            self.arena.defragment(chain);
        }
    }

    // --- Queries ---

    fn check_tag(bucket: &StateBucket<S, O>, s: S) {
        if *bucket != s {
            warn!("{} state found instead of state {}", bucket.tag, s);
        }
    }

    /// Number of objects in state `s`. Linear in fragments.
    pub fn get_state_usage(&self, s: S) -> usize {
        let Some(chain) = self.chains.get(&s) else {
            return 0;
        };
        self.arena
            .iter(chain)
            .inspect(|bucket| Self::check_tag(bucket, s))
            .map(|bucket| bucket.len())
            .sum()
    }

    /// Append every live object in state `s` to `out`.
    ///
    /// Members dropped without clearing, or taken over by another index, are
    /// removed on the way, so usage matches the returned count afterwards.
    pub fn get_state_nodes(&mut self, s: S, out: &mut Vec<Rc<O>>) {
        let Some(chain) = self.chains.get(&s) else {
            return;
        };
        let stale = self.arena.collect_live(chain, out);
        if stale > 0 {
            warn!(
                "{} members of state {} were dropped or moved without clearing their state",
                stale, s
            );
        }
    }

    /// Fragments currently linked into the chain of `s`.
    pub fn fragment_count(&self, s: S) -> usize {
        self.chains.get(&s).map(Chain::len).unwrap_or(0)
    }

    /// Total tracked objects across all states.
    pub fn tracked_count(&self) -> usize {
        self.chains.keys().map(|&s| self.get_state_usage(s)).sum()
    }

    /// States that currently have a chain, in first-use order.
    pub fn states(&self) -> impl Iterator<Item = S> + '_ {
        self.chains.keys().copied()
    }

    /// Buckets currently allocated.
    pub fn live_buckets(&self) -> usize {
        self.arena.live()
    }

    // --- Diagnostics ---

    /// Per-state live counts and fragment counts for nonempty states.
    pub fn usage_report(&self) -> UsageReport {
        let mut report = UsageReport::default();
        for (&s, chain) in &self.chains {
            let mut count = 0;
            let mut fragments = 0;
            for bucket in self.arena.iter(chain) {
                Self::check_tag(bucket, s);
                count += bucket.len();
                fragments += 1;
            }
            if count > 0 {
                report.states.push(StateUsage {
                    state: s.to_string(),
                    count,
                    fragments,
                });
                report.total += count;
            }
        }
        report
    }

    /// Write the usage report with a header, optionally naming a line.
    pub fn write_state_usage<W: Write>(&self, w: &mut W, line: Option<u32>) -> io::Result<()> {
        match line {
            Some(line) => writeln!(w, "State usage at line {}:", line)?,
            None => writeln!(w, "State usage:")?,
        }
        writeln!(w, "{}", self.usage_report())
    }

    /// Print the usage report to stdout.
    pub fn print_state_usage(&self, line: Option<u32>) {
        let stdout = io::stdout();
        if let Err(e) = self.write_state_usage(&mut stdout.lock(), line) {
            warn!("Failed to print state usage: {}", e);
        }
    }
}

impl<S: NamedState, O: Trackable> StatePartitionIndex<S, O> {
    pub fn set_state_by_name(&mut self, obj: &Rc<O>, name: &str) -> Result<RunCost> {
        Ok(self.set_state(obj, S::parse_name(name)?))
    }

    pub fn migrate_by_name(&mut self, from: &str, to: &str) -> Result<RunCost> {
        let (from, to) = (S::parse_name(from)?, S::parse_name(to)?);
        Ok(self.migrate_given_state_to(from, to))
    }

    pub fn swap_by_name(&mut self, one: &str, two: &str) -> Result<RunCost> {
        let (one, two) = (S::parse_name(one)?, S::parse_name(two)?);
        Ok(self.swap_states(one, two))
    }

    pub fn usage_by_name(&self, name: &str) -> Result<usize> {
        Ok(self.get_state_usage(S::parse_name(name)?))
    }
}

impl<S: State, O: Trackable> Default for StatePartitionIndex<S, O> {
    fn default() -> Self {
        Self::new()
    }
}
