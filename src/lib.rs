//! # State Partition
//!
//! Tracks which of a small, fixed set of states each object in a large,
//! changing population occupies, and re-classifies whole states at once.
//!
//! ## Core Concepts
//!
//! - **Buckets**: fragments holding weak references to objects in one state
//! - **Chains**: the ordered fragments of one state, spliced and swapped as a
//!   unit so bulk changes never visit individual objects
//! - **Back-references**: each object keeps a handle to its current bucket,
//!   giving O(1) state lookup
//! - **Defragmentation**: purges merge a state's fragments once they average
//!   too few members, keeping queries amortized
//!
//! ## Example
//!
//! ```
//! use state_partition::{define_states, BucketSlot, StatePartitionIndex, Trackable};
//! use std::rc::Rc;
//!
//! define_states! {
//!     pub enum Color { White, Gray, Black }
//! }
//!
//! #[derive(Default)]
//! struct Node {
//!     slot: BucketSlot,
//! }
//!
//! impl Trackable for Node {
//!     fn bucket_slot(&self) -> &BucketSlot {
//!         &self.slot
//!     }
//! }
//!
//! let mut index = StatePartitionIndex::<Color, Node>::new();
//! let nodes: Vec<Rc<Node>> = (0..3).map(|_| Rc::new(Node::default())).collect();
//! for node in &nodes {
//!     index.set_state(node, Color::White);
//! }
//!
//! // Flip the meaning of white and black without touching any node.
//! index.swap_states(Color::White, Color::Black);
//! assert_eq!(index.get_state(&nodes[0]), Color::Black);
//! assert_eq!(index.get_state_usage(Color::White), 0);
//! ```

mod buckets;
pub mod error;
pub mod global;
pub mod index;
pub mod report;
pub mod states;
pub mod types;

// Re-exports
pub use error::{IndexError, Result};
pub use index::{IndexConfig, StatePartitionIndex};
pub use report::{StateUsage, UsageReport};
pub use states::NamedState;
pub use types::*;
