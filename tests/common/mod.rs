//! Sample collaborators shared by the integration tests.

#![allow(dead_code)]

use state_partition::{define_states, global, BucketSlot, Trackable};
use std::rc::Rc;

define_states! {
    pub enum Color { White, Red, Gray, Black }
}

/// A plain tracked object with no teardown hook.
#[derive(Debug, Default)]
pub struct Cell {
    pub value: u32,
    slot: BucketSlot,
}

impl Cell {
    pub fn new(value: u32) -> Rc<Self> {
        Rc::new(Self {
            value,
            slot: BucketSlot::new(),
        })
    }

    pub fn is_tracked(&self) -> bool {
        self.slot.is_tracked()
    }
}

impl Trackable for Cell {
    fn bucket_slot(&self) -> &BucketSlot {
        &self.slot
    }
}

/// A graph node that keeps its color in the thread's default index and
/// leaves it when dropped.
#[derive(Debug)]
pub struct Node {
    pub value: u32,
    pub edges: Vec<usize>,
    slot: BucketSlot,
}

impl Node {
    pub fn new(value: u32, color: Color) -> Rc<Self> {
        let node = Rc::new(Self {
            value,
            edges: Vec::new(),
            slot: BucketSlot::new(),
        });
        node.set_color(color);
        node
    }

    pub fn with_edges(value: u32, edges: Vec<usize>, color: Color) -> Rc<Self> {
        let node = Rc::new(Self {
            value,
            edges,
            slot: BucketSlot::new(),
        });
        node.set_color(color);
        node
    }

    pub fn color(&self) -> Color {
        global::with_default::<Color, Node, _>(|index| index.get_state(self))
    }

    pub fn set_color(self: &Rc<Self>, color: Color) {
        global::with_default::<Color, Node, _>(|index| index.set_state(self, color));
    }

    pub fn clear_color(&self) {
        global::with_default::<Color, Node, _>(|index| index.clear_state(self));
    }

    pub fn is_tracked(&self) -> bool {
        self.slot.is_tracked()
    }
}

impl Trackable for Node {
    fn bucket_slot(&self) -> &BucketSlot {
        &self.slot
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        if self.slot.is_tracked() {
            self.clear_color();
        }
    }
}

/// Usage of the default `(Color, Node)` index.
pub fn node_usage(color: Color) -> usize {
    global::with_default::<Color, Node, _>(|index| index.get_state_usage(color))
}

/// Route index diagnostics to the test harness output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}
