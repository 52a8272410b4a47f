use std::cell::Cell;

pub mod camera;
pub mod light;
pub mod node;
pub mod scene;

pub type NodeId = id_arena::Id<node::Node>;
pub type MeshId = id_arena::Id<crate::rendering::mesh::Mesh>;

/// Monotonic change counter. Producers bump it when observable state is
/// replaced; consumers remember the last value they saw and re-bind when it
/// moves. This stands in for a pub/sub channel: one read per frame instead
/// of a subscription.
#[derive(Debug, Default)]
pub struct Revision(Cell<u64>);

impl Revision {
    pub fn bump(&self) {
        self.0.set(self.0.get() + 1);
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }
}
