pub mod design;
pub mod indices;
pub mod topo;

pub use design::{Design, DesignDescription, Net, NetDescription, PinDescription};
pub use indices::NetId;
pub use topo::{GridTopo, TopoNode};
