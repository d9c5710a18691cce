mod cost;
mod fixed;
mod hist;
mod interval_map;
mod route_grid;
mod stats;

pub use cost::ViaViaUsage;
pub use fixed::{ViaData, ViaPoorness};
pub use interval_map::IntervalMap;
pub use route_grid::{RouteGrid, UnitCosts};
pub use stats::GridStats;

use dr_common::db::NetId;
use dr_common::geom::{BoxOnLayer, GridEdge, GridPoint, Interval, TrackSegment};
use dr_common::tech::LayerList;

/// What single-net routing needs from the occupancy store. Queries take `&self`
/// and the mutating calls lock internally, so one grid is shared by every worker.
pub trait RoutingGrid: Sync + Send {
    fn layers(&self) -> &LayerList;
    fn unit(&self) -> &UnitCosts;

    fn edge_cost(&self, edge: &GridEdge, net: NetId) -> f64;
    fn edge_vio_cost(&self, edge: &GridEdge, net: NetId, hist: bool) -> f64;
    fn via_cost(&self, via: &GridPoint, net: NetId) -> f64;
    fn wire_segment_cost(&self, ts: &TrackSegment, net: NetId) -> f64;
    fn short_wire_segment_cost(&self, ts: &TrackSegment, net: NetId) -> Vec<f64>;
    fn short_wire_segment_vio_cost(&self, ts: &TrackSegment, net: NetId, hist: bool) -> Vec<f64>;
    fn empty_intervals(&self, ts: &TrackSegment, net: NetId) -> Vec<Interval<i32>>;
    fn fixed_metal_vio(&self, metal: &BoxOnLayer, net: NetId) -> usize;

    fn use_edge(&self, edge: &GridEdge, net: NetId);
    fn remove_edge(&self, edge: &GridEdge, net: NetId);
}

impl RoutingGrid for RouteGrid<'_> {
    #[inline(always)]
    fn layers(&self) -> &LayerList {
        RouteGrid::layers(self)
    }

    fn unit(&self) -> &UnitCosts {
        RouteGrid::unit(self)
    }

    fn edge_cost(&self, edge: &GridEdge, net: NetId) -> f64 {
        RouteGrid::edge_cost(self, edge, net)
    }

    fn edge_vio_cost(&self, edge: &GridEdge, net: NetId, hist: bool) -> f64 {
        RouteGrid::edge_vio_cost(self, edge, net, hist)
    }

    fn via_cost(&self, via: &GridPoint, net: NetId) -> f64 {
        RouteGrid::via_cost(self, via, net)
    }

    fn wire_segment_cost(&self, ts: &TrackSegment, net: NetId) -> f64 {
        RouteGrid::wire_segment_cost(self, ts, net)
    }

    fn short_wire_segment_cost(&self, ts: &TrackSegment, net: NetId) -> Vec<f64> {
        RouteGrid::short_wire_segment_cost(self, ts, net)
    }

    fn short_wire_segment_vio_cost(&self, ts: &TrackSegment, net: NetId, hist: bool) -> Vec<f64> {
        RouteGrid::short_wire_segment_vio_cost(self, ts, net, hist)
    }

    fn empty_intervals(&self, ts: &TrackSegment, net: NetId) -> Vec<Interval<i32>> {
        RouteGrid::empty_intervals(self, ts, net)
    }

    fn fixed_metal_vio(&self, metal: &BoxOnLayer, net: NetId) -> usize {
        RouteGrid::fixed_metal_vio(self, metal, net)
    }

    fn use_edge(&self, edge: &GridEdge, net: NetId) {
        RouteGrid::use_edge(self, edge, net)
    }

    fn remove_edge(&self, edge: &GridEdge, net: NetId) {
        RouteGrid::remove_edge(self, edge, net)
    }
}
