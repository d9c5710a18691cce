//! Technology model: metal/cut layers, track and cross-point grids, spacing rules
//! and the via conflict tables derived from them.

pub mod cut_layer;
pub mod layer_list;
pub mod metal_layer;
pub mod via_lut;

pub use cut_layer::{CutLayer, ViaType};
pub use layer_list::LayerList;
pub use metal_layer::{CrossPoint, MetalLayer, SpacingTable, Track};
pub use via_lut::ViaLut;

use crate::geom::{Dbu, Dim, Rect};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TechError {
    #[error("no metal layers defined")]
    NoLayers,
    #[error("layer {0}: {1} must be positive")]
    NonPositive(String, &'static str),
    #[error("layer {0} has no tracks")]
    NoTracks(String),
    #[error("adjacent layers {0} and {1} share a preferred direction")]
    SameDirection(String, String),
    #[error("{0} cut layers given for {1} metal layers")]
    CutCount(usize, usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireDirection {
    Horizontal,
    Vertical,
}

impl WireDirection {
    /// Tracks of a horizontal layer are spaced along Y.
    pub fn track_dim(self) -> Dim {
        match self {
            WireDirection::Horizontal => Dim::Y,
            WireDirection::Vertical => Dim::X,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EolRule {
    pub space: Dbu,
    pub width: Dbu,
    pub within: Dbu,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SpacingTableDescription {
    #[serde(default)]
    pub widths: Vec<Dbu>,
    #[serde(default)]
    pub lengths: Vec<Dbu>,
    pub table: Vec<Vec<Dbu>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetalLayerDescription {
    pub name: String,
    pub direction: WireDirection,
    pub width: Dbu,
    pub pitch: Dbu,
    #[serde(default)]
    pub track_start: Dbu,
    pub num_tracks: usize,
    #[serde(default)]
    pub min_area: Option<Dbu>,
    #[serde(default)]
    pub spacing: Option<SpacingTableDescription>,
    #[serde(default)]
    pub eol: Vec<EolRule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ViaTypeDescription {
    pub name: String,
    pub bot: Rect,
    pub cut: Rect,
    pub top: Rect,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CutLayerDescription {
    pub name: String,
    #[serde(default)]
    pub spacing: Option<Dbu>,
    #[serde(default)]
    pub via_types: Vec<ViaTypeDescription>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TechDescription {
    pub layers: Vec<MetalLayerDescription>,
    #[serde(default)]
    pub cuts: Vec<CutLayerDescription>,
}
