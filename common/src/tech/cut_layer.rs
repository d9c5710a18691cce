use super::via_lut::{ViaLut, max_extent};
use crate::geom::{Dbu, Rect};

/// One via geometry; shapes are relative to the via origin.
pub struct ViaType {
    pub name: String,
    pub idx: usize,
    pub bot: Rect,
    pub cut: Rect,
    pub top: Rect,
    pub bot_forbid_regions: Vec<Rect>,
    pub top_forbid_regions: Vec<Rect>,
    /// Per cross-point of the lower metal layer: conflicts with default vias of the cut layer below,
    /// indexed by (track offset, cross-point offset) of their upper grid point.
    pub via_bot_via: Vec<ViaLut>,
    /// Per cross-point of the upper metal layer: conflicts with default vias of the cut layer above,
    /// indexed by their lower grid point.
    pub via_top_via: Vec<ViaLut>,
    /// Per cross-point of the lower metal layer: conflicts with wires on that layer.
    pub via_bot_wire: Vec<ViaLut>,
    /// Per cross-point of the upper metal layer: conflicts with wires on that layer.
    pub via_top_wire: Vec<ViaLut>,
}

impl ViaType {
    pub fn new(name: String, idx: usize, bot: Rect, cut: Rect, top: Rect) -> Self {
        Self {
            name,
            idx,
            bot,
            cut,
            top,
            bot_forbid_regions: Vec::new(),
            top_forbid_regions: Vec::new(),
            via_bot_via: Vec::new(),
            via_top_via: Vec::new(),
            via_bot_wire: Vec::new(),
            via_top_wire: Vec::new(),
        }
    }
}

pub struct CutLayer {
    pub name: String,
    pub idx: usize,
    pub spacing: Dbu,
    pub via_types: Vec<ViaType>,
    pub default_via: usize,
    /// Cut-to-cut conflicts of two default vias, by (lower track offset, upper track offset).
    pub via_cut: ViaLut,
    /// Conflicts of via type `a` against via type `b`, by (lower track offset, upper track offset).
    pub via_metal: Vec<Vec<ViaLut>>,
    pub bot_max_forbid_region: Rect,
    pub top_max_forbid_region: Rect,
    pub bot_wire_window: (i32, i32),
    pub top_wire_window: (i32, i32),
}

impl CutLayer {
    pub fn new(name: String, idx: usize, spacing: Dbu, via_types: Vec<ViaType>) -> Self {
        Self {
            name,
            idx,
            spacing,
            via_types,
            default_via: 0,
            via_cut: ViaLut::default(),
            via_metal: Vec::new(),
            bot_max_forbid_region: Rect::default(),
            top_max_forbid_region: Rect::default(),
            bot_wire_window: (0, 0),
            top_wire_window: (0, 0),
        }
    }

    #[inline(always)]
    pub fn default_via(&self) -> &ViaType {
        &self.via_types[self.default_via]
    }

    #[inline(always)]
    pub fn default_via_metal(&self) -> &ViaLut {
        &self.via_metal[self.default_via][self.default_via]
    }

    pub fn is_cut_violation(&self, a: &Rect, b: &Rect) -> bool {
        let gx = a.x.gap(&b.x);
        let gy = a.y.gap(&b.y);
        (gx == 0 && gy == 0) || gx * gx + gy * gy < self.spacing * self.spacing
    }

    pub(super) fn init_wire_windows(&mut self) {
        let default = self.default_via();
        let bot = max_extent(&default.via_bot_wire);
        let top = max_extent(&default.via_top_wire);
        self.bot_wire_window = bot;
        self.top_wire_window = top;
    }
}
