use super::cut_layer::{CutLayer, ViaType};
use super::metal_layer::{CrossPoint, MetalLayer};
use super::via_lut::ViaLut;
use super::{TechDescription, TechError};
use crate::geom::{BoxOnLayer, Dbu, Dim, GridBoxOnLayer, GridPoint, Interval, Point, Rect, ViaBox};

/// The full metal/cut stack with its derived grid and conflict tables.
pub struct LayerList {
    pub layers: Vec<MetalLayer>,
    pub cuts: Vec<CutLayer>,
}

fn ceil_div(a: Dbu, b: Dbu) -> i32 {
    if a <= 0 { 0 } else { ((a + b - 1) / b) as i32 }
}

/// Distance along `dim` over which `b` can be shifted before it separates from `a` by `margin`.
fn reach(a: &Rect, b: &Rect, dim: Dim, margin: Dbu) -> Dbu {
    (a[dim].high - b[dim].low).max(b[dim].high - a[dim].low) + margin
}

impl LayerList {
    pub fn from_description(desc: &TechDescription) -> Result<Self, TechError> {
        if desc.layers.is_empty() {
            return Err(TechError::NoLayers);
        }
        let layers = desc
            .layers
            .iter()
            .enumerate()
            .map(|(i, l)| MetalLayer::from_description(i, l))
            .collect::<Result<Vec<_>, _>>()?;
        for pair in layers.windows(2) {
            if pair[0].direction == pair[1].direction {
                return Err(TechError::SameDirection(pair[0].name.clone(), pair[1].name.clone()));
            }
        }
        if desc.cuts.len() >= layers.len() {
            return Err(TechError::CutCount(desc.cuts.len(), layers.len()));
        }

        let mut cuts = Vec::with_capacity(layers.len() - 1);
        for i in 0..layers.len() - 1 {
            let (lower, upper) = (&layers[i], &layers[i + 1]);
            let cut = match desc.cuts.get(i) {
                Some(c) if !c.via_types.is_empty() => {
                    let via_types = c
                        .via_types
                        .iter()
                        .enumerate()
                        .map(|(k, v)| ViaType::new(v.name.clone(), k, v.bot, v.cut, v.top))
                        .collect::<Vec<_>>();
                    let spacing = c.spacing.unwrap_or_else(|| {
                        let side = via_types[0].cut.min_dim();
                        log::warn!("Cut layer {}: no cut spacing, assuming {}", c.name, side);
                        side
                    });
                    CutLayer::new(c.name.clone(), i, spacing, via_types)
                }
                other => {
                    let name = other.map_or_else(|| format!("cut{}", i + 1), |c| c.name.clone());
                    log::warn!(
                        "Cut layer {}: no via definitions between {} and {}, synthesizing one",
                        name,
                        lower.name,
                        upper.name
                    );
                    Self::synthesized_cut(name, i, lower, upper)
                }
            };
            cuts.push(cut);
        }

        let mut list = Self { layers, cuts };
        list.init_cross_points();
        for cut in &mut list.cuts {
            Self::select_default_via(cut, &list.layers);
        }
        list.init_min_lengths();
        list.init_via_luts();
        for layer in &mut list.layers {
            layer.init_wire_range();
        }
        list.init_via_forbid_regions();
        list.init_safe_margins();
        list.log_summary();
        Ok(list)
    }

    fn synthesized_cut(name: String, idx: usize, lower: &MetalLayer, upper: &MetalLayer) -> CutLayer {
        let side = lower.width.min(upper.width);
        let origin = Point::default();
        let via = ViaType::new(
            format!("{}_default", name),
            0,
            Rect::from_point(origin).expand(lower.width / 2),
            Rect::from_point(origin).expand(side / 2),
            Rect::from_point(origin).expand(upper.width / 2),
        );
        CutLayer::new(name, idx, side, vec![via])
    }

    /// Narrowest across-track footprint on both metals wins, then smallest metal area.
    fn select_default_via(cut: &mut CutLayer, layers: &[MetalLayer]) {
        let (bot_dim, top_dim) = (layers[cut.idx].direction, layers[cut.idx + 1].direction);
        cut.default_via = cut
            .via_types
            .iter()
            .enumerate()
            .min_by_key(|(_, v)| {
                (
                    v.bot[bot_dim].range() + v.top[top_dim].range(),
                    v.bot.area() + v.top.area(),
                )
            })
            .map_or(0, |(i, _)| i);
    }

    fn init_cross_points(&mut self) {
        let n = self.layers.len();
        if n == 1 {
            log::warn!("Single metal layer stack: no cross-points, nothing is routable");
        }
        for i in 0..n {
            let lower: Vec<Dbu> = if i > 0 {
                self.layers[i - 1].tracks.iter().map(|t| t.location).collect()
            } else {
                Vec::new()
            };
            let upper: Vec<Dbu> = if i + 1 < n {
                self.layers[i + 1].tracks.iter().map(|t| t.location).collect()
            } else {
                Vec::new()
            };

            let mut cps = Vec::with_capacity(lower.len() + upper.len());
            let (mut a, mut b) = (0usize, 0usize);
            while a < lower.len() || b < upper.len() {
                let cp = match (lower.get(a), upper.get(b)) {
                    (Some(&l), Some(&u)) if l == u => {
                        a += 1;
                        b += 1;
                        CrossPoint { location: l, lower_track: Some(a as i32 - 1), upper_track: Some(b as i32 - 1) }
                    }
                    (Some(&l), Some(&u)) if l < u => {
                        a += 1;
                        CrossPoint { location: l, lower_track: Some(a as i32 - 1), upper_track: None }
                    }
                    (Some(&l), None) => {
                        a += 1;
                        CrossPoint { location: l, lower_track: Some(a as i32 - 1), upper_track: None }
                    }
                    (_, Some(&u)) => {
                        b += 1;
                        CrossPoint { location: u, lower_track: None, upper_track: Some(b as i32 - 1) }
                    }
                    (None, None) => break,
                };
                cps.push(cp);
            }

            for (c, cp) in cps.iter().enumerate() {
                if let Some(t) = cp.lower_track {
                    self.layers[i - 1].tracks[t as usize].upper_cp = Some(c as i32);
                }
                if let Some(t) = cp.upper_track {
                    self.layers[i + 1].tracks[t as usize].lower_cp = Some(c as i32);
                }
            }
            self.layers[i].cross_points = cps;
            self.layers[i].init_acc_cp_dist_cost();
        }
    }

    /// Via-area equivalent lengths discount the minimum-length requirement.
    fn init_min_lengths(&mut self) {
        let n = self.layers.len();
        for i in 0..n {
            let dir = self.layers[i].direction;
            let width = self.layers[i].width;
            let eq_len = |rect: &Rect| {
                let along = rect[dir.other()];
                let min_via_len = along.low.abs().min(along.high.abs());
                let via_width = rect[dir].range();
                let width_eq = along.range() * (via_width - width).max(0) / width;
                let len_eq = (min_via_len - width / 2).max(0);
                (len_eq, width_eq)
            };
            let below = (i > 0).then(|| eq_len(&self.cuts[i - 1].default_via().top));
            let above = (i + 1 < n).then(|| eq_len(&self.cuts[i].default_via().bot));
            let (len_eq, width_eq) = match (below, above) {
                (Some(b), Some(a)) => (b.0.min(a.0), b.1.min(a.1)),
                (Some(v), None) | (None, Some(v)) => v,
                (None, None) => (0, 0),
            };

            let via_ovlp_dist = if i == 0 || i + 1 == n {
                0
            } else {
                let i1 = self.cuts[i - 1].default_via().top[dir.other()];
                let i2 = self.cuts[i].default_via().bot[dir.other()];
                (i1.high.abs() + i2.low.abs())
                    .max(i1.low.abs() + i2.high.abs())
                    .min(i1.range())
                    .min(i2.range())
            };

            let layer = &mut self.layers[i];
            let raw = layer.min_len_raw - width_eq;
            let one_via = raw - 2 * len_eq;
            let two_via = one_via - width_eq;
            layer.min_len_raw = raw.max(0);
            layer.min_len_one_via = one_via.max(0);
            layer.min_len_two_via = two_via.max(0);
            layer.via_ovlp_dist = via_ovlp_dist;
        }
    }

    /// Conflict table of via `a` against via `b` on the same cut layer, by lower/upper track offsets.
    fn same_cut_lut(lower: &MetalLayer, upper: &MetalLayer, cut: &CutLayer, a: &ViaType, b: &ViaType, metal: bool) -> ViaLut {
        let (bd, td) = (lower.direction, upper.direction);
        let radius = |dim: Dim| {
            let mut r = reach(&a.cut, &b.cut, dim, cut.spacing);
            if metal {
                r = r
                    .max(reach(&a.bot, &b.bot, dim, lower.max_interaction()))
                    .max(reach(&a.top, &b.top, dim, upper.max_interaction()));
            }
            r
        };
        let x = ceil_div(radius(bd), lower.pitch);
        let y = ceil_div(radius(td), upper.pitch);
        ViaLut::from_fn(x, y, |dx, dy| {
            let mut p = Point::default();
            p[bd] = dx as Dbu * lower.pitch;
            p[td] = dy as Dbu * upper.pitch;
            cut.is_cut_violation(&a.cut, &b.cut.shift(p))
                || (metal
                    && (lower.is_spacing_violation(&a.bot, &b.bot.shift(p), true)
                        || upper.is_spacing_violation(&a.top, &b.top.shift(p), true)))
        })
        .trimmed()
    }

    /// One table per cross-point of `layer`: shape `a` at that cross-point against shape `b`
    /// placed at (track offset, cross-point offset).
    fn per_cp_luts(layer: &MetalLayer, a: &Rect, b: &Rect, consider_eol: bool) -> Vec<ViaLut> {
        let (dir, along) = (layer.direction, layer.direction.other());
        let margin = layer.max_interaction();
        let x = ceil_div(reach(a, b, dir, margin), layer.pitch);
        let reach_along = reach(a, b, along, margin);
        (0..layer.num_cps())
            .map(|c| {
                let loc = layer.cp_loc(c);
                let window = layer.range_search_cp(&Interval::new(loc - reach_along, loc + reach_along), true);
                let y = if window.is_valid() { (c - window.low).max(window.high - c).max(0) } else { 0 };
                ViaLut::from_fn(x, y, |dx, dy| {
                    let other = c + dy;
                    if other < 0 || other >= layer.num_cps() {
                        return false;
                    }
                    let mut p = Point::default();
                    p[dir] = dx as Dbu * layer.pitch;
                    p[along] = layer.cp_loc(other) - loc;
                    layer.is_spacing_violation(a, &b.shift(p), consider_eol)
                })
                .trimmed()
            })
            .collect()
    }

    fn init_via_luts(&mut self) {
        let num_cuts = self.cuts.len();
        for i in 0..num_cuts {
            let (lower, upper) = (&self.layers[i], &self.layers[i + 1]);
            let cut = &self.cuts[i];
            let via_metal: Vec<Vec<ViaLut>> = cut
                .via_types
                .iter()
                .map(|a| {
                    cut.via_types
                        .iter()
                        .map(|b| Self::same_cut_lut(lower, upper, cut, a, b, true))
                        .collect()
                })
                .collect();
            let default = cut.default_via();
            let via_cut = Self::same_cut_lut(lower, upper, cut, default, default, false);

            let below_top = (i > 0).then(|| self.cuts[i - 1].default_via().top);
            let above_bot = (i + 1 < num_cuts).then(|| self.cuts[i + 1].default_via().bot);
            let wire_bot = lower.wire_piece(Point::default());
            let wire_top = upper.wire_piece(Point::default());
            let per_type: Vec<_> = cut
                .via_types
                .iter()
                .map(|v| {
                    (
                        below_top.map_or_else(Vec::new, |t| Self::per_cp_luts(lower, &v.bot, &t, true)),
                        above_bot.map_or_else(Vec::new, |b| Self::per_cp_luts(upper, &v.top, &b, true)),
                        Self::per_cp_luts(lower, &v.bot, &wire_bot, false),
                        Self::per_cp_luts(upper, &v.top, &wire_top, false),
                    )
                })
                .collect();

            let cut = &mut self.cuts[i];
            cut.via_metal = via_metal;
            cut.via_cut = via_cut;
            for (v, (bot_via, top_via, bot_wire, top_wire)) in cut.via_types.iter_mut().zip(per_type) {
                v.via_bot_via = bot_via;
                v.via_top_via = top_via;
                v.via_bot_wire = bot_wire;
                v.via_top_wire = top_wire;
            }
            cut.init_wire_windows();
        }
    }

    fn init_via_forbid_regions(&mut self) {
        for i in 0..self.cuts.len() {
            let regions: Vec<_> = self.cuts[i]
                .via_types
                .iter()
                .map(|v| {
                    (
                        self.accurate_metal_rect_forbid_regions(&BoxOnLayer::new(i, v.bot)),
                        self.accurate_metal_rect_forbid_regions(&BoxOnLayer::new(i + 1, v.top)),
                    )
                })
                .collect();
            let cut = &mut self.cuts[i];
            let mut bot_max = cut.default_via().bot;
            let mut top_max = cut.default_via().top;
            for (v, (bot, top)) in cut.via_types.iter_mut().zip(regions) {
                bot_max = bot.iter().fold(bot_max, |acc, r| acc.union(r));
                top_max = top.iter().fold(top_max, |acc, r| acc.union(r));
                v.bot_forbid_regions = bot;
                v.top_forbid_regions = top;
            }
            cut.bot_max_forbid_region = bot_max;
            cut.top_max_forbid_region = top_max;
        }
    }

    /// Margin (in DBU) beyond which two nets on a layer cannot interact through wires or vias.
    fn init_safe_margins(&mut self) {
        for i in 0..self.layers.len() {
            let mut tracks = 0;
            if let Some(cut) = self.cuts.get(i) {
                tracks = tracks.max(cut.default_via_metal().x_size()).max(cut.bot_wire_window.0);
            }
            if i > 0 {
                let cut = &self.cuts[i - 1];
                tracks = tracks.max(cut.default_via_metal().y_size()).max(cut.top_wire_window.0);
            }
            let layer = &mut self.layers[i];
            let lut_reach = tracks as Dbu * layer.pitch;
            layer.safe_margin = layer.min_area_margin.max(lut_reach) + layer.pitch;
        }
    }

    fn log_summary(&self) {
        let mut num_points = 0i64;
        for layer in &self.layers {
            num_points += layer.num_tracks() as i64 * layer.num_cps() as i64;
            log::debug!(
                "Layer {}: {} tracks, {} cross-points, pitch {}, min length {}/{}/{}",
                layer.name,
                layer.num_tracks(),
                layer.num_cps(),
                layer.pitch,
                layer.min_len_raw,
                layer.min_len_one_via,
                layer.min_len_two_via
            );
        }
        for cut in &self.cuts {
            let lut = cut.default_via_metal();
            log::debug!(
                "Cut layer {}: {} via types, default {}, via conflict window {}x{}",
                cut.name,
                cut.via_types.len(),
                cut.default_via().name,
                lut.x_size(),
                lut.y_size()
            );
        }
        log::info!("{} metal layers, {} grid points", self.layers.len(), num_points);
    }

    #[inline(always)]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn is_valid(&self, gp: &GridPoint) -> bool {
        gp.layer < self.layers.len() && self.layers[gp.layer].is_valid(gp)
    }

    pub fn is_valid_box(&self, gb: &GridBoxOnLayer) -> bool {
        gb.layer < self.layers.len() && self.layers[gb.layer].is_valid_box(gb)
    }

    pub fn is_valid_via_box(&self, vb: &ViaBox) -> bool {
        self.is_valid_box(&vb.lower)
            && self.is_valid_box(&vb.upper)
            && self.upper_box(&vb.lower).as_ref() == Some(&vb.upper)
            && self.lower_box(&vb.upper).as_ref() == Some(&vb.lower)
    }

    pub fn loc(&self, gp: &GridPoint) -> Point<Dbu> {
        self.layers[gp.layer].loc(gp)
    }

    pub fn box_loc(&self, gb: &GridBoxOnLayer) -> BoxOnLayer {
        BoxOnLayer::new(gb.layer, self.layers[gb.layer].box_loc(gb))
    }

    pub fn upper(&self, gp: &GridPoint) -> Option<GridPoint> {
        if gp.layer + 1 >= self.layers.len() {
            return None;
        }
        self.layers[gp.layer].upper(gp)
    }

    pub fn lower(&self, gp: &GridPoint) -> Option<GridPoint> {
        if gp.layer == 0 {
            return None;
        }
        self.layers[gp.layer].lower(gp)
    }

    /// Grid points whose locations fall inside `region`.
    pub fn range_search(&self, region: &BoxOnLayer, include_bound: bool) -> GridBoxOnLayer {
        let layer = &self.layers[region.layer];
        let dir = layer.direction;
        GridBoxOnLayer::new(
            region.layer,
            layer.range_search_track(&region.rect[dir], include_bound),
            layer.range_search_cp(&region.rect[dir.other()], include_bound),
        )
    }

    pub fn upper_box(&self, cur: &GridBoxOnLayer) -> Option<GridBoxOnLayer> {
        if !self.is_valid_box(cur) || cur.layer + 1 >= self.layers.len() {
            return None;
        }
        let layer = &self.layers[cur.layer];
        let locs = Interval::new(layer.cp_loc(cur.cps.low), layer.cp_loc(cur.cps.high));
        Some(GridBoxOnLayer::new(
            cur.layer + 1,
            self.layers[cur.layer + 1].range_search_track(&locs, true),
            layer.upper_cp_range(&cur.tracks),
        ))
    }

    pub fn lower_box(&self, cur: &GridBoxOnLayer) -> Option<GridBoxOnLayer> {
        if !self.is_valid_box(cur) || cur.layer == 0 {
            return None;
        }
        let layer = &self.layers[cur.layer];
        let locs = Interval::new(layer.cp_loc(cur.cps.low), layer.cp_loc(cur.cps.high));
        Some(GridBoxOnLayer::new(
            cur.layer - 1,
            self.layers[cur.layer - 1].range_search_track(&locs, true),
            layer.lower_cp_range(&cur.tracks),
        ))
    }

    /// Grid-aligned via region shared by two boxes on adjacent layers.
    pub fn via_box_between(&self, lower: &BoxOnLayer, upper: &BoxOnLayer) -> Option<ViaBox> {
        if lower.layer + 1 != upper.layer || upper.layer >= self.layers.len() {
            return None;
        }
        let shared = lower.rect.intersect(&upper.rect);
        if !shared.is_valid() {
            return None;
        }
        let lower_tmp = self.range_search(&BoxOnLayer::new(lower.layer, shared), true);
        let upper_box = self.upper_box(&lower_tmp).filter(|b| self.is_valid_box(b))?;
        let lower_box = self.lower_box(&upper_box).filter(|b| self.is_valid_box(b))?;
        Some(ViaBox { lower: lower_box, upper: upper_box })
    }

    pub fn grid_via_box_between(&self, lower: &GridBoxOnLayer, upper: &GridBoxOnLayer) -> Option<ViaBox> {
        if !self.is_valid_box(lower) || !self.is_valid_box(upper) {
            return None;
        }
        self.via_box_between(&self.box_loc(lower), &self.box_loc(upper))
    }

    pub fn is_connected(&self, lhs: &GridBoxOnLayer, rhs: &GridBoxOnLayer) -> bool {
        if !self.is_valid_box(lhs) || !self.is_valid_box(rhs) {
            return false;
        }
        if lhs.layer + 1 == rhs.layer {
            self.grid_via_box_between(lhs, rhs).is_some_and(|vb| self.is_valid_via_box(&vb))
        } else if rhs.layer + 1 == lhs.layer {
            self.grid_via_box_between(rhs, lhs).is_some_and(|vb| self.is_valid_via_box(&vb))
        } else if lhs.layer == rhs.layer {
            lhs.tracks.overlaps(&rhs.tracks) && lhs.cps.overlaps(&rhs.cps)
        } else {
            false
        }
    }

    /// Same layer, neighbouring track ranges and overlapping cross-point ranges.
    pub fn is_adjacent(&self, lhs: &GridBoxOnLayer, rhs: &GridBoxOnLayer) -> bool {
        if !self.is_valid_box(lhs) || !self.is_valid_box(rhs) || lhs.layer != rhs.layer {
            return false;
        }
        ((lhs.tracks.low - rhs.tracks.high).abs() == 1 || (rhs.tracks.low - lhs.tracks.high).abs() == 1)
            && lhs.cps.overlaps(&rhs.cps)
    }

    pub fn expand_box(&self, region: &BoxOnLayer, num_pitch: i32) -> BoxOnLayer {
        let margin = self.layers[region.layer].pitch * num_pitch as Dbu;
        BoxOnLayer::new(region.layer, region.rect.expand(margin))
    }

    /// Region in which a wire centre line would violate spacing with `metal`.
    pub fn metal_rect_forbid_region(&self, metal: &BoxOnLayer, aggressive: bool) -> BoxOnLayer {
        let layer = &self.layers[metal.layer];
        let mut rect = metal.rect;
        for dim in Dim::ALL {
            let margin = layer.space(&metal.rect, dim, aggressive) + layer.width / 2;
            rect[dim] = rect[dim].expand(margin);
        }
        BoxOnLayer::new(metal.layer, rect)
    }

    /// Tighter forbid regions: end-of-line windows for narrow sides, parallel-run space otherwise.
    pub fn accurate_metal_rect_forbid_regions(&self, metal: &BoxOnLayer) -> Vec<Rect> {
        let layer = &self.layers[metal.layer];
        let mut regions = Vec::new();
        for dim in Dim::ALL {
            let side = metal.rect[dim.other()].range();
            if side < layer.max_eol_width {
                for rule in &layer.eol_rules {
                    let mut region = metal.rect;
                    region[dim.other()] = region[dim.other()].expand(rule.within);
                    region[dim] = region[dim].expand(rule.space);
                    regions.push(region);
                }
            } else if side == layer.max_eol_width {
                let mut region = metal.rect;
                region[dim.other()] = region[dim.other()].expand(layer.max_eol_within);
                region[dim] = region[dim].expand(layer.max_eol_space);
                regions.push(region);
            } else {
                let mut region = metal.rect;
                region[dim] = region[dim].expand(layer.para_run_space_of(&metal.rect));
                regions.push(region);
            }
        }
        regions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::generator::demo_tech;

    fn stack() -> LayerList {
        LayerList::from_description(&demo_tech(4, 12)).unwrap()
    }

    #[test]
    fn cross_points_mirror_neighbour_tracks() {
        let list = stack();
        for (i, layer) in list.layers.iter().enumerate() {
            for (c, cp) in layer.cross_points.iter().enumerate() {
                if let Some(t) = cp.lower_track {
                    let track = &list.layers[i - 1].tracks[t as usize];
                    assert_eq!(track.location, cp.location);
                    assert_eq!(track.upper_cp, Some(c as i32));
                }
                if let Some(t) = cp.upper_track {
                    let track = &list.layers[i + 1].tracks[t as usize];
                    assert_eq!(track.location, cp.location);
                    assert_eq!(track.lower_cp, Some(c as i32));
                }
            }
            assert!(layer.cross_points.windows(2).all(|w| w[0].location < w[1].location));
        }
    }

    #[test]
    fn up_then_down_returns_to_start() {
        let list = stack();
        let gp = GridPoint::new(1, 3, 7);
        let up = list.upper(&gp).unwrap();
        assert_eq!(up.layer, 2);
        assert_eq!(list.lower(&up), Some(gp));
        assert_eq!(list.loc(&gp), list.loc(&up));
        assert_eq!(list.upper(&GridPoint::new(3, 0, 0)), None);
        assert_eq!(list.lower(&GridPoint::new(0, 0, 0)), None);
    }

    #[test]
    fn via_metal_table_is_symmetric() {
        let list = stack();
        for cut in &list.cuts {
            let lut = cut.default_via_metal();
            assert!(lut.get(0, 0));
            for dx in -lut.x_size()..=lut.x_size() {
                for dy in -lut.y_size()..=lut.y_size() {
                    assert_eq!(lut.get(dx, dy), lut.get(-dx, -dy));
                }
            }
        }
    }

    #[test]
    fn via_metal_table_is_symmetric_across_types() {
        let mut tech = demo_tech(3, 12);
        for (i, cut) in tech.cuts.iter_mut().enumerate() {
            cut.via_types.push(crate::tech::ViaTypeDescription {
                name: format!("V{}_skewed", i + 1),
                bot: Rect::new(-30, -130, 90, 40),
                cut: Rect::new(-50, -50, 50, 50),
                top: Rect::new(-140, -20, 60, 35),
            });
        }
        let list = LayerList::from_description(&tech).unwrap();
        for cut in &list.cuts {
            assert_eq!(cut.via_metal.len(), 2);
            for a in 0..2 {
                for b in 0..2 {
                    let (ab, ba) = (&cut.via_metal[a][b], &cut.via_metal[b][a]);
                    for dx in -8..=8 {
                        for dy in -8..=8 {
                            assert_eq!(ab.get(dx, dy), ba.get(-dx, -dy), "types {} {} at ({}, {})", a, b, dx, dy);
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn wire_tables_flag_own_location() {
        let list = stack();
        let via = list.cuts[0].default_via();
        assert_eq!(via.via_bot_wire.len(), list.layers[0].num_cps() as usize);
        assert!(via.via_bot_wire.iter().all(|lut| lut.get(0, 0)));
        assert!(via.via_bot_via.is_empty());
        assert!(!via.via_top_via.is_empty());
    }

    #[test]
    fn via_box_round_trip() {
        let list = stack();
        let lower = GridBoxOnLayer::new(1, Interval::new(2, 4), Interval::new(3, 6));
        let upper = list.upper_box(&lower).unwrap();
        let vb = list.grid_via_box_between(&lower, &upper).unwrap();
        assert!(list.is_valid_via_box(&vb));
        assert!(list.is_connected(&lower, &upper));
        let beside = GridBoxOnLayer::new(1, Interval::new(5, 6), Interval::new(6, 8));
        assert!(list.is_adjacent(&lower, &beside));
        assert!(!list.is_connected(&lower, &beside));
    }

    #[test]
    fn min_lengths_are_clamped() {
        let list = stack();
        for layer in &list.layers {
            assert!(layer.min_len_raw >= 0);
            assert!(layer.min_len_one_via >= 0);
            assert!(layer.min_len_two_via >= 0);
            assert!(layer.min_len_two_via <= layer.min_len_raw);
        }
        assert_eq!(list.layers[0].via_ovlp_dist, 0);
    }
}
