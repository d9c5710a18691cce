use super::indices::NetId;
use super::topo::GridTopo;
use crate::geom::{BoxOnLayer, GridBoxOnLayer, Interval, Rect};
use crate::tech::{LayerList, TechDescription, TechError};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PinDescription {
    #[serde(default)]
    pub name: String,
    pub boxes: Vec<BoxOnLayer>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NetDescription {
    pub name: String,
    pub pins: Vec<PinDescription>,
    #[serde(default)]
    pub guides: Vec<BoxOnLayer>,
}

/// On-disk form of a routing problem.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DesignDescription {
    #[serde(default)]
    pub name: String,
    pub tech: TechDescription,
    #[serde(default)]
    pub nets: Vec<NetDescription>,
    #[serde(default)]
    pub obstacles: Vec<BoxOnLayer>,
}

#[derive(Clone, Debug)]
pub struct Net {
    pub id: NetId,
    pub name: String,
    /// (pin, access box) -> box
    pub pins: Vec<Vec<BoxOnLayer>>,
    pub guides: Vec<BoxOnLayer>,
    pub grid_guides: Vec<GridBoxOnLayer>,
    pub topo: GridTopo,
}

impl Net {
    pub fn num_pins(&self) -> usize {
        self.pins.len()
    }

    pub fn max_access_box(&self, pin: usize) -> Option<BoxOnLayer> {
        self.pins[pin].iter().copied().max_by_key(|b| b.rect.area())
    }
}

pub struct Design {
    pub name: String,
    pub layers: LayerList,
    pub nets: Vec<Net>,
    pub obstacles: Vec<BoxOnLayer>,
}

impl Design {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read design {:?}", path))?;
        let desc: DesignDescription =
            toml::from_str(&text).with_context(|| format!("Failed to parse design {:?}", path))?;
        Ok(Self::from_description(&desc)?)
    }

    pub fn from_description(desc: &DesignDescription) -> Result<Self, TechError> {
        let layers = LayerList::from_description(&desc.tech)?;
        let num_layers = layers.num_layers();
        let keep = |what: &str, owner: &str, b: &BoxOnLayer| {
            let ok = b.layer < num_layers && b.rect.is_valid();
            if !ok {
                log::warn!("Dropping {} of {} on layer {}: {:?}", what, owner, b.layer, b.rect);
            }
            ok
        };

        let nets = desc
            .nets
            .iter()
            .enumerate()
            .map(|(i, nd)| {
                let pins = nd
                    .pins
                    .iter()
                    .map(|p| p.boxes.iter().copied().filter(|b| keep("pin box", &nd.name, b)).collect())
                    .collect();
                let guides: Vec<BoxOnLayer> =
                    nd.guides.iter().copied().filter(|b| keep("route guide", &nd.name, b)).collect();
                let grid_guides = guides.iter().map(|g| layers.range_search(g, true)).collect();
                Net {
                    id: NetId::new(i),
                    name: nd.name.clone(),
                    pins,
                    guides,
                    grid_guides,
                    topo: GridTopo::new(),
                }
            })
            .collect();

        let obstacles = desc.obstacles.iter().copied().filter(|b| keep("obstacle", "design", b)).collect();

        log::info!(
            "Design '{}': {} nets, {} obstacles, {} metal layers",
            desc.name,
            desc.nets.len(),
            desc.obstacles.len(),
            num_layers
        );

        Ok(Self {
            name: desc.name.clone(),
            layers,
            nets,
            obstacles,
        })
    }

    /// Obstacles (owner `None`) plus every pin access box owned by its net.
    pub fn fixed_metals(&self) -> Vec<(BoxOnLayer, Option<NetId>)> {
        let obstacles = self.obstacles.iter().map(|b| (*b, None));
        let pins = self
            .nets
            .iter()
            .flat_map(|n| n.pins.iter().flatten().map(move |b| (*b, Some(n.id))));
        obstacles.chain(pins).collect()
    }

    /// Bounding box of every layer's full track grid.
    pub fn die_area(&self) -> Rect {
        self.layers
            .layers
            .iter()
            .map(|l| {
                let all = GridBoxOnLayer::new(
                    l.idx,
                    Interval::new(0, l.num_tracks() - 1),
                    Interval::new(0, l.num_cps() - 1),
                );
                l.box_loc(&all)
            })
            .fold(Rect::empty(), |acc, r| acc.union(&r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::generator::demo_tech;

    fn demo() -> DesignDescription {
        DesignDescription {
            name: "demo".to_string(),
            tech: demo_tech(3, 8),
            nets: vec![NetDescription {
                name: "n0".to_string(),
                pins: vec![
                    PinDescription {
                        name: "a".to_string(),
                        boxes: vec![
                            BoxOnLayer::new(0, Rect::new(100, 100, 300, 300)),
                            BoxOnLayer::new(7, Rect::new(0, 0, 10, 10)),
                        ],
                    },
                    PinDescription {
                        name: "b".to_string(),
                        boxes: vec![BoxOnLayer::new(0, Rect::new(900, 100, 1000, 200))],
                    },
                ],
                guides: vec![BoxOnLayer::new(0, Rect::new(0, 0, 1100, 400))],
            }],
            obstacles: vec![BoxOnLayer::new(1, Rect::new(500, 500, 600, 600))],
        }
    }

    #[test]
    fn invalid_layer_boxes_are_dropped() {
        let design = Design::from_description(&demo()).unwrap();
        assert_eq!(design.nets[0].pins[0].len(), 1);
        assert_eq!(design.nets[0].grid_guides.len(), 1);
        assert_eq!(design.fixed_metals().len(), 3);
        assert_eq!(design.fixed_metals().iter().filter(|(_, o)| o.is_none()).count(), 1);
    }

    #[test]
    fn design_reads_from_toml() {
        let text = toml::to_string(&demo()).unwrap();
        let back: DesignDescription = toml::from_str(&text).unwrap();
        assert_eq!(back.nets[0].pins.len(), 2);
        assert_eq!(back.nets[0].guides[0].rect, Rect::new(0, 0, 1100, 400));
    }

    #[test]
    fn max_access_box_prefers_area() {
        let design = Design::from_description(&demo()).unwrap();
        let b = design.nets[0].max_access_box(0).unwrap();
        assert_eq!(b.rect, Rect::new(100, 100, 300, 300));
    }
}
