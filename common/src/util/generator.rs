use crate::db::design::{DesignDescription, NetDescription, PinDescription};
use crate::geom::{BoxOnLayer, Dbu, Rect};
use crate::tech::{
    CutLayerDescription, EolRule, MetalLayerDescription, SpacingTableDescription, TechDescription,
    ViaTypeDescription, WireDirection,
};
use rand::Rng;
use std::fs::File;
use std::io::Write;

const PITCH: Dbu = 200;
const WIDTH: Dbu = 100;
const TRACK_START: Dbu = 100;

/// Rectangle centred on the origin, `along` half-length in the wire direction.
fn oriented(direction: WireDirection, along: Dbu, across: Dbu) -> Rect {
    match direction {
        WireDirection::Horizontal => Rect::new(-along, -across, along, across),
        WireDirection::Vertical => Rect::new(-across, -along, across, along),
    }
}

fn direction_of(layer: usize) -> WireDirection {
    if layer % 2 == 0 { WireDirection::Horizontal } else { WireDirection::Vertical }
}

/// A regular stack: every layer has `num_tracks` tracks on the same 200-unit
/// pitch, directions alternate starting horizontal.
pub fn demo_tech(num_layers: usize, num_tracks: usize) -> TechDescription {
    let layers = (0..num_layers)
        .map(|i| MetalLayerDescription {
            name: format!("M{}", i + 1),
            direction: direction_of(i),
            width: WIDTH,
            pitch: PITCH,
            track_start: TRACK_START,
            num_tracks,
            min_area: Some(40000),
            spacing: Some(SpacingTableDescription {
                widths: vec![0],
                lengths: vec![0],
                table: vec![vec![100]],
            }),
            eol: vec![EolRule {
                space: 120,
                width: 110,
                within: 30,
            }],
        })
        .collect();

    let cuts = (0..num_layers.saturating_sub(1))
        .map(|i| CutLayerDescription {
            name: format!("V{}", i + 1),
            spacing: Some(100),
            via_types: vec![ViaTypeDescription {
                name: format!("V{}_default", i + 1),
                bot: oriented(direction_of(i), 70, WIDTH / 2),
                cut: Rect::new(-50, -50, 50, 50),
                top: oriented(direction_of(i + 1), 70, WIDTH / 2),
            }],
        })
        .collect();

    TechDescription { layers, cuts }
}

fn track_loc(i: usize) -> Dbu {
    TRACK_START + i as Dbu * PITCH
}

/// Writes a random routing problem on the demo stack. Pins sit on grid points of
/// the bottom two layers, guides cover each net's bounding box on the bottom
/// three layers, and obstacles stay clear of every pin.
pub fn generate_random_design(
    filename: &str,
    num_layers: usize,
    num_tracks: usize,
    num_nets: usize,
    num_obstacles: usize,
) -> std::io::Result<()> {
    let mut file = File::create(filename)?;
    let mut rng = rand::thread_rng();
    let num_layers = num_layers.max(2);
    let num_tracks = num_tracks.max(4);

    log::info!(
        "Generating Benchmark: {} layers x {} tracks, {} nets, {} obstacles",
        num_layers,
        num_tracks,
        num_nets,
        num_obstacles
    );

    let mut taken = Vec::new();
    let mut nets = Vec::with_capacity(num_nets);
    for n in 0..num_nets {
        let num_pins = rng.gen_range(2..=4);
        let mut pins = Vec::with_capacity(num_pins);
        let mut bbox = Rect::empty();
        while pins.len() < num_pins {
            let layer = rng.gen_range(0..2);
            let (x, y) = (rng.gen_range(0..num_tracks), rng.gen_range(0..num_tracks));
            if taken.contains(&(layer, x, y)) {
                continue;
            }
            taken.push((layer, x, y));
            let (cx, cy) = (track_loc(x), track_loc(y));
            let rect = Rect::new(cx - WIDTH / 2, cy - WIDTH / 2, cx + WIDTH / 2, cy + WIDTH / 2);
            bbox = bbox.union(&rect);
            pins.push(PinDescription {
                name: format!("p{}", pins.len()),
                boxes: vec![BoxOnLayer::new(layer, rect)],
            });
        }
        let guide = bbox.expand(PITCH);
        nets.push(NetDescription {
            name: format!("net{}", n),
            pins,
            guides: (0..num_layers.min(3)).map(|l| BoxOnLayer::new(l, guide)).collect(),
        });
    }

    let mut obstacles = Vec::with_capacity(num_obstacles);
    let mut attempts = 0;
    while obstacles.len() < num_obstacles && attempts < num_obstacles * 20 {
        attempts += 1;
        let layer = rng.gen_range(0..num_layers);
        let (x, y) = (rng.gen_range(0..num_tracks), rng.gen_range(0..num_tracks));
        let near_pin = taken
            .iter()
            .any(|&(l, px, py)| l.abs_diff(layer) <= 1 && px.abs_diff(x) <= 2 && py.abs_diff(y) <= 2);
        if near_pin {
            continue;
        }
        let (cx, cy) = (track_loc(x), track_loc(y));
        obstacles.push(BoxOnLayer::new(layer, Rect::new(cx - WIDTH / 2, cy - WIDTH / 2, cx + WIDTH / 2, cy + WIDTH / 2)));
    }

    let design = DesignDescription {
        name: "random_demo".to_string(),
        tech: demo_tech(num_layers, num_tracks),
        nets,
        obstacles,
    };
    let body = toml::to_string(&design).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    writeln!(file, "# generated: {} nets on {} layers", num_nets, num_layers)?;
    write!(file, "{}", body)?;
    Ok(())
}
