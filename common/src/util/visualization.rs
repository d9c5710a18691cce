use crate::db::design::Design;
use crate::geom::{Dbu, EdgeKind, GridBoxOnLayer, Interval, Point, Rect};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect as ImageRect;
use std::path::Path;

/// Renders guides, fixed metals and routed topologies of every layer into one PNG.
pub fn draw_routed_design(design: &Design, filename: &str, width: u32, height: u32) {
    let mut img = RgbaImage::new(width, height);
    image::imageops::replace(
        &mut img,
        &RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
        0,
        0,
    );

    let die = design.die_area().expand(design.layers.layers[0].pitch);
    if die.width() <= 0 || die.height() <= 0 {
        return;
    }

    let scale_x = width as f64 / die.width() as f64;
    let scale_y = height as f64 / die.height() as f64;
    let map = |p: Point<Dbu>| {
        (
            (p.x - die.x.low) as f64 * scale_x,
            height as f64 - (p.y - die.y.low) as f64 * scale_y,
        )
    };
    let map_rect = |r: &Rect| {
        let (x0, y1) = map(Point::new(r.x.low, r.y.low));
        let (x1, y0) = map(Point::new(r.x.high, r.y.high));
        ImageRect::at(x0 as i32, y0 as i32).of_size(((x1 - x0) as u32).max(1), ((y1 - y0) as u32).max(1))
    };

    let colors = [
        // M1: Blue
        Rgba([0, 110, 255, 200]),
        // M2: Red
        Rgba([255, 20, 80, 200]),
        // M3: Green
        Rgba([0, 255, 100, 200]),
        // M4: Gold
        Rgba([255, 215, 0, 200]),
        // M5: Violet
        Rgba([180, 50, 255, 200]),
        // M6: Cyan
        Rgba([0, 240, 255, 200]),
    ];
    let color_of = |layer: usize| colors[layer.min(colors.len() - 1)];

    let guide_color = Rgba([45, 45, 55, 255]);
    for net in &design.nets {
        for g in &net.guides {
            draw_hollow_rect_mut(&mut img, map_rect(&g.rect), guide_color);
        }
    }
    for b in &design.obstacles {
        draw_filled_rect_mut(&mut img, map_rect(&b.rect), Rgba([110, 110, 110, 255]));
    }

    let layers = &design.layers;
    let mut wires: Vec<(usize, Point<Dbu>, Point<Dbu>)> = Vec::new();
    let mut vias: Vec<Point<Dbu>> = Vec::new();
    for net in &design.nets {
        for edge in net.topo.edges() {
            match edge.kind() {
                EdgeKind::Via => vias.push(layers.loc(&edge.lower())),
                EdgeKind::Track | EdgeKind::WrongWay => {
                    wires.push((edge.u.layer, layers.loc(&edge.u), layers.loc(&edge.v)))
                }
                EdgeKind::Invalid => {}
            }
        }
        for ext in net.topo.extensions() {
            let l = &layers.layers[ext.layer];
            let seg = l.box_loc(&GridBoxOnLayer::new(
                ext.layer,
                Interval::point(ext.track),
                ext.cps,
            ));
            wires.push((ext.layer, Point::new(seg.x.low, seg.y.low), Point::new(seg.x.high, seg.y.high)));
        }
    }
    wires.sort_by_key(|w| w.0);

    for (layer, p1, p2) in wires {
        let (x1, y1) = map(p1);
        let (x2, y2) = map(p2);
        let color = color_of(layer);
        draw_line_segment_mut(&mut img, (x1 as f32, y1 as f32), (x2 as f32, y2 as f32), color);
        draw_line_segment_mut(
            &mut img,
            ((x1 + 1.0) as f32, (y1 + 1.0) as f32),
            ((x2 + 1.0) as f32, (y2 + 1.0) as f32),
            color,
        );
    }

    for v in vias {
        let (x, y) = map(v);
        let rect = ImageRect::at(x as i32 - 1, y as i32 - 1).of_size(3, 3);
        draw_filled_rect_mut(&mut img, rect, Rgba([255, 255, 255, 220]));
    }

    let pin_color = Rgba([255, 255, 255, 255]);
    for net in &design.nets {
        for b in net.pins.iter().flatten() {
            draw_hollow_rect_mut(&mut img, map_rect(&b.rect), pin_color);
        }
    }

    let _ = img.save(Path::new(filename));
}
