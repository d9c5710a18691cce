use crate::grid::GridStats;
use crate::status::RouteStatus;
use dr_common::db::Design;
use dr_common::geom::EdgeKind;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

fn edge_tag(kind: EdgeKind) -> &'static str {
    match kind {
        EdgeKind::Via => "via",
        EdgeKind::Track => "wire",
        EdgeKind::WrongWay => "wrong-way",
        EdgeKind::Invalid => "invalid",
    }
}

/// Writes the routed nets as plain text: a status line per net, one line per
/// topology edge and extension, then the statistics summary when given.
pub fn write_report<W: Write>(
    out: &mut W,
    design: &Design,
    status: &[RouteStatus],
    stats: Option<&GridStats>,
) -> std::io::Result<()> {
    writeln!(out, "design {}", design.name)?;
    for (i, net) in design.nets.iter().enumerate() {
        let s = status.get(i).copied().unwrap_or(RouteStatus::FailUnprocessed);
        writeln!(out, "net {} {}", net.name, s)?;
        for edge in net.topo.edges() {
            writeln!(out, "  {} {:?} {:?}", edge_tag(edge.kind()), edge.u, edge.v)?;
        }
        for ext in net.topo.extensions() {
            writeln!(
                out,
                "  extension ({}, {}, {}..{})",
                ext.layer, ext.track, ext.cps.low, ext.cps.high
            )?;
        }
    }

    let failed = status.iter().filter(|s| !s.is_succ()).count();
    writeln!(out, "nets {} failed {}", design.nets.len(), failed)?;
    if let Some(stats) = stats {
        writeln!(out, "stats {}", stats)?;
    }
    Ok(())
}

pub fn save_report(
    path: &Path,
    design: &Design,
    status: &[RouteStatus],
    stats: Option<&GridStats>,
) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut out = BufWriter::new(File::create(path)?);
    write_report(&mut out, design, status, stats)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dr_common::db::{DesignDescription, NetDescription, PinDescription};
    use dr_common::geom::{BoxOnLayer, GridPoint, Interval, Rect, TrackSegment};
    use dr_common::util::generator::demo_tech;

    #[test]
    fn lists_edges_and_extensions() {
        let desc = DesignDescription {
            name: "rep".to_string(),
            tech: demo_tech(3, 10),
            nets: vec![NetDescription {
                name: "a".to_string(),
                pins: vec![
                    PinDescription {
                        name: String::new(),
                        boxes: vec![BoxOnLayer::new(1, Rect::new(100, 100, 100, 100))],
                    },
                    PinDescription {
                        name: String::new(),
                        boxes: vec![BoxOnLayer::new(1, Rect::new(100, 1100, 100, 1100))],
                    },
                ],
                guides: vec![],
            }],
            obstacles: vec![],
        };
        let mut design = Design::from_description(&desc).unwrap();
        let topo = &mut design.nets[0].topo;
        let root = topo.add_node(GridPoint::new(1, 0, 0), Some(0));
        let leaf = topo.add_node(GridPoint::new(1, 0, 5), Some(1));
        topo.roots.push(root);
        topo.set_parent(leaf, root);
        topo.nodes[leaf].extension = Some(TrackSegment::new(1, 0, Interval::new(5, 6)));

        let mut buf = Vec::new();
        write_report(&mut buf, &design, &[RouteStatus::SuccNormal], None).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("net a SUCC_NORMAL"));
        assert!(text.contains("  wire (1, 0, 5) (1, 0, 0)"));
        assert!(text.contains("  extension (1, 0, 5..6)"));
        assert!(text.ends_with("nets 1 failed 0\n"));
    }
}
