use dr_common::geom::GridPoint;

/// Neighbour slot of a graph vertex. Forward and backward run along the track,
/// up and down switch layers, left and right jog across tracks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dir {
    Backward = 0,
    Forward = 1,
    Down = 2,
    Up = 3,
    Left = 4,
    Right = 5,
}

impl Dir {
    pub const ALL: [Dir; 6] = [Dir::Backward, Dir::Forward, Dir::Down, Dir::Up, Dir::Left, Dir::Right];

    #[inline(always)]
    pub fn opposite(self) -> Dir {
        match self {
            Dir::Backward => Dir::Forward,
            Dir::Forward => Dir::Backward,
            Dir::Down => Dir::Up,
            Dir::Up => Dir::Down,
            Dir::Left => Dir::Right,
            Dir::Right => Dir::Left,
        }
    }

    #[inline(always)]
    pub fn switches_layer(self) -> bool {
        matches!(self, Dir::Down | Dir::Up)
    }

    #[inline(always)]
    pub fn is_wrong_way(self) -> bool {
        matches!(self, Dir::Left | Dir::Right)
    }
}

/// Sparse routing graph of one net. Every vertex is a grid point inside a guide
/// and has at most one neighbour per direction.
#[derive(Clone, Debug, Default)]
pub struct GridGraph {
    pub points: Vec<GridPoint>,
    pub conn: Vec<[Option<usize>; 6]>,
    pub edge_cost: Vec<[f64; 6]>,
    /// Cost paid when a path passes through the vertex.
    pub vertex_cost: Vec<f64>,
    /// A short wire ending here can be extended to meet minimum area.
    pub min_area_fixable: Vec<bool>,
    pub vertex_pin: Vec<Option<usize>>,
    pub pin_vertices: Vec<Vec<usize>>,
    /// Access point projected from a neighbouring layer; the pin shape is not on it.
    pub fake: Vec<bool>,
    /// Extra cost of tapping the pin from this vertex.
    pub tap_cost: Vec<f64>,
    pub num_edges: usize,
}

impl GridGraph {
    pub fn with_vertices(points: Vec<GridPoint>, num_pins: usize) -> Self {
        let n = points.len();
        Self {
            points,
            conn: vec![[None; 6]; n],
            edge_cost: vec![[0.0; 6]; n],
            vertex_cost: vec![0.0; n],
            min_area_fixable: vec![false; n],
            vertex_pin: vec![None; n],
            pin_vertices: vec![Vec::new(); num_pins],
            fake: vec![false; n],
            tap_cost: vec![0.0; n],
            num_edges: 0,
        }
    }

    #[inline(always)]
    pub fn num_vertices(&self) -> usize {
        self.points.len()
    }

    pub fn num_pins(&self) -> usize {
        self.pin_vertices.len()
    }

    #[inline(always)]
    pub fn neighbour(&self, u: usize, dir: Dir) -> Option<usize> {
        self.conn[u][dir as usize]
    }

    #[inline(always)]
    pub fn cost(&self, u: usize, dir: Dir) -> f64 {
        self.edge_cost[u][dir as usize]
    }

    /// Links `u` to `v` through `dir` and back. The first edge placed in a slot wins.
    pub fn add_edge(&mut self, u: usize, v: usize, dir: Dir, w: f64) {
        if u == v || self.conn[u][dir as usize].is_some() || self.conn[v][dir.opposite() as usize].is_some() {
            return;
        }
        self.conn[u][dir as usize] = Some(v);
        self.edge_cost[u][dir as usize] = w;
        self.conn[v][dir.opposite() as usize] = Some(u);
        self.edge_cost[v][dir.opposite() as usize] = w;
        self.num_edges += 1;
    }

    pub fn has_edge(&self, u: usize, dir: Dir) -> bool {
        self.conn[u][dir as usize].is_some()
    }

    /// Pins reachable only through projected access points.
    pub fn num_fake_only_pins(&self) -> usize {
        self.pin_vertices
            .iter()
            .filter(|vs| !vs.is_empty() && vs.iter().all(|&v| self.fake[v]))
            .count()
    }
}
