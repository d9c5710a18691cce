/// Signed 2-D conflict table. Entry `(dx, dy)` is addressed by a track offset and a
/// second offset (upper track or cross-point, depending on the table); anything outside
/// `[-x_size, x_size] x [-y_size, y_size]` is conflict-free.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ViaLut {
    x_size: i32,
    y_size: i32,
    bits: Vec<bool>,
}

impl ViaLut {
    pub fn new(x_size: i32, y_size: i32) -> Self {
        let (x_size, y_size) = (x_size.max(0), y_size.max(0));
        Self {
            x_size,
            y_size,
            bits: vec![false; ((2 * x_size + 1) * (2 * y_size + 1)) as usize],
        }
    }

    pub fn from_fn(x_size: i32, y_size: i32, mut f: impl FnMut(i32, i32) -> bool) -> Self {
        let mut lut = Self::new(x_size, y_size);
        for dx in -lut.x_size..=lut.x_size {
            for dy in -lut.y_size..=lut.y_size {
                if f(dx, dy) {
                    lut.set(dx, dy, true);
                }
            }
        }
        lut
    }

    #[inline(always)]
    fn offset(&self, dx: i32, dy: i32) -> Option<usize> {
        if dx.abs() > self.x_size || dy.abs() > self.y_size {
            return None;
        }
        Some(((dx + self.x_size) * (2 * self.y_size + 1) + dy + self.y_size) as usize)
    }

    #[inline(always)]
    pub fn get(&self, dx: i32, dy: i32) -> bool {
        self.offset(dx, dy).is_some_and(|i| self.bits[i])
    }

    pub fn set(&mut self, dx: i32, dy: i32, value: bool) {
        if let Some(i) = self.offset(dx, dy) {
            self.bits[i] = value;
        }
    }

    pub fn x_size(&self) -> i32 {
        self.x_size
    }

    pub fn y_size(&self) -> i32 {
        self.y_size
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }

    /// Shrinks both radii to the farthest conflicting entry.
    pub fn trimmed(self) -> Self {
        let (mut x, mut y) = (0, 0);
        for dx in -self.x_size..=self.x_size {
            for dy in -self.y_size..=self.y_size {
                if self.get(dx, dy) {
                    x = x.max(dx.abs());
                    y = y.max(dy.abs());
                }
            }
        }
        if x == self.x_size && y == self.y_size {
            return self;
        }
        Self::from_fn(x, y, |dx, dy| self.get(dx, dy))
    }
}

/// Largest radii over a family of per-cross-point tables.
pub fn max_extent(luts: &[ViaLut]) -> (i32, i32) {
    luts.iter()
        .fold((0, 0), |(x, y), lut| (x.max(lut.x_size()), y.max(lut.y_size())))
}
