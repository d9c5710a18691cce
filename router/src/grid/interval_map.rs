use dr_common::geom::Interval;

/// Piecewise-constant map from disjoint closed `i32` intervals to values.
///
/// Neighbouring segments that touch and hold equal values are joined, so the
/// segmentation only changes where the value does.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntervalMap<V> {
    segs: Vec<(Interval<i32>, V)>,
}

impl<V: Clone + PartialEq> IntervalMap<V> {
    pub fn new() -> Self {
        Self { segs: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.segs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segs.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Interval<i32>, &V)> {
        self.segs.iter().map(|(i, v)| (*i, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Interval<i32>, &mut V)> {
        self.segs.iter_mut().map(|(i, v)| (*i, v))
    }

    /// Segments intersecting `range`, unclipped, in ascending order.
    pub fn overlapping(&self, range: Interval<i32>) -> impl Iterator<Item = (Interval<i32>, &V)> {
        let start = self.segs.partition_point(|(i, _)| i.high < range.low);
        self.segs[start..]
            .iter()
            .take_while(move |(i, _)| i.low <= range.high)
            .map(|(i, v)| (*i, v))
    }

    pub fn get(&self, point: i32) -> Option<&V> {
        self.overlapping(Interval::point(point)).next().map(|(_, v)| v)
    }

    /// Makes `at` the first point of a segment if a segment spans it.
    fn split_at(&mut self, at: i32) {
        let idx = self.segs.partition_point(|(i, _)| i.high < at);
        if let Some((seg, v)) = self.segs.get(idx).cloned() {
            if seg.low < at {
                self.segs[idx].0.high = at - 1;
                self.segs.insert(idx + 1, (Interval::new(at, seg.high), v));
            }
        }
    }

    /// Applies `f` on every segment inside `range`. With `fill`, uncovered gaps in
    /// `range` are first created holding that value. Segments for which `keep`
    /// returns false are dropped afterwards.
    pub fn update(
        &mut self,
        range: Interval<i32>,
        fill: Option<V>,
        mut f: impl FnMut(&mut V),
        keep: impl Fn(&V) -> bool,
    ) {
        if !range.is_valid() {
            return;
        }
        self.split_at(range.low);
        if range.high < i32::MAX {
            self.split_at(range.high + 1);
        }
        let begin = self.segs.partition_point(|(i, _)| i.high < range.low);
        let end = self.segs.partition_point(|(i, _)| i.low <= range.high);

        let mut touched: Vec<(Interval<i32>, V)> = Vec::with_capacity(end - begin + 1);
        let mut next = range.low;
        for (seg, v) in self.segs.drain(begin..end) {
            if let Some(fv) = &fill {
                if seg.low > next {
                    touched.push((Interval::new(next, seg.low - 1), fv.clone()));
                }
            }
            next = seg.high.saturating_add(1);
            touched.push((seg, v));
        }
        if let Some(fv) = fill {
            if next <= range.high {
                touched.push((Interval::new(next, range.high), fv));
            }
        }
        for (_, v) in touched.iter_mut() {
            f(v);
        }
        touched.retain(|(_, v)| keep(v));

        let tail = self.segs.split_off(begin);
        self.segs.extend(touched);
        self.segs.extend(tail);
        self.join();
    }

    fn join(&mut self) {
        let mut out: Vec<(Interval<i32>, V)> = Vec::with_capacity(self.segs.len());
        for (seg, v) in self.segs.drain(..) {
            if let Some((last, lv)) = out.last_mut() {
                if last.high.saturating_add(1) == seg.low && *lv == v {
                    last.high = seg.high;
                    continue;
                }
            }
            out.push((seg, v));
        }
        self.segs = out;
    }

    /// Rewrites every value in place, dropping segments that `keep` rejects.
    pub fn map_values(&mut self, mut f: impl FnMut(&mut V), keep: impl Fn(&V) -> bool) {
        for (_, v) in self.segs.iter_mut() {
            f(v);
        }
        self.segs.retain(|(_, v)| keep(v));
        self.join();
    }
}

/// Sorted set of owners stored per wire segment.
pub type NetSet<T> = Vec<T>;

pub fn set_insert<T: Ord + Copy>(set: &mut NetSet<T>, item: T) {
    if let Err(pos) = set.binary_search(&item) {
        set.insert(pos, item);
    }
}

pub fn set_remove<T: Ord + Copy>(set: &mut NetSet<T>, item: T) {
    if let Ok(pos) = set.binary_search(&item) {
        set.remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add(map: &mut IntervalMap<Vec<u32>>, low: i32, high: i32, net: u32) {
        map.update(Interval::new(low, high), Some(Vec::new()), |s| set_insert(s, net), |s| !s.is_empty());
    }

    fn sub(map: &mut IntervalMap<Vec<u32>>, low: i32, high: i32, net: u32) {
        map.update(Interval::new(low, high), None, |s| set_remove(s, net), |s| !s.is_empty());
    }

    #[test]
    fn overlapping_sets_split_and_rejoin() {
        let mut map = IntervalMap::new();
        add(&mut map, 0, 10, 1);
        add(&mut map, 5, 15, 2);
        let segs: Vec<_> = map.iter().map(|(i, v)| (i, v.clone())).collect();
        assert_eq!(
            segs,
            vec![
                (Interval::new(0, 4), vec![1]),
                (Interval::new(5, 10), vec![1, 2]),
                (Interval::new(11, 15), vec![2]),
            ]
        );
        sub(&mut map, 0, 20, 2);
        let segs: Vec<_> = map.iter().map(|(i, v)| (i, v.clone())).collect();
        assert_eq!(segs, vec![(Interval::new(0, 10), vec![1])]);
    }

    #[test]
    fn add_then_remove_restores_state() {
        let mut map = IntervalMap::new();
        add(&mut map, 3, 8, 7);
        add(&mut map, 20, 22, 9);
        let before = map.clone();
        add(&mut map, 6, 21, 4);
        sub(&mut map, 6, 21, 4);
        assert_eq!(map, before);
    }

    #[test]
    fn same_net_twice_is_a_set() {
        let mut map = IntervalMap::new();
        add(&mut map, 0, 4, 1);
        add(&mut map, 2, 6, 1);
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(6), Some(&vec![1]));
        assert_eq!(map.get(7), None);
    }

    #[test]
    fn overlapping_returns_whole_segments() {
        let mut map = IntervalMap::new();
        add(&mut map, 0, 4, 1);
        add(&mut map, 10, 14, 2);
        let hits: Vec<_> = map.overlapping(Interval::new(3, 11)).map(|(i, _)| i).collect();
        assert_eq!(hits, vec![Interval::new(0, 4), Interval::new(10, 14)]);
        assert_eq!(map.overlapping(Interval::new(5, 9)).count(), 0);
    }

    #[test]
    fn numeric_values_accumulate() {
        let mut map: IntervalMap<f64> = IntervalMap::new();
        map.update(Interval::new(0, 9), Some(0.0), |v| *v += 1.0, |v| *v != 0.0);
        map.update(Interval::new(5, 5), Some(0.0), |v| *v += 1.0, |v| *v != 0.0);
        assert_eq!(map.get(4), Some(&1.0));
        assert_eq!(map.get(5), Some(&2.0));
        assert_eq!(map.len(), 3);
    }
}
