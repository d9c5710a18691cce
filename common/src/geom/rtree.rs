use super::rect::{Dbu, Rect};
use rstar::{AABB, RTree};

/// Rectangles tagged with a payload, queried by box intersection.
pub struct SpatialIndex<T> {
    tree: RTree<IndexedRect<T>>,
}

struct IndexedRect<T> {
    rect: Rect,
    item: T,
}

impl<T> rstar::RTreeObject for IndexedRect<T> {
    type Envelope = AABB<[Dbu; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.rect.x.low, self.rect.y.low],
            [self.rect.x.high, self.rect.y.high],
        )
    }
}

impl<T> SpatialIndex<T> {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn bulk_load(items: Vec<(Rect, T)>) -> Self {
        let items = items
            .into_iter()
            .map(|(rect, item)| IndexedRect { rect, item })
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn insert(&mut self, rect: Rect, item: T) {
        self.tree.insert(IndexedRect { rect, item });
    }

    pub fn query<'a>(&'a self, rect: &Rect) -> impl Iterator<Item = (&'a Rect, &'a T)> + 'a {
        let aabb = AABB::from_corners([rect.x.low, rect.y.low], [rect.x.high, rect.y.high]);
        self.tree
            .locate_in_envelope_intersecting(&aabb)
            .map(|indexed| (&indexed.rect, &indexed.item))
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

impl<T> Default for SpatialIndex<T> {
    fn default() -> Self {
        Self::new()
    }
}
