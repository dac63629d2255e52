use crate::models::{Coord, PointId};
use crate::store::NetworkStore;
use geo::{Distance, Euclidean};
use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use std::collections::BTreeSet;

type IndexedPoint = GeomWithData<[f64; 2], PointId>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryShape {
    Point(Coord),
    Segment(Coord, Coord),
}

impl QueryShape {
    fn envelope(&self, tolerance: f64) -> AABB<[f64; 2]> {
        let (a, b) = match *self {
            QueryShape::Point(c) => (c, c),
            QueryShape::Segment(a, b) => (a, b),
        };
        AABB::from_corners(
            [a.x.min(b.x) - tolerance, a.y.min(b.y) - tolerance],
            [a.x.max(b.x) + tolerance, a.y.max(b.y) + tolerance],
        )
    }

    fn distance_to(&self, coord: Coord) -> f64 {
        match *self {
            QueryShape::Point(c) => (c.x - coord.x).hypot(c.y - coord.y),
            QueryShape::Segment(a, b) => {
                Euclidean.distance(&geo::Point::from(coord), &geo::Line::new(a, b))
            }
        }
    }
}

/// Snapshot of active point locations. Rebuild it whenever the active set changes.
pub struct PointIndex {
    tree: RTree<IndexedPoint>,
}

impl PointIndex {
    pub fn build(store: &NetworkStore) -> Self {
        let items: Vec<IndexedPoint> = store
            .active_points()
            .map(|p| GeomWithData::new([p.x, p.y], p.id))
            .collect();

        PointIndex {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Ids of every indexed point whose distance to `shape` is at most `tolerance`.
    pub fn query_within(&self, shape: QueryShape, tolerance: f64) -> BTreeSet<PointId> {
        let envelope = shape.envelope(tolerance);
        self.tree
            .locate_in_envelope(&envelope)
            .filter(|item| {
                let [x, y] = *item.geom();
                shape.distance_to(Coord { x, y }) <= tolerance
            })
            .map(|item| item.data)
            .collect()
    }
}
