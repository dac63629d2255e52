//! In-memory arena of points and lines.
//!
//! Identity is the arena index. `merged_into` links are indices into the same
//! arena, so resolving the active representative of any point is a walk over
//! indices rather than object references.

use crate::errors::{Result, validation_err};
use crate::metadata::{Metadata, MetadataFilter};
use crate::models::{Coord, CoordKey, Line, LineId, Point, PointId, exact_key};
use ahash::AHashMap;
use log::debug;
use std::collections::BTreeSet;

/// Entities touched since the last `take_changes`, for the persistence
/// collaborator to commit in one transaction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub created_points: BTreeSet<PointId>,
    pub updated_points: BTreeSet<PointId>,
    pub created_lines: BTreeSet<LineId>,
    pub updated_lines: BTreeSet<LineId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created_points.is_empty()
            && self.updated_points.is_empty()
            && self.created_lines.is_empty()
            && self.updated_lines.is_empty()
    }

    fn touch_point(&mut self, id: PointId) {
        if !self.created_points.contains(&id) {
            self.updated_points.insert(id);
        }
    }

    fn touch_line(&mut self, id: LineId) {
        if !self.created_lines.contains(&id) {
            self.updated_lines.insert(id);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlannedPoint {
    Existing(PointId),
    New(usize),
}

#[derive(Debug, Default, Clone)]
pub struct NetworkStore {
    points: Vec<Point>,
    lines: Vec<Line>,
    coord_index: AHashMap<CoordKey, PointId>,
    changes: ChangeSet,
}

impl NetworkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from entities loaded by a persistence collaborator.
    /// Ids must be dense arena indices and every merge chain must end at an active point.
    pub fn load(points: Vec<Point>, lines: Vec<Line>) -> Result<Self> {
        for (idx, point) in points.iter().enumerate() {
            if point.id != PointId(idx) {
                return Err(validation_err!(
                    "point at position {} carries id {}",
                    idx,
                    point.id
                ));
            }
        }
        for (idx, line) in lines.iter().enumerate() {
            if line.id != LineId(idx) {
                return Err(validation_err!(
                    "line at position {} carries id {}",
                    idx,
                    line.id
                ));
            }
        }

        let mut store = NetworkStore {
            points,
            lines,
            coord_index: AHashMap::new(),
            changes: ChangeSet::default(),
        };

        for point in &store.points {
            if point.is_merged != point.merged_into.is_some() {
                return Err(validation_err!(
                    "point {} has is_merged={} but merged_into={:?}",
                    point.id,
                    point.is_merged,
                    point.merged_into
                ));
            }
        }
        for idx in 0..store.points.len() {
            store.try_representative(PointId(idx))?;
        }

        // Active points win the exact-coordinate slot over merged ones
        for point in &store.points {
            let key = exact_key(point.coord());
            let taken_by_active = store
                .coord_index
                .get(&key)
                .is_some_and(|existing| store.points[existing.0].is_active());
            if !taken_by_active {
                store.coord_index.insert(key, point.id);
            }
        }

        Ok(store)
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn lines(&self) -> &[Line] {
        &self.lines
    }

    pub fn point(&self, id: PointId) -> Option<&Point> {
        self.points.get(id.0)
    }

    pub fn line(&self, id: LineId) -> Option<&Line> {
        self.lines.get(id.0)
    }

    pub fn point_mut(&mut self, id: PointId) -> Option<&mut Point> {
        let point = self.points.get_mut(id.0)?;
        self.changes.touch_point(id);
        Some(point)
    }

    pub fn line_mut(&mut self, id: LineId) -> Option<&mut Line> {
        let line = self.lines.get_mut(id.0)?;
        self.changes.touch_line(id);
        Some(line)
    }

    pub fn active_points(&self) -> impl Iterator<Item = &Point> {
        self.points.iter().filter(|p| p.is_active())
    }

    pub fn active_lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.iter().filter(|l| l.is_active())
    }

    pub fn active_point_count(&self) -> usize {
        self.active_points().count()
    }

    pub fn active_line_count(&self) -> usize {
        self.active_lines().count()
    }

    /// Follow `merged_into` until an active point is reached.
    pub fn representative(&self, id: PointId) -> Option<PointId> {
        self.try_representative(id).ok()
    }

    fn try_representative(&self, id: PointId) -> Result<PointId> {
        let mut current = id;
        // A chain longer than the arena means a cycle
        for _ in 0..=self.points.len() {
            let point = self
                .points
                .get(current.0)
                .ok_or_else(|| validation_err!("point {} does not exist", current))?;
            match point.merged_into {
                None if point.is_active() => return Ok(current),
                None => {
                    return Err(validation_err!(
                        "point {} is merged but has no target",
                        current
                    ));
                }
                Some(next) => current = next,
            }
        }
        Err(validation_err!("merge chain starting at {} forms a cycle", id))
    }

    /// Exact-coordinate lookup, resolved to the active point that owns that location now.
    pub fn lookup(&self, coord: Coord) -> Option<PointId> {
        let id = self.coord_index.get(&exact_key(coord))?;
        self.representative(*id)
    }

    pub fn active_point_at(&self, coord: Coord) -> Option<&Point> {
        let id = self.coord_index.get(&exact_key(coord))?;
        let point = &self.points[id.0];
        point.is_active().then_some(point)
    }

    pub fn get_or_create_point(&mut self, x: f64, y: f64) -> Result<PointId> {
        let coord = Coord { x, y };
        ensure_finite(coord)?;
        if let Some(existing) = self.lookup(coord) {
            return Ok(existing);
        }
        Ok(self.push_point(coord))
    }

    /// Like `get_or_create_point`, then sets every key of `metadata` on the resulting point.
    pub fn create_point(&mut self, x: f64, y: f64, metadata: Metadata) -> Result<PointId> {
        metadata.validate()?;
        let id = self.get_or_create_point(x, y)?;
        if !metadata.is_empty() {
            if let Some(point) = self.point_mut(id) {
                for (key, value) in metadata.iter() {
                    point.metadata.set(key.clone(), value.clone());
                }
            }
        }
        Ok(id)
    }

    pub fn create_line(
        &mut self,
        p1: PointId,
        p2: PointId,
        metadata: Option<Metadata>,
    ) -> Result<LineId> {
        if let Some(metadata) = &metadata {
            metadata.validate()?;
        }
        let start = self
            .representative(p1)
            .ok_or_else(|| validation_err!("line start {} does not exist", p1))?;
        let end = self
            .representative(p2)
            .ok_or_else(|| validation_err!("line end {} does not exist", p2))?;
        if start == end {
            return Err(validation_err!(
                "degenerate line: both endpoints resolve to point {}",
                start
            ));
        }
        let start = self.points[start.0].coord();
        let end = self.points[end.0].coord();
        Ok(self.push_line(start, end, metadata.unwrap_or_default()))
    }

    /// Batch ingestion. Nothing is created unless every pair is valid.
    pub fn create_lines_from_coordinates(
        &mut self,
        pairs: &[(Coord, Coord)],
        per_line_metadata: Option<&[Metadata]>,
    ) -> Result<Vec<LineId>> {
        if let Some(metadata) = per_line_metadata {
            if metadata.len() != pairs.len() {
                return Err(validation_err!(
                    "got {} metadata entries for {} coordinate pairs",
                    metadata.len(),
                    pairs.len()
                ));
            }
            for entry in metadata {
                entry.validate()?;
            }
        }

        let mut pending: Vec<Coord> = Vec::new();
        let mut pending_index: AHashMap<CoordKey, usize> = AHashMap::new();
        let mut planned: Vec<(PlannedPoint, PlannedPoint)> = Vec::with_capacity(pairs.len());

        for (idx, (a, b)) in pairs.iter().enumerate() {
            ensure_finite(*a)?;
            ensure_finite(*b)?;
            let mut plan = |coord: Coord| match self.lookup(coord) {
                Some(existing) => PlannedPoint::Existing(existing),
                None => {
                    let next = pending.len();
                    let slot = *pending_index.entry(exact_key(coord)).or_insert(next);
                    if slot == next {
                        pending.push(coord);
                    }
                    PlannedPoint::New(slot)
                }
            };
            let start = plan(*a);
            let end = plan(*b);
            if start == end {
                return Err(validation_err!(
                    "degenerate line at index {}: ({}, {}) -> ({}, {})",
                    idx,
                    a.x,
                    a.y,
                    b.x,
                    b.y
                ));
            }
            planned.push((start, end));
        }

        let created: Vec<PointId> = pending.into_iter().map(|c| self.push_point(c)).collect();
        let resolve = |planned: PlannedPoint| match planned {
            PlannedPoint::Existing(id) => id,
            PlannedPoint::New(slot) => created[slot],
        };

        let mut line_ids = Vec::with_capacity(planned.len());
        for (idx, (start, end)) in planned.into_iter().enumerate() {
            let start = self.points[resolve(start).0].coord();
            let end = self.points[resolve(end).0].coord();
            let metadata = per_line_metadata
                .map(|m| m[idx].clone())
                .unwrap_or_default();
            line_ids.push(self.push_line(start, end, metadata));
        }

        debug!(
            "Ingested {} lines ({} new points)",
            line_ids.len(),
            created.len()
        );
        Ok(line_ids)
    }

    pub fn find_points_by_conditions(&self, filter: &MetadataFilter) -> Vec<Coord> {
        self.active_points()
            .filter(|p| filter.matches(&p.metadata))
            .map(|p| p.coord())
            .collect()
    }

    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    pub fn take_changes(&mut self) -> ChangeSet {
        std::mem::take(&mut self.changes)
    }

    pub(crate) fn push_point(&mut self, coord: Coord) -> PointId {
        let id = PointId(self.points.len());
        self.points.push(Point::new(id, coord.x, coord.y));
        self.coord_index.insert(exact_key(coord), id);
        self.changes.created_points.insert(id);
        id
    }

    pub(crate) fn push_line(&mut self, start: Coord, end: Coord, metadata: Metadata) -> LineId {
        let id = LineId(self.lines.len());
        self.lines.push(Line::new(id, start, end, metadata));
        self.changes.created_lines.insert(id);
        id
    }

    /// Fold `source` into `target`. The caller has already computed the merged metadata.
    pub(crate) fn mark_merged(&mut self, source: PointId, target: PointId, merged: Metadata) {
        self.points[source.0].is_merged = true;
        self.points[source.0].merged_into = Some(target);
        self.changes.touch_point(source);
        self.points[target.0].metadata = merged;
        self.changes.touch_point(target);
    }

    /// Rewrite line endpoints according to `moves` (old exact coordinate -> new coordinate).
    pub(crate) fn rewrite_endpoints(&mut self, moves: &AHashMap<CoordKey, Coord>) -> usize {
        let mut rewritten = 0;
        for line in self.lines.iter_mut() {
            let mut changed = false;
            for old in [line.start(), line.end()] {
                if let Some(new) = moves.get(&exact_key(old)) {
                    changed |= line.update_endpoint(old, *new);
                }
            }
            if changed {
                rewritten += 1;
                self.changes.touch_line(line.id);
            }
        }
        rewritten
    }

    pub(crate) fn mark_split(&mut self, id: LineId) {
        self.lines[id.0].is_split = true;
        self.changes.touch_line(id);
    }
}

fn ensure_finite(coord: Coord) -> Result<()> {
    if coord.x.is_finite() && coord.y.is_finite() {
        Ok(())
    } else {
        Err(validation_err!(
            "coordinate ({}, {}) is not finite",
            coord.x,
            coord.y
        ))
    }
}
