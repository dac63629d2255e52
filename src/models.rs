// Copyright Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use crate::coord_conversion::{coord_key, line_key};
use crate::metadata::{MetaValue, Metadata};
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Coord = geo_types::Coord<f64>;

/// Hashable exact-coordinate key used for lookups. No tolerance is applied.
pub type CoordKey = (OrderedFloat<f64>, OrderedFloat<f64>);

pub fn exact_key(coord: Coord) -> CoordKey {
    (OrderedFloat(coord.x), OrderedFloat(coord.y))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineId(pub usize);

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "l{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub id: PointId,
    pub x: f64,
    pub y: f64,
    pub is_merged: bool,
    /// Index of the point this one was folded into. Never forms a cycle.
    pub merged_into: Option<PointId>,
    pub metadata: Metadata,
}

impl Point {
    pub fn new(id: PointId, x: f64, y: f64) -> Self {
        Self {
            id,
            x,
            y,
            is_merged: false,
            merged_into: None,
            metadata: Metadata::new(),
        }
    }

    pub fn coord(&self) -> Coord {
        Coord { x: self.x, y: self.y }
    }

    pub fn is_active(&self) -> bool {
        !self.is_merged
    }

    pub fn key(&self) -> String {
        coord_key(self.coord())
    }

    pub fn distance_to(&self, other: Coord) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn to_geo(&self) -> geo::Point<f64> {
        geo::Point::new(self.x, self.y)
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn get_metadata(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    pub fn get_metadata_or<'a>(&'a self, key: &str, default: &'a MetaValue) -> &'a MetaValue {
        self.metadata.get_or(key, default)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.metadata.set(key, value);
    }

    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.has(key)
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<MetaValue> {
        self.metadata.remove(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub id: LineId,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub is_split: bool,
    pub metadata: Metadata,
}

impl Line {
    pub fn new(id: LineId, start: Coord, end: Coord, metadata: Metadata) -> Self {
        Self {
            id,
            x1: start.x,
            y1: start.y,
            x2: end.x,
            y2: end.y,
            is_split: false,
            metadata,
        }
    }

    pub fn start(&self) -> Coord {
        Coord { x: self.x1, y: self.y1 }
    }

    pub fn end(&self) -> Coord {
        Coord { x: self.x2, y: self.y2 }
    }

    pub fn coords(&self) -> (Coord, Coord) {
        (self.start(), self.end())
    }

    pub fn key(&self) -> String {
        line_key(self.start(), self.end())
    }

    pub fn is_active(&self) -> bool {
        !self.is_split
    }

    pub fn length(&self) -> f64 {
        (self.x2 - self.x1).hypot(self.y2 - self.y1)
    }

    /// Both endpoints sit on the same coordinate, e.g. after merging them together.
    pub fn is_degenerate(&self) -> bool {
        self.x1 == self.x2 && self.y1 == self.y2
    }

    pub fn has_endpoint(&self, coord: Coord) -> bool {
        self.start() == coord || self.end() == coord
    }

    /// Move every endpoint sitting exactly at `old` to `new`. Returns whether anything changed.
    pub fn update_endpoint(&mut self, old: Coord, new: Coord) -> bool {
        let mut changed = false;
        if self.x1 == old.x && self.y1 == old.y {
            self.x1 = new.x;
            self.y1 = new.y;
            changed = true;
        }
        if self.x2 == old.x && self.y2 == old.y {
            self.x2 = new.x;
            self.y2 = new.y;
            changed = true;
        }
        changed
    }

    pub fn to_geo(&self) -> geo::Line<f64> {
        geo::Line::new(self.start(), self.end())
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn get_metadata(&self, key: &str) -> Option<&MetaValue> {
        self.metadata.get(key)
    }

    pub fn get_metadata_or<'a>(&'a self, key: &str, default: &'a MetaValue) -> &'a MetaValue {
        self.metadata.get_or(key, default)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<MetaValue>) {
        self.metadata.set(key, value);
    }

    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.has(key)
    }

    pub fn remove_metadata(&mut self, key: &str) -> Option<MetaValue> {
        self.metadata.remove(key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRecord {
    pub source: PointId,
    pub target: PointId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub start: Coord,
    pub end: Coord,
    pub path: Vec<Coord>,
    /// Number of edges walked.
    pub length: usize,
    pub vertex_indices: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn test_update_endpoint_rewrites_matching_ends_only() {
        let mut line = Line::new(LineId(0), c(0.0, 0.0), c(1.0, 0.0), Metadata::new());
        assert!(line.update_endpoint(c(1.0, 0.0), c(1.0, 0.5)));
        assert_eq!(line.coords(), (c(0.0, 0.0), c(1.0, 0.5)));
        assert!(!line.update_endpoint(c(9.0, 9.0), c(0.0, 0.0)));
        assert_eq!(line.key(), "0.000000,0.000000|1.000000,0.500000");
    }

    #[test]
    fn test_degenerate_after_collapse() {
        let mut line = Line::new(LineId(0), c(0.0, 0.0), c(0.05, 0.0), Metadata::new());
        assert!(!line.is_degenerate());
        line.update_endpoint(c(0.05, 0.0), c(0.0, 0.0));
        assert!(line.is_degenerate());
        assert_eq!(line.length(), 0.0);
    }

    #[test]
    fn test_point_accessors() {
        let mut point = Point::new(PointId(3), 3.0, 4.0);
        assert!((point.distance_to(c(0.0, 0.0)) - 5.0).abs() < 1e-9);
        assert_eq!(point.key(), "3.000000,4.000000");
        point.set_metadata("surface", "gravel");
        assert!(point.has_metadata("surface"));
        let fallback = MetaValue::Bool(false);
        assert_eq!(point.get_metadata_or("bike_lane", &fallback), &fallback);
        assert_eq!(
            point.remove_metadata("surface"),
            Some(MetaValue::Text("gravel".to_string()))
        );
        assert!(!point.has_metadata("surface"));
    }
}
