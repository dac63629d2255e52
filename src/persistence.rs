//! Row types, query predicates and the repository contract used to persist a network.
//!
//! The in-memory accessors on `Point`/`Line` and the SQL predicates here are kept as
//! separate functions; a repository filters with the predicates, the engine never does.

use crate::coord_conversion::parse_coord_key;
use crate::errors::{NetworkError, Result};
use crate::metadata::Metadata;
use crate::models::{Coord, Line, LineId, Point, PointId};
use crate::schema::{tbl_line, tbl_point};
use crate::store::{ChangeSet, NetworkStore};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use log::info;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::tbl_point)]
pub struct PointRow {
    pub id: i64,
    pub x: f64,
    pub y: f64,
    pub is_merged: bool,
    pub merged_into_id: Option<i64>,
    pub metadata: Value,
}

#[derive(Queryable, Selectable, Insertable, Debug, Clone, PartialEq)]
#[diesel(table_name = crate::schema::tbl_line)]
pub struct LineRow {
    pub id: i64,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub is_split: bool,
    pub metadata: Value,
}

fn decode_index(id: i64, value: i64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| NetworkError::Decode {
        id,
        reason: format!("{} {} is negative", what, value),
    })
}

fn decode_metadata(id: i64, value: &Value) -> Result<Metadata> {
    Metadata::from_json(value).map_err(|reason| NetworkError::Decode { id, reason })
}

impl TryFrom<&Point> for PointRow {
    type Error = NetworkError;

    fn try_from(point: &Point) -> Result<Self> {
        Ok(PointRow {
            id: point.id.0 as i64,
            x: point.x,
            y: point.y,
            is_merged: point.is_merged,
            merged_into_id: point.merged_into.map(|target| target.0 as i64),
            metadata: point.metadata.to_json()?,
        })
    }
}

impl PointRow {
    pub fn into_point(self) -> Result<Point> {
        let id = decode_index(self.id, self.id, "point id")?;
        let merged_into = self
            .merged_into_id
            .map(|target| decode_index(self.id, target, "merge target").map(PointId))
            .transpose()?;
        Ok(Point {
            id: PointId(id),
            x: self.x,
            y: self.y,
            is_merged: self.is_merged,
            merged_into,
            metadata: decode_metadata(self.id, &self.metadata)?,
        })
    }
}

impl TryFrom<&Line> for LineRow {
    type Error = NetworkError;

    fn try_from(line: &Line) -> Result<Self> {
        Ok(LineRow {
            id: line.id.0 as i64,
            x1: line.x1,
            y1: line.y1,
            x2: line.x2,
            y2: line.y2,
            is_split: line.is_split,
            metadata: line.metadata.to_json()?,
        })
    }
}

impl LineRow {
    pub fn into_line(self) -> Result<Line> {
        let id = decode_index(self.id, self.id, "line id")?;
        let metadata = decode_metadata(self.id, &self.metadata)?;
        let mut line = Line::new(
            LineId(id),
            Coord { x: self.x1, y: self.y1 },
            Coord { x: self.x2, y: self.y2 },
            metadata,
        );
        line.is_split = self.is_split;
        Ok(line)
    }
}

// ===========================================================================
// Query predicates
// ===========================================================================

pub type PointPredicate = Box<dyn BoxableExpression<tbl_point::table, Pg, SqlType = Bool>>;
pub type LinePredicate = Box<dyn BoxableExpression<tbl_line::table, Pg, SqlType = Bool>>;

pub fn coord_matches(coord: Coord) -> PointPredicate {
    Box::new(tbl_point::x.eq(coord.x).and(tbl_point::y.eq(coord.y)))
}

/// Same as `coord_matches`, for a coordinate given as its canonical `"x,y"` string.
pub fn coord_key_matches(key: &str) -> Result<PointPredicate> {
    Ok(coord_matches(parse_coord_key(key)?))
}

pub fn active_points() -> PointPredicate {
    Box::new(tbl_point::is_merged.eq(false))
}

pub fn line_start_matches(coord: Coord) -> LinePredicate {
    Box::new(tbl_line::x1.eq(coord.x).and(tbl_line::y1.eq(coord.y)))
}

pub fn line_end_matches(coord: Coord) -> LinePredicate {
    Box::new(tbl_line::x2.eq(coord.x).and(tbl_line::y2.eq(coord.y)))
}

pub fn line_has_endpoint(coord: Coord) -> LinePredicate {
    Box::new(
        tbl_line::x1
            .eq(coord.x)
            .and(tbl_line::y1.eq(coord.y))
            .or(tbl_line::x2.eq(coord.x).and(tbl_line::y2.eq(coord.y))),
    )
}

pub fn active_lines() -> LinePredicate {
    Box::new(tbl_line::is_split.eq(false))
}

// ===========================================================================
// Repository contract
// ===========================================================================

/// Create/read/update of stored entities keyed by id. A database-backed implementation
/// wraps each `persist_changes` call in one transaction.
pub trait NetworkRepository {
    fn insert_point(&mut self, row: PointRow) -> Result<()>;
    fn update_point(&mut self, row: PointRow) -> Result<()>;
    fn insert_line(&mut self, row: LineRow) -> Result<()>;
    fn update_line(&mut self, row: LineRow) -> Result<()>;
    fn load_points(&self) -> Result<Vec<PointRow>>;
    fn load_lines(&self) -> Result<Vec<LineRow>>;
}

#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    points: BTreeMap<i64, PointRow>,
    lines: BTreeMap<i64, LineRow>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn point_rows(&self) -> impl Iterator<Item = &PointRow> {
        self.points.values()
    }

    pub fn line_rows(&self) -> impl Iterator<Item = &LineRow> {
        self.lines.values()
    }
}

impl NetworkRepository for MemoryRepository {
    fn insert_point(&mut self, row: PointRow) -> Result<()> {
        if self.points.contains_key(&row.id) {
            return Err(NetworkError::Persistence(format!("point {} already exists", row.id)));
        }
        self.points.insert(row.id, row);
        Ok(())
    }

    fn update_point(&mut self, row: PointRow) -> Result<()> {
        match self.points.get_mut(&row.id) {
            Some(existing) => {
                *existing = row;
                Ok(())
            }
            None => Err(NetworkError::Persistence(format!("point {} does not exist", row.id))),
        }
    }

    fn insert_line(&mut self, row: LineRow) -> Result<()> {
        if self.lines.contains_key(&row.id) {
            return Err(NetworkError::Persistence(format!("line {} already exists", row.id)));
        }
        self.lines.insert(row.id, row);
        Ok(())
    }

    fn update_line(&mut self, row: LineRow) -> Result<()> {
        match self.lines.get_mut(&row.id) {
            Some(existing) => {
                *existing = row;
                Ok(())
            }
            None => Err(NetworkError::Persistence(format!("line {} does not exist", row.id))),
        }
    }

    fn load_points(&self) -> Result<Vec<PointRow>> {
        Ok(self.points.values().cloned().collect())
    }

    fn load_lines(&self) -> Result<Vec<LineRow>> {
        Ok(self.lines.values().cloned().collect())
    }
}

impl NetworkStore {
    /// Push pending changes through `repo`. Changes stay pending if encoding or the repository fails.
    /// Every row is encoded before the first write.
    pub fn persist_changes<R: NetworkRepository + ?Sized>(&mut self, repo: &mut R) -> Result<ChangeSet> {
        let changes = self.changes().clone();

        let encode_points = |ids: &BTreeSet<PointId>| {
            ids.iter()
                .filter_map(|id| self.point(*id))
                .map(PointRow::try_from)
                .collect::<Result<Vec<PointRow>>>()
        };
        let encode_lines = |ids: &BTreeSet<LineId>| {
            ids.iter()
                .filter_map(|id| self.line(*id))
                .map(LineRow::try_from)
                .collect::<Result<Vec<LineRow>>>()
        };
        let created_points = encode_points(&changes.created_points)?;
        let updated_points = encode_points(&changes.updated_points)?;
        let created_lines = encode_lines(&changes.created_lines)?;
        let updated_lines = encode_lines(&changes.updated_lines)?;

        for row in created_points {
            repo.insert_point(row)?;
        }
        for row in updated_points {
            repo.update_point(row)?;
        }
        for row in created_lines {
            repo.insert_line(row)?;
        }
        for row in updated_lines {
            repo.update_line(row)?;
        }

        info!(
            "Persisted {} new and {} updated points, {} new and {} updated lines",
            changes.created_points.len(),
            changes.updated_points.len(),
            changes.created_lines.len(),
            changes.updated_lines.len()
        );
        Ok(self.take_changes())
    }
}

pub fn load_store<R: NetworkRepository + ?Sized>(repo: &R) -> Result<NetworkStore> {
    let mut point_rows = repo.load_points()?;
    let mut line_rows = repo.load_lines()?;
    point_rows.sort_by_key(|row| row.id);
    line_rows.sort_by_key(|row| row.id);

    let points = point_rows
        .into_iter()
        .map(PointRow::into_point)
        .collect::<Result<Vec<Point>>>()?;
    let lines = line_rows
        .into_iter()
        .map(LineRow::into_line)
        .collect::<Result<Vec<Line>>>()?;
    NetworkStore::load(points, lines)
}
