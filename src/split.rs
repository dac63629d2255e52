use crate::errors::{Result, ensure_positive_distance};
use crate::models::{Coord, Line, LineId, PointId};
use crate::spatial_index::{PointIndex, QueryShape};
use crate::store::NetworkStore;
use log::{debug, info};
use ordered_float::OrderedFloat;

/// Position of a point along a segment, measured from `start`, and its perpendicular offset.
/// `None` for a zero-length segment.
pub fn project_onto_segment(start: Coord, end: Coord, point: Coord) -> Option<(f64, f64)> {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length = dx.hypot(dy);
    if length == 0.0 {
        return None;
    }
    let px = point.x - start.x;
    let py = point.y - start.y;
    let along = (px * dx + py * dy) / length;
    let offset = (px * dy - py * dx).abs() / length;
    Some((along, offset))
}

/// Split every active line at the active points lying on its interior within `tolerance`.
///
/// Works from one index snapshot taken at the start of the call. Lines created here are
/// not examined again until the next call. Returns the newly created sub-segments.
pub fn split_lines_on_points(store: &mut NetworkStore, tolerance: f64) -> Result<Vec<Line>> {
    ensure_positive_distance("tolerance", tolerance)?;

    let index = PointIndex::build(store);
    let line_ids: Vec<LineId> = store.active_lines().map(|l| l.id).collect();

    let mut plans: Vec<(LineId, Vec<Coord>)> = Vec::new();
    for line_id in line_ids {
        let Some(line) = store.line(line_id) else {
            continue;
        };
        if line.is_degenerate() {
            debug!("Skipping zero-length line {}", line.id);
            continue;
        }
        let (start, end) = line.coords();
        let length = line.length();

        let mut accepted: Vec<(OrderedFloat<f64>, PointId, Coord)> = index
            .query_within(QueryShape::Segment(start, end), tolerance)
            .into_iter()
            .filter_map(|id| store.point(id))
            .map(|p| (p.id, p.coord()))
            .filter(|(_, coord)| *coord != start && *coord != end)
            .filter_map(|(id, coord)| {
                let (along, offset) = project_onto_segment(start, end, coord)?;
                (along >= 0.0 && along <= length && offset <= tolerance)
                    .then_some((OrderedFloat(along), id, coord))
            })
            .collect();

        if accepted.is_empty() {
            continue;
        }
        accepted.sort_by_key(|(along, id, _)| (*along, *id));

        let mut chain = Vec::with_capacity(accepted.len() + 2);
        chain.push(start);
        chain.extend(accepted.into_iter().map(|(_, _, coord)| coord));
        chain.push(end);
        plans.push((line_id, chain));
    }

    let mut created = Vec::new();
    for (line_id, chain) in plans {
        let metadata = match store.line(line_id) {
            Some(line) => line.metadata.clone(),
            None => continue,
        };
        for pair in chain.windows(2) {
            let new_id = store.push_line(pair[0], pair[1], metadata.clone());
            if let Some(line) = store.line(new_id) {
                created.push(line.clone());
            }
        }
        store.mark_split(line_id);
        debug!(
            "Split line {} at {} points into {} segments",
            line_id,
            chain.len() - 2,
            chain.len() - 1
        );
    }

    info!(
        "Split pass with tolerance {} created {} lines ({} active lines)",
        tolerance,
        created.len(),
        store.active_line_count()
    );

    Ok(created)
}
