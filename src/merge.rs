use crate::errors::{Result, ensure_positive_distance};
use crate::metadata::Metadata;
use crate::models::{Coord, CoordKey, MergeRecord, PointId, exact_key};
use crate::spatial_index::{PointIndex, QueryShape};
use crate::store::NetworkStore;
use ahash::{AHashMap, AHashSet};
use log::{debug, info};

struct MergeGroup {
    target: PointId,
    sources: Vec<PointId>,
    metadata: Metadata,
}

/// Fold every active point into the lowest-id active point within `margin` of it.
///
/// Groups are formed greedily in ascending id order and are not re-evaluated within
/// the call, so a second call with the same margin finds nothing to merge.
/// All metadata merges are computed before anything is mutated: a conflicting key
/// fails the whole call and leaves the store untouched.
pub fn merge_nearby_points(store: &mut NetworkStore, margin: f64) -> Result<Vec<MergeRecord>> {
    ensure_positive_distance("margin", margin)?;

    let index = PointIndex::build(store);
    let groups = plan_groups(store, &index, margin)?;

    let mut moves: AHashMap<CoordKey, Coord> = AHashMap::new();
    let mut records = Vec::new();

    for group in groups {
        let target_coord = match store.point(group.target) {
            Some(point) => point.coord(),
            None => continue,
        };
        for source in &group.sources {
            if let Some(point) = store.point(*source) {
                moves.insert(exact_key(point.coord()), target_coord);
            }
            store.mark_merged(*source, group.target, group.metadata.clone());
            debug!("Merged point {} into {}", source, group.target);
            records.push(MergeRecord {
                source: *source,
                target: group.target,
            });
        }
    }

    let rewritten = store.rewrite_endpoints(&moves);

    info!(
        "Merged {} points within margin {} ({} lines rewritten, {} active points remain)",
        records.len(),
        margin,
        rewritten,
        store.active_point_count()
    );

    Ok(records)
}

fn plan_groups(store: &NetworkStore, index: &PointIndex, margin: f64) -> Result<Vec<MergeGroup>> {
    let mut processed: AHashSet<PointId> = AHashSet::new();
    let mut groups = Vec::new();

    for point in store.active_points() {
        if processed.contains(&point.id) {
            continue;
        }

        // BTreeSet order puts the lowest id first
        let members: Vec<PointId> = index
            .query_within(QueryShape::Point(point.coord()), margin)
            .into_iter()
            .filter(|id| *id == point.id || !processed.contains(id))
            .collect();

        processed.extend(members.iter().copied());
        processed.insert(point.id);

        let Some((&target, sources)) = members.split_first() else {
            continue;
        };
        if sources.is_empty() {
            continue;
        }

        let mut metadata = store
            .point(target)
            .map(|p| p.metadata.clone())
            .unwrap_or_default();
        for source in sources {
            if let Some(source_point) = store.point(*source) {
                metadata = metadata.merged_with(&source_point.metadata)?;
            }
        }

        groups.push(MergeGroup {
            target,
            sources: sources.to_vec(),
            metadata,
        });
    }

    Ok(groups)
}
