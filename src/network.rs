// Copyright: Kyler Chin <kyler@catenarymaps.org>
// Catenary Transit Initiatives
// Attribution cannot be removed

use crate::config::EngineConfig;
use crate::endpoints::{VertexClass, classify};
use crate::errors::Result;
use crate::graph::NetworkGraph;
use crate::merge::merge_nearby_points;
use crate::metadata::{Metadata, MetadataFilter};
use crate::models::{Coord, Line, LineId, MergeRecord, PathResult, PointId};
use crate::paths::PathFinder;
use crate::split::split_lines_on_points;
use crate::store::{ChangeSet, NetworkStore};
use log::info;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizeReport {
    pub passes: usize,
    pub merges: Vec<MergeRecord>,
    pub created_lines: Vec<Line>,
    /// A pass finished with neither merges nor splits before `max_passes` ran out.
    pub converged: bool,
}

/// Owns the entity store and runs the pipeline stages against it.
///
/// Graph-derived queries rebuild the graph from the current store on every call, so
/// they always see the latest merges and splits.
#[derive(Debug, Clone, Default)]
pub struct NetworkGraphBuilder {
    store: NetworkStore,
    config: EngineConfig,
}

impl NetworkGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(NetworkGraphBuilder {
            store: NetworkStore::new(),
            config,
        })
    }

    pub fn from_store(store: NetworkStore, config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(NetworkGraphBuilder { store, config })
    }

    pub fn store(&self) -> &NetworkStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut NetworkStore {
        &mut self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_store(self) -> NetworkStore {
        self.store
    }

    pub fn get_or_create_point(&mut self, x: f64, y: f64) -> Result<PointId> {
        self.store.get_or_create_point(x, y)
    }

    pub fn create_point(&mut self, x: f64, y: f64, metadata: Metadata) -> Result<PointId> {
        self.store.create_point(x, y, metadata)
    }

    pub fn create_line(&mut self, p1: PointId, p2: PointId, metadata: Option<Metadata>) -> Result<LineId> {
        self.store.create_line(p1, p2, metadata)
    }

    pub fn create_lines_from_coordinates(
        &mut self,
        pairs: &[(Coord, Coord)],
        per_line_metadata: Option<&[Metadata]>,
    ) -> Result<Vec<LineId>> {
        self.store.create_lines_from_coordinates(pairs, per_line_metadata)
    }

    pub fn merge_nearby_points(&mut self, margin: f64) -> Result<Vec<MergeRecord>> {
        merge_nearby_points(&mut self.store, margin)
    }

    pub fn split_lines_on_points(&mut self, tolerance: f64) -> Result<Vec<Line>> {
        split_lines_on_points(&mut self.store, tolerance)
    }

    /// Alternate merge and split passes with the builder's margin and tolerance until a
    /// pass changes nothing or `max_passes` is reached.
    pub fn normalize(&mut self) -> Result<NormalizeReport> {
        let EngineConfig {
            margin,
            tolerance,
            max_passes,
            ..
        } = self.config;
        let mut report = NormalizeReport::default();

        while report.passes < max_passes {
            report.passes += 1;
            let merges = merge_nearby_points(&mut self.store, margin)?;
            let created = split_lines_on_points(&mut self.store, tolerance)?;
            let quiet = merges.is_empty() && created.is_empty();
            report.merges.extend(merges);
            report.created_lines.extend(created);
            if quiet {
                report.converged = true;
                break;
            }
        }

        info!(
            "Normalized network in {} passes: {} merges, {} lines created, converged={}",
            report.passes,
            report.merges.len(),
            report.created_lines.len(),
            report.converged
        );
        Ok(report)
    }

    pub fn build_graph(&self) -> NetworkGraph {
        NetworkGraph::from_store(&self.store, self.config.coord_precision)
    }

    pub fn classify(&self) -> Vec<(Coord, VertexClass)> {
        let graph = self.build_graph();
        classify(&graph)
            .into_iter()
            .zip(graph.vertices())
            .map(|(class, vertex)| (vertex.coord, class))
            .collect()
    }

    pub fn find_points_by_conditions(&self, filter: &MetadataFilter) -> Vec<Coord> {
        self.store.find_points_by_conditions(filter)
    }

    pub fn get_endpoint_pairs(&self) -> Vec<(Coord, Coord)> {
        let graph = self.build_graph();
        self.finder(&graph).get_endpoint_pairs()
    }

    pub fn get_paths_between_endpoints(
        &self,
        start: Coord,
        end: Coord,
        avoid_intermediate_filter: Option<&MetadataFilter>,
    ) -> Result<Vec<PathResult>> {
        let graph = self.build_graph();
        self.finder(&graph)
            .get_paths_between_endpoints(start, end, avoid_intermediate_filter)
    }

    pub fn get_all_endpoint_paths(&self, endpoint_filter: Option<&MetadataFilter>) -> Vec<PathResult> {
        let graph = self.build_graph();
        self.finder(&graph).get_all_endpoint_paths(endpoint_filter)
    }

    pub fn get_all_endpoint_paths_filtered(
        &self,
        start_filter: &MetadataFilter,
        end_filter: &MetadataFilter,
    ) -> Vec<PathResult> {
        let graph = self.build_graph();
        self.finder(&graph)
            .get_all_endpoint_paths_filtered(start_filter, end_filter)
    }

    pub fn get_paths_between_point_groups(
        &self,
        starts: &[Coord],
        ends: &[Coord],
        avoid_intermediate_filter: Option<&MetadataFilter>,
    ) -> Result<Vec<PathResult>> {
        let graph = self.build_graph();
        self.finder(&graph)
            .get_paths_between_point_groups(starts, ends, avoid_intermediate_filter)
    }

    pub fn take_changes(&mut self) -> ChangeSet {
        self.store.take_changes()
    }

    fn finder<'g>(&self, graph: &'g NetworkGraph) -> PathFinder<'g> {
        PathFinder::new(graph).with_warning_threshold(self.config.path_warning_vertices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn test_normalize_converges() {
        let mut builder = NetworkGraphBuilder::new();
        builder
            .create_lines_from_coordinates(
                &[
                    (c(0.0, 0.0), c(10.0, 0.0)),
                    // starts just off the first line's interior
                    (c(5.0, 0.04), c(5.0, 5.0)),
                    // end nearly touches the first line's end
                    (c(10.05, 0.0), c(15.0, 0.0)),
                ],
                None,
            )
            .unwrap();

        let report = builder.normalize().unwrap();
        assert!(report.converged);
        assert_eq!(report.merges.len(), 1);
        assert_eq!(report.created_lines.len(), 2);

        let classes = builder.classify();
        let junctions: Vec<Coord> = classes
            .iter()
            .filter(|(_, class)| *class == VertexClass::Junction)
            .map(|(coord, _)| *coord)
            .collect();
        assert_eq!(junctions, vec![c(5.0, 0.04)]);

        let again = builder.normalize().unwrap();
        assert_eq!(again.passes, 1);
        assert!(again.merges.is_empty() && again.created_lines.is_empty());
    }

    #[test]
    fn test_normalize_respects_pass_limit() {
        let mut builder = NetworkGraphBuilder::with_config(EngineConfig {
            max_passes: 1,
            ..EngineConfig::default()
        })
        .unwrap();
        builder
            .create_lines_from_coordinates(&[(c(0.0, 0.0), c(10.0, 0.0))], None)
            .unwrap();
        builder.get_or_create_point(4.0, 0.0).unwrap();

        let report = builder.normalize().unwrap();
        assert_eq!(report.passes, 1);
        assert!(!report.converged);
    }

    #[test]
    fn test_normalize_uses_builder_margin() {
        let pairs = [(c(0.0, 0.0), c(5.0, 0.0)), (c(5.3, 0.0), c(9.0, 0.0))];

        let mut narrow = NetworkGraphBuilder::new();
        narrow.create_lines_from_coordinates(&pairs, None).unwrap();
        assert!(narrow.normalize().unwrap().merges.is_empty());

        let mut wide = NetworkGraphBuilder::with_config(EngineConfig::default().with_margin(0.5)).unwrap();
        wide.create_lines_from_coordinates(&pairs, None).unwrap();
        assert_eq!(wide.normalize().unwrap().merges.len(), 1);
    }

    #[test]
    fn test_with_config_validates() {
        assert!(NetworkGraphBuilder::with_config(EngineConfig::default().with_margin(0.0)).is_err());
        let builder = NetworkGraphBuilder::with_config(EngineConfig::default()).unwrap();
        assert_eq!(builder.config().coord_precision, 6);
    }
}
