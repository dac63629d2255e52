//! Simple-path enumeration between terminal vertices.
//!
//! Enumeration is exhaustive and grows exponentially with the number of alternate
//! routes. It suits sparse, mostly tree-like networks; callers bound cost by
//! restricting the graph or by filtering endpoints.

use crate::coord_conversion::coord_key;
use crate::endpoints::terminal_vertices;
use crate::errors::{NetworkError, Result};
use crate::graph::{NetworkGraph, PetgraphTopology, Topology};
use crate::metadata::MetadataFilter;
use crate::models::{Coord, PathResult};
use itertools::Itertools;
use log::{debug, info, warn};

pub const DEFAULT_WARNING_VERTICES: usize = 5000;

pub struct PathFinder<'g, T: Topology = PetgraphTopology> {
    graph: &'g NetworkGraph<T>,
    warning_vertices: usize,
}

impl<'g, T: Topology> PathFinder<'g, T> {
    pub fn new(graph: &'g NetworkGraph<T>) -> Self {
        PathFinder {
            graph,
            warning_vertices: DEFAULT_WARNING_VERTICES,
        }
    }

    pub fn with_warning_threshold(mut self, vertices: usize) -> Self {
        self.warning_vertices = vertices;
        self
    }

    /// Every unordered pair of degree-1 vertices, in vertex order.
    pub fn get_endpoint_pairs(&self) -> Vec<(Coord, Coord)> {
        terminal_vertices(self.graph)
            .into_iter()
            .tuple_combinations()
            .map(|(a, b)| (self.coord_of(a), self.coord_of(b)))
            .collect()
    }

    pub fn get_paths_between_endpoints(
        &self,
        start: Coord,
        end: Coord,
        avoid_intermediate_filter: Option<&MetadataFilter>,
    ) -> Result<Vec<PathResult>> {
        let from = self.resolve(start)?;
        let to = self.resolve(end)?;
        self.warn_if_large();
        Ok(self.paths_between(from, to, avoid_intermediate_filter))
    }

    /// Paths between every endpoint pair, optionally restricted to endpoints matching `endpoint_filter`.
    pub fn get_all_endpoint_paths(&self, endpoint_filter: Option<&MetadataFilter>) -> Vec<PathResult> {
        self.warn_if_large();
        let endpoint_filter = endpoint_filter.filter(|f| !f.is_empty());
        let terminals: Vec<usize> = terminal_vertices(self.graph)
            .into_iter()
            .filter(|v| endpoint_filter.is_none_or(|f| self.vertex_matches(*v, f)))
            .collect();

        let results: Vec<PathResult> = terminals
            .iter()
            .tuple_combinations()
            .flat_map(|(a, b)| self.paths_between(*a, *b, None))
            .collect();

        info!(
            "Found {} paths between {} endpoints",
            results.len(),
            terminals.len()
        );
        results
    }

    /// Starts are terminals matching `start_filter` but not `end_filter`. Ends are connected
    /// vertices matching `end_filter`, and no path passes through another end vertex.
    /// An empty `end_filter` falls back to plain endpoint pairs restricted by `start_filter`.
    pub fn get_all_endpoint_paths_filtered(
        &self,
        start_filter: &MetadataFilter,
        end_filter: &MetadataFilter,
    ) -> Vec<PathResult> {
        if end_filter.is_empty() {
            return self.get_all_endpoint_paths(Some(start_filter));
        }
        self.warn_if_large();

        let starts: Vec<usize> = terminal_vertices(self.graph)
            .into_iter()
            .filter(|v| self.vertex_matches(*v, start_filter) && !self.vertex_matches(*v, end_filter))
            .collect();
        let ends: Vec<usize> = (0..self.graph.vertex_count())
            .filter(|v| self.graph.degree(*v) >= 1 && self.vertex_matches(*v, end_filter))
            .collect();
        debug!("{} start candidates, {} end candidates", starts.len(), ends.len());

        let results: Vec<PathResult> = starts
            .iter()
            .cartesian_product(ends.iter())
            .flat_map(|(s, e)| self.paths_between(*s, *e, Some(end_filter)))
            .collect();

        info!("Found {} filtered endpoint paths", results.len());
        results
    }

    /// Paths for every (start, end) pair drawn from two coordinate groups. Identical pairs are skipped.
    pub fn get_paths_between_point_groups(
        &self,
        starts: &[Coord],
        ends: &[Coord],
        avoid_intermediate_filter: Option<&MetadataFilter>,
    ) -> Result<Vec<PathResult>> {
        let starts = starts
            .iter()
            .map(|c| self.resolve(*c))
            .collect::<Result<Vec<usize>>>()?;
        let ends = ends
            .iter()
            .map(|c| self.resolve(*c))
            .collect::<Result<Vec<usize>>>()?;
        self.warn_if_large();

        let results: Vec<PathResult> = starts
            .iter()
            .cartesian_product(ends.iter())
            .flat_map(|(s, e)| self.paths_between(*s, *e, avoid_intermediate_filter))
            .collect();

        info!(
            "Found {} paths between {} starts and {} ends",
            results.len(),
            starts.len(),
            ends.len()
        );
        Ok(results)
    }

    fn paths_between(
        &self,
        from: usize,
        to: usize,
        avoid: Option<&MetadataFilter>,
    ) -> Vec<PathResult> {
        if from == to {
            return Vec::new();
        }
        let avoid = avoid.filter(|f| !f.is_empty());

        let mut sequences: Vec<Vec<usize>> = self
            .graph
            .all_simple_paths(from, to)
            .filter(|path| {
                let Some(filter) = avoid else {
                    return true;
                };
                let interior = &path[1..path.len().saturating_sub(1)];
                !interior.iter().any(|v| self.vertex_matches(*v, filter))
            })
            .collect();
        // parallel edges produce the same vertex sequence more than once
        sequences.sort();
        sequences.dedup();

        sequences
            .into_iter()
            .map(|vertex_indices| PathResult {
                start: self.coord_of(from),
                end: self.coord_of(to),
                path: vertex_indices.iter().map(|v| self.coord_of(*v)).collect(),
                length: vertex_indices.len().saturating_sub(1),
                vertex_indices,
            })
            .collect()
    }

    fn resolve(&self, coord: Coord) -> Result<usize> {
        self.graph
            .vertex_index(coord)
            .ok_or_else(|| NetworkError::NotFound {
                coord: coord_key(coord),
            })
    }

    fn coord_of(&self, vertex: usize) -> Coord {
        self.graph
            .vertex(vertex)
            .map(|v| v.coord)
            .unwrap_or(Coord { x: f64::NAN, y: f64::NAN })
    }

    fn vertex_matches(&self, vertex: usize, filter: &MetadataFilter) -> bool {
        self.graph
            .vertex(vertex)
            .is_some_and(|v| filter.matches(&v.metadata))
    }

    fn warn_if_large(&self) {
        if self.graph.vertex_count() >= self.warning_vertices {
            warn!(
                "Enumerating simple paths over {} vertices; cost is exponential in alternate routes",
                self.graph.vertex_count()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{AdjacencyTopology, build_graph};
    use crate::store::NetworkStore;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn test_two_segment_scenario() {
        let mut store = NetworkStore::new();
        store
            .create_lines_from_coordinates(&[(c(0.0, 0.0), c(1.0, 1.0)), (c(1.0, 1.0), c(2.0, 0.0))], None)
            .unwrap();
        let graph = build_graph(&store, 6);
        let finder = PathFinder::new(&graph);

        assert_eq!(finder.get_endpoint_pairs(), vec![(c(0.0, 0.0), c(2.0, 0.0))]);

        let paths = finder
            .get_paths_between_endpoints(c(0.0, 0.0), c(2.0, 0.0), None)
            .unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].length, 2);
        assert_eq!(paths[0].path, vec![c(0.0, 0.0), c(1.0, 1.0), c(2.0, 0.0)]);
        assert_eq!(paths[0].vertex_indices, vec![0, 1, 2]);

        assert!(
            finder
                .get_paths_between_endpoints(c(0.0, 0.0), c(0.0, 0.0), None)
                .unwrap()
                .is_empty()
        );
        assert!(matches!(
            finder.get_paths_between_endpoints(c(0.0, 0.0), c(7.0, 7.0), None),
            Err(NetworkError::NotFound { .. })
        ));
    }

    /// Two routes from A to D, one of them through a flagged point.
    fn diamond() -> NetworkStore {
        let mut store = NetworkStore::new();
        store
            .create_lines_from_coordinates(
                &[
                    (c(0.0, 0.0), c(1.0, 0.0)),
                    (c(1.0, 0.0), c(2.0, 1.0)),
                    (c(1.0, 0.0), c(2.0, -1.0)),
                    (c(2.0, 1.0), c(3.0, 0.0)),
                    (c(2.0, -1.0), c(3.0, 0.0)),
                    (c(3.0, 0.0), c(4.0, 0.0)),
                ],
                None,
            )
            .unwrap();
        let flagged = store.lookup(c(2.0, 1.0)).unwrap();
        store.point_mut(flagged).unwrap().set_metadata("is_end", true);
        store
    }

    #[test]
    fn test_avoid_filter_excludes_flagged_intermediates() {
        let store = diamond();
        let graph = build_graph(&store, 6);
        let finder = PathFinder::new(&graph);

        let all = finder
            .get_paths_between_endpoints(c(0.0, 0.0), c(4.0, 0.0), None)
            .unwrap();
        assert_eq!(all.len(), 2);

        let avoid = MetadataFilter::new().with("is_end", true);
        let filtered = finder
            .get_paths_between_endpoints(c(0.0, 0.0), c(4.0, 0.0), Some(&avoid))
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert!(!filtered[0].path.contains(&c(2.0, 1.0)));

        // the flagged point may still be a path end
        let flagged = graph.vertex_index(c(2.0, 1.0)).unwrap();
        let to_flagged = finder
            .get_paths_between_endpoints(c(0.0, 0.0), c(2.0, 1.0), Some(&avoid))
            .unwrap();
        assert_eq!(to_flagged.len(), 2);
        assert!(to_flagged.iter().all(|p| p.vertex_indices.last() == Some(&flagged)));
    }

    #[test]
    fn test_parallel_lines_yield_one_path() {
        let mut store = NetworkStore::new();
        store
            .create_lines_from_coordinates(
                &[
                    (c(0.0, 0.0), c(1.0, 0.0)),
                    (c(1.0, 0.0), c(0.0, 0.0)),
                    (c(1.0, 0.0), c(2.0, 0.0)),
                ],
                None,
            )
            .unwrap();
        let petgraph = build_graph(&store, 6);
        let adjacency: NetworkGraph<AdjacencyTopology> = NetworkGraph::from_store(&store, 6);

        let a = PathFinder::new(&petgraph)
            .get_paths_between_endpoints(c(0.0, 0.0), c(2.0, 0.0), None)
            .unwrap();
        let b = PathFinder::new(&adjacency)
            .get_paths_between_endpoints(c(0.0, 0.0), c(2.0, 0.0), None)
            .unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_all_endpoint_paths_with_filter() {
        let mut store = NetworkStore::new();
        store
            .create_lines_from_coordinates(
                &[
                    (c(0.0, 0.0), c(1.0, 0.0)),
                    (c(1.0, 0.0), c(2.0, 0.0)),
                    (c(1.0, 0.0), c(1.0, 1.0)),
                ],
                None,
            )
            .unwrap();
        for coord in [c(0.0, 0.0), c(2.0, 0.0)] {
            let id = store.lookup(coord).unwrap();
            store.point_mut(id).unwrap().set_metadata("type", "terminal");
        }
        let graph = build_graph(&store, 6);
        let finder = PathFinder::new(&graph);

        assert_eq!(finder.get_endpoint_pairs().len(), 3);
        assert_eq!(finder.get_all_endpoint_paths(None).len(), 3);

        let terminals = MetadataFilter::new().with("type", "terminal");
        let filtered = finder.get_all_endpoint_paths(Some(&terminals));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].start, c(0.0, 0.0));
        assert_eq!(filtered[0].end, c(2.0, 0.0));
    }

    #[test]
    fn test_start_end_filters() {
        let store = diamond();
        let graph = build_graph(&store, 6);
        let finder = PathFinder::new(&graph).with_warning_threshold(1);

        let end_filter = MetadataFilter::new().with("is_end", true);
        let paths = finder.get_all_endpoint_paths_filtered(&MetadataFilter::new(), &end_filter);
        // two routes to the flagged point from each of (0,0) and (4,0)
        assert_eq!(paths.len(), 4);
        assert!(paths.iter().all(|p| p.end == c(2.0, 1.0)));
        assert_eq!(paths.iter().filter(|p| p.start == c(4.0, 0.0)).count(), 2);

        let unmatched = finder.get_all_endpoint_paths_filtered(
            &MetadataFilter::new().with("type", "depot"),
            &end_filter,
        );
        assert!(unmatched.is_empty(), "no start point is a depot");
    }

    #[test]
    fn test_point_groups() {
        let store = diamond();
        let graph = build_graph(&store, 6);
        let finder = PathFinder::new(&graph);

        let paths = finder
            .get_paths_between_point_groups(
                &[c(0.0, 0.0), c(4.0, 0.0)],
                &[c(4.0, 0.0), c(3.0, 0.0)],
                None,
            )
            .unwrap();
        // 0->4: 2, 0->3: 2, 4->4: skipped, 4->3: 1
        assert_eq!(paths.len(), 5);
        assert!(
            finder
                .get_paths_between_point_groups(&[c(9.0, 9.0)], &[c(0.0, 0.0)], None)
                .is_err()
        );
    }
}
