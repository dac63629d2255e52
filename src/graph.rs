//! Undirected graph over the active network.
//!
//! Vertex and edge payloads live here; adjacency, degree and simple-path enumeration
//! are delegated to a [`Topology`] so the graph library can be swapped.

use crate::coord_conversion::coord_key_with_precision;
use crate::metadata::Metadata;
use crate::models::{Coord, CoordKey, LineId, PointId, exact_key};
use crate::store::NetworkStore;
use ahash::{AHashMap, AHashSet};
use log::{debug, info, warn};
use petgraph::algo::all_simple_paths;
use petgraph::graph::{NodeIndex, UnGraph};

pub trait Topology {
    fn build(vertex_count: usize, edges: &[(usize, usize)]) -> Self
    where
        Self: Sized;

    fn degree(&self, vertex: usize) -> usize;

    /// Every path from `start` to `end` that repeats no vertex, as vertex index sequences.
    fn all_simple_paths(
        &self,
        start: usize,
        end: usize,
    ) -> Box<dyn Iterator<Item = Vec<usize>> + '_>;
}

pub struct PetgraphTopology {
    graph: UnGraph<(), ()>,
}

impl Topology for PetgraphTopology {
    fn build(vertex_count: usize, edges: &[(usize, usize)]) -> Self {
        let mut graph = UnGraph::with_capacity(vertex_count, edges.len());
        for _ in 0..vertex_count {
            graph.add_node(());
        }
        for (a, b) in edges {
            graph.add_edge(NodeIndex::new(*a), NodeIndex::new(*b), ());
        }
        PetgraphTopology { graph }
    }

    fn degree(&self, vertex: usize) -> usize {
        self.graph.edges(NodeIndex::new(vertex)).count()
    }

    fn all_simple_paths(
        &self,
        start: usize,
        end: usize,
    ) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        let paths = all_simple_paths::<Vec<NodeIndex>, _>(
            &self.graph,
            NodeIndex::new(start),
            NodeIndex::new(end),
            0,
            None,
        );
        Box::new(paths.map(|path| path.into_iter().map(|n| n.index()).collect()))
    }
}

/// Plain adjacency lists with an iterative depth-first walk.
pub struct AdjacencyTopology {
    adjacency: Vec<Vec<usize>>,
}

impl Topology for AdjacencyTopology {
    fn build(vertex_count: usize, edges: &[(usize, usize)]) -> Self {
        let mut adjacency = vec![Vec::new(); vertex_count];
        for (a, b) in edges {
            adjacency[*a].push(*b);
            if a != b {
                adjacency[*b].push(*a);
            }
        }
        AdjacencyTopology { adjacency }
    }

    fn degree(&self, vertex: usize) -> usize {
        self.adjacency.get(vertex).map_or(0, Vec::len)
    }

    fn all_simple_paths(
        &self,
        start: usize,
        end: usize,
    ) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        Box::new(SimplePaths::new(&self.adjacency, start, end))
    }
}

struct SimplePaths<'a> {
    adjacency: &'a [Vec<usize>],
    target: usize,
    path: Vec<usize>,
    on_path: Vec<bool>,
    // next neighbor position to try, one cursor per vertex on `path`
    cursors: Vec<usize>,
}

impl<'a> SimplePaths<'a> {
    fn new(adjacency: &'a [Vec<usize>], start: usize, target: usize) -> Self {
        let mut on_path = vec![false; adjacency.len()];
        let (path, cursors) = if start == target || start >= adjacency.len() {
            (Vec::new(), Vec::new())
        } else {
            on_path[start] = true;
            (vec![start], vec![0])
        };
        SimplePaths {
            adjacency,
            target,
            path,
            on_path,
            cursors,
        }
    }
}

impl Iterator for SimplePaths<'_> {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Vec<usize>> {
        loop {
            let node = *self.path.last()?;
            let cursor = self.cursors.last_mut()?;
            match self.adjacency[node].get(*cursor) {
                None => {
                    self.cursors.pop();
                    self.path.pop();
                    self.on_path[node] = false;
                }
                Some(&next) => {
                    *cursor += 1;
                    if next == self.target {
                        let mut found = self.path.clone();
                        found.push(next);
                        return Some(found);
                    }
                    if !self.on_path[next] {
                        self.on_path[next] = true;
                        self.path.push(next);
                        self.cursors.push(0);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Canonical coordinate string
    pub name: String,
    pub point: PointId,
    pub coord: Coord,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    pub line: LineId,
    pub source: usize,
    pub target: usize,
    pub metadata: Metadata,
}

pub struct NetworkGraph<T: Topology = PetgraphTopology> {
    vertices: Vec<Vertex>,
    edges: Vec<Edge>,
    by_key: AHashMap<CoordKey, usize>,
    by_name: AHashMap<String, usize>,
    ambiguous_names: AHashSet<String>,
    precision: usize,
    topology: T,
}

impl<T: Topology> NetworkGraph<T> {
    /// Vertices follow point creation order, edges follow line creation order.
    pub fn from_store(store: &NetworkStore, precision: usize) -> Self {
        let mut vertices = Vec::new();
        let mut by_key = AHashMap::new();
        let mut by_name = AHashMap::new();
        let mut ambiguous_names = AHashSet::new();

        for point in store.active_points() {
            let index = vertices.len();
            let name = coord_key_with_precision(point.coord(), precision);
            by_key.insert(exact_key(point.coord()), index);
            if let Some(previous) = by_name.insert(name.clone(), index) {
                warn!(
                    "Vertex name {} is shared by vertices {} and {}; name lookups for it fail",
                    name, previous, index
                );
                ambiguous_names.insert(name.clone());
            }
            vertices.push(Vertex {
                name,
                point: point.id,
                coord: point.coord(),
                metadata: point.metadata.clone(),
            });
        }

        let mut edges = Vec::new();
        for line in store.active_lines() {
            let (start, end) = line.coords();
            let (Some(&source), Some(&target)) =
                (by_key.get(&exact_key(start)), by_key.get(&exact_key(end)))
            else {
                warn!("Line {} has an endpoint with no active point, skipping", line.id);
                continue;
            };
            if source == target {
                debug!("Line {} collapsed onto a single vertex, skipping", line.id);
                continue;
            }
            edges.push(Edge {
                line: line.id,
                source,
                target,
                metadata: line.metadata.clone(),
            });
        }

        let pairs: Vec<(usize, usize)> = edges.iter().map(|e| (e.source, e.target)).collect();
        let topology = T::build(vertices.len(), &pairs);

        info!(
            "Built graph with {} vertices and {} edges",
            vertices.len(),
            edges.len()
        );

        NetworkGraph {
            vertices,
            edges,
            by_key,
            by_name,
            ambiguous_names,
            precision,
            topology,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn vertex(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    /// Exact coordinate first, then the canonical name for coordinates that went
    /// through a string round trip.
    pub fn vertex_index(&self, coord: Coord) -> Option<usize> {
        self.by_key
            .get(&exact_key(coord))
            .copied()
            .or_else(|| self.vertex_index_by_name(&coord_key_with_precision(coord, self.precision)))
    }

    /// `None` when no vertex has this name, or when several active points round to it.
    pub fn vertex_index_by_name(&self, name: &str) -> Option<usize> {
        if self.ambiguous_names.contains(name) {
            return None;
        }
        self.by_name.get(name).copied()
    }

    pub fn is_ambiguous_name(&self, name: &str) -> bool {
        self.ambiguous_names.contains(name)
    }

    pub fn degree(&self, index: usize) -> usize {
        if index >= self.vertices.len() {
            return 0;
        }
        self.topology.degree(index)
    }

    pub fn all_simple_paths(
        &self,
        start: usize,
        end: usize,
    ) -> Box<dyn Iterator<Item = Vec<usize>> + '_> {
        if start == end || start >= self.vertices.len() || end >= self.vertices.len() {
            return Box::new(std::iter::empty());
        }
        self.topology.all_simple_paths(start, end)
    }

    pub fn topology(&self) -> &T {
        &self.topology
    }
}

pub fn build_graph(store: &NetworkStore, precision: usize) -> NetworkGraph {
    NetworkGraph::from_store(store, precision)
}
