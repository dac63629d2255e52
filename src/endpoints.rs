use crate::coord_conversion::coord_key;
use crate::errors::{NetworkError, Result};
use crate::graph::{NetworkGraph, Topology};
use crate::models::Coord;
use serde::Serialize;

/// Role of a vertex, derived from its degree in the current graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VertexClass {
    Isolated,
    Terminal,
    Continuation,
    Junction,
}

impl VertexClass {
    pub fn from_degree(degree: usize) -> Self {
        match degree {
            0 => VertexClass::Isolated,
            1 => VertexClass::Terminal,
            2 => VertexClass::Continuation,
            _ => VertexClass::Junction,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VertexClass::Terminal)
    }
}

/// One entry per vertex, in vertex order.
pub fn classify<T: Topology>(graph: &NetworkGraph<T>) -> Vec<VertexClass> {
    (0..graph.vertex_count())
        .map(|v| VertexClass::from_degree(graph.degree(v)))
        .collect()
}

pub fn terminal_vertices<T: Topology>(graph: &NetworkGraph<T>) -> Vec<usize> {
    (0..graph.vertex_count())
        .filter(|v| graph.degree(*v) == 1)
        .collect()
}

pub fn class_of<T: Topology>(graph: &NetworkGraph<T>, coord: Coord) -> Result<VertexClass> {
    let index = graph.vertex_index(coord).ok_or_else(|| NetworkError::NotFound {
        coord: coord_key(coord),
    })?;
    Ok(VertexClass::from_degree(graph.degree(index)))
}
