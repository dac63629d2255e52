use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use trellis::metadata::Metadata;
use trellis::models::Coord;
use trellis::network::NetworkGraphBuilder;

#[derive(Debug, Deserialize)]
pub struct PointInput {
    pub coord: [f64; 2],
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Deserialize)]
pub struct LineInput {
    pub start: [f64; 2],
    pub end: [f64; 2],
    #[serde(default)]
    pub metadata: Metadata,
}

/// On-disk network description: optional annotated points, then the line segments.
#[derive(Debug, Deserialize)]
pub struct NetworkInput {
    #[serde(default)]
    pub points: Vec<PointInput>,
    pub lines: Vec<LineInput>,
}

fn to_coord([x, y]: [f64; 2]) -> Coord {
    Coord { x, y }
}

impl NetworkInput {
    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading network file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing network file {}", path.display()))
    }

    /// Points first so their metadata is in place when lines attach to them.
    pub fn load_into(self, builder: &mut NetworkGraphBuilder) -> Result<()> {
        for point in self.points {
            let [x, y] = point.coord;
            builder.create_point(x, y, point.metadata)?;
        }

        let (pairs, metadata): (Vec<(Coord, Coord)>, Vec<Metadata>) = self
            .lines
            .into_iter()
            .map(|line| ((to_coord(line.start), to_coord(line.end)), line.metadata))
            .unzip();
        builder.create_lines_from_coordinates(&pairs, Some(metadata.as_slice()))?;
        Ok(())
    }
}
