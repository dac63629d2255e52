// ===========================================================================
// Canonical coordinate strings (vertex names and stored-expression keys)
// ===========================================================================
use crate::errors::{Result, validation_err};
use crate::models::Coord;

pub const DEFAULT_PRECISION: usize = 6;

/// Render a coordinate as `"x,y"` with a fixed number of decimals.
pub fn coord_key(coord: Coord) -> String {
    coord_key_with_precision(coord, DEFAULT_PRECISION)
}

pub fn coord_key_with_precision(coord: Coord, precision: usize) -> String {
    // -0.0 would render as "-0.000000" and split one location into two names
    let x = if coord.x == 0.0 { 0.0 } else { coord.x };
    let y = if coord.y == 0.0 { 0.0 } else { coord.y };
    format!("{:.*},{:.*}", precision, x, precision, y)
}

/// Render a line as `"x1,y1|x2,y2"`.
pub fn line_key(start: Coord, end: Coord) -> String {
    format!("{}|{}", coord_key(start), coord_key(end))
}

pub fn parse_coord_key(key: &str) -> Result<Coord> {
    let (x, y) = key
        .split_once(',')
        .ok_or_else(|| validation_err!("coordinate key '{}' is not 'x,y'", key))?;
    let x: f64 = x
        .trim()
        .parse()
        .map_err(|_| validation_err!("bad x component in coordinate key '{}'", key))?;
    let y: f64 = y
        .trim()
        .parse()
        .map_err(|_| validation_err!("bad y component in coordinate key '{}'", key))?;
    Ok(Coord { x, y })
}

pub fn parse_line_key(key: &str) -> Result<(Coord, Coord)> {
    let (start, end) = key
        .split_once('|')
        .ok_or_else(|| validation_err!("line key '{}' is not 'x1,y1|x2,y2'", key))?;
    Ok((parse_coord_key(start)?, parse_coord_key(end)?))
}
