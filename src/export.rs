use crate::coord_conversion::coord_key;
use crate::metadata::Metadata;
use crate::models::{PathResult, Point, Line};
use crate::store::NetworkStore;
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use log::warn;
use serde_json::Value;

fn properties_for(kind: &str, key: String, metadata: &Metadata) -> JsonObject {
    let mut properties = match metadata.to_json() {
        Ok(Value::Object(map)) => map,
        Ok(_) => JsonObject::new(),
        Err(e) => {
            warn!("Exporting {} {} without properties: {}", kind, key, e);
            JsonObject::new()
        }
    };
    properties.insert(String::from("kind"), Value::String(kind.to_string()));
    properties.insert(String::from("key"), Value::String(key));
    properties
}

fn feature(value: geojson::Value, id: String, properties: JsonObject) -> Feature {
    geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry {
            bbox: None,
            value,
            foreign_members: None,
        }),
        id: Some(geojson::feature::Id::String(id)),
        properties: Some(properties),
        foreign_members: None,
    }
}

fn point_feature(point: &Point) -> Feature {
    let value = geojson::Value::from(&point.to_geo());
    feature(
        value,
        point.id.to_string(),
        properties_for("point", point.key(), &point.metadata),
    )
}

fn line_feature(line: &Line) -> Feature {
    let linestring = geo_types::LineString::from(vec![line.start(), line.end()]);
    let value = geojson::Value::from(&linestring);
    feature(
        value,
        line.id.to_string(),
        properties_for("line", line.key(), &line.metadata),
    )
}

/// Active points and lines as one feature collection, metadata copied into properties.
pub fn to_geojson(store: &NetworkStore) -> FeatureCollection {
    let features = store
        .active_points()
        .map(point_feature)
        .chain(store.active_lines().map(line_feature))
        .collect::<Vec<Feature>>();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub fn paths_to_geojson(paths: &[PathResult]) -> FeatureCollection {
    let features = paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let linestring = geo_types::LineString::from(path.path.clone());
            let mut properties = JsonObject::new();
            properties.insert(String::from("start"), Value::String(coord_key(path.start)));
            properties.insert(String::from("end"), Value::String(coord_key(path.end)));
            properties.insert(String::from("length"), Value::from(path.length));
            feature(
                geojson::Value::from(&linestring),
                format!("path-{}", i),
                properties,
            )
        })
        .collect::<Vec<Feature>>();

    FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

pub fn to_geojson_string(collection: FeatureCollection) -> String {
    GeoJson::from(collection).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Coord;

    fn c(x: f64, y: f64) -> Coord {
        Coord { x, y }
    }

    #[test]
    fn test_only_active_entities_exported() {
        let mut store = NetworkStore::new();
        store
            .create_point(0.0, 0.0, [("type", "terminal")].into_iter().collect())
            .unwrap();
        store
            .create_lines_from_coordinates(&[(c(0.0, 0.0), c(10.0, 0.0))], None)
            .unwrap();
        store.get_or_create_point(5.0, 0.0).unwrap();
        crate::split::split_lines_on_points(&mut store, 0.1).unwrap();

        let collection = to_geojson(&store);
        // 3 points, 2 sub-segments; the split original is left out
        assert_eq!(collection.features.len(), 5);

        let first = &collection.features[0];
        assert_eq!(
            first.property("type").and_then(|v| v.as_str()),
            Some("terminal")
        );
        assert_eq!(
            first.property("key").and_then(|v| v.as_str()),
            Some("0.000000,0.000000")
        );
        let serialized = to_geojson_string(collection);
        assert!(serialized.contains("\"LineString\""));
    }

    #[test]
    fn test_non_finite_metadata_drops_properties() {
        let mut store = NetworkStore::new();
        let id = store.get_or_create_point(1.0, 2.0).unwrap();
        let point = store.point_mut(id).unwrap();
        point.set_metadata("name", "depot");
        point.set_metadata("weight", f64::NAN);

        let collection = to_geojson(&store);
        let feature = &collection.features[0];
        assert!(feature.property("name").is_none());
        assert!(feature.property("weight").is_none());
        assert_eq!(
            feature.property("kind").and_then(|v| v.as_str()),
            Some("point")
        );
    }

    #[test]
    fn test_paths_export() {
        let path = PathResult {
            start: c(0.0, 0.0),
            end: c(2.0, 0.0),
            path: vec![c(0.0, 0.0), c(1.0, 1.0), c(2.0, 0.0)],
            length: 2,
            vertex_indices: vec![0, 1, 2],
        };
        let collection = paths_to_geojson(&[path]);
        assert_eq!(collection.features.len(), 1);
        assert_eq!(
            collection.features[0].property("length").and_then(|v| v.as_u64()),
            Some(2)
        );
    }
}
