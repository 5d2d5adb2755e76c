//! Geometry conversion between GeoJSON, WKT, and the crate-native geometry type.
//!
//! Feature geometries arrive as GeoJSON objects inside the features payload.
//! They are converted to Well-Known Text and parsed back into [`Geometry`],
//! the representation the layer store consumes. The WKT intermediate keeps
//! the conversion auditable and lets hosts that speak WKT natively plug in
//! at either side of the pipeline.
//!
//! Conversion failures are per-feature, recoverable errors: the materializer
//! logs and skips the offending feature rather than aborting the load.

use serde_json::Value;
use std::fmt::Write as _;
use thiserror::Error;

use crate::extent::Extent;

/// A coordinate pair (x, y). Altitude values present in GeoJSON are dropped.
pub type Position = (f64, f64);

/// Errors produced while converting or parsing geometries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    /// The value is not a GeoJSON geometry object.
    #[error("not a GeoJSON geometry object")]
    NotAnObject,

    /// Geometry type is not one of the supported simple-feature types.
    #[error("unsupported geometry type: {0}")]
    UnsupportedType(String),

    /// Coordinates member is missing or has the wrong shape.
    #[error("malformed coordinates: {0}")]
    MalformedCoordinates(String),

    /// The geometry has no coordinates at all.
    #[error("geometry is empty")]
    Empty,

    /// WKT text could not be parsed.
    #[error("invalid WKT: {0}")]
    InvalidWkt(String),
}

/// Crate-native geometry, produced by parsing WKT.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Position),
    MultiPoint(Vec<Position>),
    LineString(Vec<Position>),
    MultiLineString(Vec<Vec<Position>>),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

impl Geometry {
    /// Parse a WKT string into a geometry.
    pub fn from_wkt(wkt: &str) -> Result<Self, GeometryError> {
        WktParser::new(wkt).parse()
    }

    /// Promote a single point to a multi-point. All other kinds are
    /// returned unchanged.
    pub fn into_multi(self) -> Self {
        match self {
            Geometry::Point(p) => Geometry::MultiPoint(vec![p]),
            other => other,
        }
    }

    /// True for single points (candidates for multi-point promotion).
    pub fn is_single_point(&self) -> bool {
        matches!(self, Geometry::Point(_))
    }

    /// Axis-aligned bounding box over all positions, or `None` when the
    /// geometry holds no positions.
    pub fn bounding_box(&self) -> Option<Extent> {
        let mut extent = Extent::empty();
        self.for_each_position(&mut |(x, y)| extent.expand_to(x, y));
        if extent.is_empty() {
            None
        } else {
            Some(extent)
        }
    }

    fn for_each_position(&self, f: &mut impl FnMut(Position)) {
        match self {
            Geometry::Point(p) => f(*p),
            Geometry::MultiPoint(ps) | Geometry::LineString(ps) => {
                ps.iter().copied().for_each(f)
            }
            Geometry::MultiLineString(lines) | Geometry::Polygon(lines) => {
                lines.iter().flatten().copied().for_each(f)
            }
            Geometry::MultiPolygon(polys) => polys
                .iter()
                .flatten()
                .flatten()
                .copied()
                .for_each(f),
        }
    }
}

/// Convert a GeoJSON geometry object into a [`Geometry`] via the WKT
/// intermediate.
pub fn geometry_from_geojson(value: &Value) -> Result<Geometry, GeometryError> {
    let wkt = geojson_to_wkt(value)?;
    Geometry::from_wkt(&wkt)
}

/// Serialize a GeoJSON geometry object to WKT.
pub fn geojson_to_wkt(value: &Value) -> Result<String, GeometryError> {
    let obj = value.as_object().ok_or(GeometryError::NotAnObject)?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or(GeometryError::NotAnObject)?;
    let coords = obj
        .get("coordinates")
        .ok_or_else(|| GeometryError::MalformedCoordinates("missing coordinates".into()))?;

    let mut out = String::new();
    match kind {
        "Point" => {
            let p = position(coords)?;
            write_wkt(&mut out, "POINT", |o| write_position(o, p));
        }
        "MultiPoint" => {
            let ps = positions(coords)?;
            write_wkt(&mut out, "MULTIPOINT", |o| {
                write_list(o, &ps, |o, p| {
                    o.push('(');
                    write_position(o, *p);
                    o.push(')');
                });
            });
        }
        "LineString" => {
            let ps = positions(coords)?;
            write_wkt(&mut out, "LINESTRING", |o| {
                write_list(o, &ps, |o, p| write_position(o, *p));
            });
        }
        "MultiLineString" => {
            let lines = position_lists(coords)?;
            write_wkt(&mut out, "MULTILINESTRING", |o| write_rings(o, &lines));
        }
        "Polygon" => {
            let rings = position_lists(coords)?;
            write_wkt(&mut out, "POLYGON", |o| write_rings(o, &rings));
        }
        "MultiPolygon" => {
            let arr = coords.as_array().ok_or_else(|| {
                GeometryError::MalformedCoordinates("expected array of polygons".into())
            })?;
            if arr.is_empty() {
                return Err(GeometryError::Empty);
            }
            let polys = arr
                .iter()
                .map(position_lists)
                .collect::<Result<Vec<_>, _>>()?;
            write_wkt(&mut out, "MULTIPOLYGON", |o| {
                write_list(o, &polys, |o, rings| {
                    o.push('(');
                    write_rings(o, rings);
                    o.push(')');
                });
            });
        }
        other => return Err(GeometryError::UnsupportedType(other.to_string())),
    }
    Ok(out)
}

fn write_wkt(out: &mut String, tag: &str, body: impl FnOnce(&mut String)) {
    out.push_str(tag);
    out.push_str(" (");
    body(out);
    out.push(')');
}

fn write_position(out: &mut String, (x, y): Position) {
    let _ = write!(out, "{} {}", x, y);
}

fn write_list<T>(out: &mut String, items: &[T], mut each: impl FnMut(&mut String, &T)) {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        each(out, item);
    }
}

fn write_rings(out: &mut String, rings: &[Vec<Position>]) {
    write_list(out, rings, |o, ring| {
        o.push('(');
        write_list(o, ring, |o, p| write_position(o, *p));
        o.push(')');
    });
}

fn position(value: &Value) -> Result<Position, GeometryError> {
    let arr = value
        .as_array()
        .ok_or_else(|| GeometryError::MalformedCoordinates("expected coordinate pair".into()))?;
    if arr.len() < 2 {
        return Err(GeometryError::MalformedCoordinates(
            "coordinate pair has fewer than two values".into(),
        ));
    }
    let x = arr[0]
        .as_f64()
        .ok_or_else(|| GeometryError::MalformedCoordinates("non-numeric x".into()))?;
    let y = arr[1]
        .as_f64()
        .ok_or_else(|| GeometryError::MalformedCoordinates("non-numeric y".into()))?;
    Ok((x, y))
}

fn positions(value: &Value) -> Result<Vec<Position>, GeometryError> {
    let arr = value
        .as_array()
        .ok_or_else(|| GeometryError::MalformedCoordinates("expected coordinate list".into()))?;
    if arr.is_empty() {
        return Err(GeometryError::Empty);
    }
    arr.iter().map(position).collect()
}

fn position_lists(value: &Value) -> Result<Vec<Vec<Position>>, GeometryError> {
    let arr = value
        .as_array()
        .ok_or_else(|| GeometryError::MalformedCoordinates("expected list of rings".into()))?;
    if arr.is_empty() {
        return Err(GeometryError::Empty);
    }
    arr.iter().map(positions).collect()
}

/// Minimal recursive-descent WKT parser covering the simple-feature types
/// the backend produces. Accepts both `MULTIPOINT ((1 2), (3 4))` and the
/// unparenthesized `MULTIPOINT (1 2, 3 4)` form.
struct WktParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> WktParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn parse(mut self) -> Result<Geometry, GeometryError> {
        let tag = self.ident()?;
        self.skip_ws();
        if self.rest().to_ascii_uppercase().starts_with("EMPTY") {
            return Err(GeometryError::Empty);
        }

        let geometry = match tag.to_ascii_uppercase().as_str() {
            "POINT" => {
                self.expect('(')?;
                let p = self.coordinate()?;
                self.expect(')')?;
                Geometry::Point(p)
            }
            "MULTIPOINT" => Geometry::MultiPoint(self.point_list()?),
            "LINESTRING" => Geometry::LineString(self.coordinate_list()?),
            "MULTILINESTRING" => Geometry::MultiLineString(self.ring_list()?),
            "POLYGON" => Geometry::Polygon(self.ring_list()?),
            "MULTIPOLYGON" => {
                self.expect('(')?;
                let mut polys = vec![self.ring_list()?];
                while self.eat(',') {
                    polys.push(self.ring_list()?);
                }
                self.expect(')')?;
                Geometry::MultiPolygon(polys)
            }
            other => return Err(GeometryError::UnsupportedType(other.to_string())),
        };

        self.skip_ws();
        if self.pos != self.input.len() {
            return Err(GeometryError::InvalidWkt(format!(
                "trailing input at offset {}",
                self.pos
            )));
        }
        Ok(geometry)
    }

    fn point_list(&mut self) -> Result<Vec<Position>, GeometryError> {
        self.expect('(')?;
        let mut points = vec![self.optionally_wrapped_coordinate()?];
        while self.eat(',') {
            points.push(self.optionally_wrapped_coordinate()?);
        }
        self.expect(')')?;
        Ok(points)
    }

    fn optionally_wrapped_coordinate(&mut self) -> Result<Position, GeometryError> {
        if self.eat('(') {
            let p = self.coordinate()?;
            self.expect(')')?;
            Ok(p)
        } else {
            self.coordinate()
        }
    }

    fn coordinate_list(&mut self) -> Result<Vec<Position>, GeometryError> {
        self.expect('(')?;
        let mut points = vec![self.coordinate()?];
        while self.eat(',') {
            points.push(self.coordinate()?);
        }
        self.expect(')')?;
        Ok(points)
    }

    fn ring_list(&mut self) -> Result<Vec<Vec<Position>>, GeometryError> {
        self.expect('(')?;
        let mut rings = vec![self.coordinate_list()?];
        while self.eat(',') {
            rings.push(self.coordinate_list()?);
        }
        self.expect(')')?;
        Ok(rings)
    }

    fn coordinate(&mut self) -> Result<Position, GeometryError> {
        let x = self.number()?;
        let y = self.number()?;
        // Swallow an optional altitude value.
        self.skip_ws();
        if self
            .rest()
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || c == '-' || c == '+')
        {
            self.number()?;
        }
        Ok((x, y))
    }

    fn number(&mut self) -> Result<f64, GeometryError> {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !matches!(c, '0'..='9' | '.' | '-' | '+' | 'e' | 'E'))
            .map_or(rest.len(), |(i, _)| i);
        if end == 0 {
            return Err(GeometryError::InvalidWkt(format!(
                "expected number at offset {}",
                self.pos
            )));
        }
        let text = &rest[..end];
        let value = text
            .parse::<f64>()
            .map_err(|_| GeometryError::InvalidWkt(format!("bad number {:?}", text)))?;
        self.pos += end;
        Ok(value)
    }

    fn ident(&mut self) -> Result<&'a str, GeometryError> {
        self.skip_ws();
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, c)| !c.is_ascii_alphabetic())
            .map_or(rest.len(), |(i, _)| i);
        if end == 0 {
            return Err(GeometryError::InvalidWkt("missing geometry tag".into()));
        }
        let ident = &rest[..end];
        self.pos += end;
        Ok(ident)
    }

    fn expect(&mut self, c: char) -> Result<(), GeometryError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(GeometryError::InvalidWkt(format!(
                "expected {:?} at offset {}",
                c, self.pos
            )))
        }
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        let skipped = rest.len() - rest.trim_start().len();
        self.pos += skipped;
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_point_to_wkt() {
        let wkt = geojson_to_wkt(&json!({"type": "Point", "coordinates": [1.5, 2.0]})).unwrap();
        assert_eq!(wkt, "POINT (1.5 2)");
    }

    #[test]
    fn test_polygon_to_wkt() {
        let wkt = geojson_to_wkt(&json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]
        }))
        .unwrap();
        assert_eq!(wkt, "POLYGON ((0 0, 1 0, 1 1, 0 0))");
    }

    #[test]
    fn test_altitude_is_dropped() {
        let wkt =
            geojson_to_wkt(&json!({"type": "Point", "coordinates": [1.0, 2.0, 30.0]})).unwrap();
        assert_eq!(wkt, "POINT (1 2)");
    }

    #[test]
    fn test_unsupported_type_is_rejected() {
        let err =
            geojson_to_wkt(&json!({"type": "GeometryCollection", "coordinates": []})).unwrap_err();
        assert!(matches!(err, GeometryError::UnsupportedType(_)));
    }

    #[test]
    fn test_empty_coordinates_are_rejected() {
        let err = geojson_to_wkt(&json!({"type": "LineString", "coordinates": []})).unwrap_err();
        assert_eq!(err, GeometryError::Empty);
    }

    #[test]
    fn test_non_object_is_rejected() {
        assert_eq!(
            geojson_to_wkt(&json!([1, 2])).unwrap_err(),
            GeometryError::NotAnObject
        );
    }

    #[test]
    fn test_parse_point() {
        let g = Geometry::from_wkt("POINT (1.5 2)").unwrap();
        assert_eq!(g, Geometry::Point((1.5, 2.0)));
    }

    #[test]
    fn test_parse_multipoint_both_forms() {
        let wrapped = Geometry::from_wkt("MULTIPOINT ((1 2), (3 4))").unwrap();
        let bare = Geometry::from_wkt("MULTIPOINT (1 2, 3 4)").unwrap();
        assert_eq!(wrapped, bare);
        assert_eq!(
            wrapped,
            Geometry::MultiPoint(vec![(1.0, 2.0), (3.0, 4.0)])
        );
    }

    #[test]
    fn test_parse_multipolygon() {
        let g = Geometry::from_wkt("MULTIPOLYGON (((0 0, 1 0, 1 1, 0 0)), ((5 5, 6 5, 6 6, 5 5)))")
            .unwrap();
        match g {
            Geometry::MultiPolygon(polys) => assert_eq!(polys.len(), 2),
            other => panic!("unexpected geometry: {:?}", other),
        }
    }

    #[test]
    fn test_parse_empty_keyword() {
        assert_eq!(
            Geometry::from_wkt("POINT EMPTY").unwrap_err(),
            GeometryError::Empty
        );
    }

    #[test]
    fn test_parse_rejects_trailing_garbage() {
        let err = Geometry::from_wkt("POINT (1 2) extra").unwrap_err();
        assert!(matches!(err, GeometryError::InvalidWkt(_)));
    }

    #[test]
    fn test_geojson_roundtrip_through_wkt() {
        let g = geometry_from_geojson(&json!({
            "type": "LineString",
            "coordinates": [[0.0, 0.0], [10.0, 5.0]]
        }))
        .unwrap();
        assert_eq!(g, Geometry::LineString(vec![(0.0, 0.0), (10.0, 5.0)]));
    }

    #[test]
    fn test_point_promotes_to_multi() {
        let g = Geometry::Point((1.0, 2.0)).into_multi();
        assert_eq!(g, Geometry::MultiPoint(vec![(1.0, 2.0)]));
    }

    #[test]
    fn test_non_point_is_not_promoted() {
        let line = Geometry::LineString(vec![(0.0, 0.0), (1.0, 1.0)]);
        assert_eq!(line.clone().into_multi(), line);
    }

    #[test]
    fn test_bounding_box() {
        let g = Geometry::LineString(vec![(-1.0, 4.0), (3.0, -2.0)]);
        let extent = g.bounding_box().unwrap();
        assert_eq!(
            (extent.min_x, extent.min_y, extent.max_x, extent.max_y),
            (-1.0, -2.0, 3.0, 4.0)
        );
    }
}
