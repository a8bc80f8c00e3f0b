/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Bidirectional mapping between the framework's tagged dynamic value type
//! and JSON (spec.md §4.3 "Variant codec").

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

/// The framework's dynamic value type, reduced to the families spec.md §4.3
/// names explicitly plus an `Unknown` catch-all for anything else.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Point { x: f64, y: f64 },
    Size { width: f64, height: f64 },
    Rect { x: f64, y: f64, width: f64, height: f64 },
    Color { r: u8, g: u8, b: u8, a: u8 },
    Url(String),
    DateTime(DateTime<Utc>),
    StringList(Vec<String>),
    List(Vec<Variant>),
    Map(BTreeMap<String, Variant>),
    /// Lossy, informational fallback for a tag the codec does not model.
    Unknown {
        type_name: String,
        value: Option<String>,
    },
}

impl Variant {
    /// The framework type-name this variant reports to `qt.properties.list`
    /// / `qt.methods.list`, roughly matching a meta-object type-name string.
    pub fn type_name(&self) -> &str {
        match self {
            Variant::Null => "void",
            Variant::Bool(_) => "bool",
            Variant::Int(_) => "int",
            Variant::Float(_) => "double",
            Variant::Str(_) => "QString",
            Variant::Bytes(_) => "QByteArray",
            Variant::Point { .. } => "QPointF",
            Variant::Size { .. } => "QSizeF",
            Variant::Rect { .. } => "QRectF",
            Variant::Color { .. } => "QColor",
            Variant::Url(_) => "QUrl",
            Variant::DateTime(_) => "QDateTime",
            Variant::StringList(_) => "QStringList",
            Variant::List(_) => "QVariantList",
            Variant::Map(_) => "QVariantMap",
            Variant::Unknown { type_name, .. } => type_name,
        }
    }

    /// Encode to JSON per the table in spec.md §4.3.
    pub fn to_json(&self) -> Value {
        match self {
            Variant::Null => Value::Null,
            Variant::Bool(b) => json!(b),
            Variant::Int(i) => json!(i),
            Variant::Float(f) => json!(f),
            Variant::Str(s) => json!(s),
            Variant::Bytes(b) => json!(base64::engine::general_purpose::STANDARD.encode(b)),
            Variant::Point { x, y } => json!({ "x": x, "y": y }),
            Variant::Size { width, height } => json!({ "width": width, "height": height }),
            Variant::Rect { x, y, width, height } => {
                json!({ "x": x, "y": y, "width": width, "height": height })
            }
            Variant::Color { r, g, b, a } => json!({ "r": r, "g": g, "b": b, "a": a }),
            Variant::Url(u) => json!(u),
            Variant::DateTime(dt) => json!(dt.to_rfc3339()),
            Variant::StringList(list) => json!(list),
            Variant::List(list) => Value::Array(list.iter().map(Variant::to_json).collect()),
            Variant::Map(map) => {
                let mut obj = serde_json::Map::new();
                for (k, v) in map {
                    obj.insert(k.clone(), v.to_json());
                }
                Value::Object(obj)
            }
            Variant::Unknown { type_name, value } => json!({
                "_type": type_name,
                "value": value,
            }),
        }
    }

    /// Decode from JSON, optionally coercing toward a declared target type
    /// (the property's meta-object type-name), per spec.md §4.3 "Reverse
    /// mapping accepts explicit shapes, the `{_type, value}` form, and
    /// coerces numeric/string primitives to the target type when requested."
    pub fn from_json(value: &Value, target_type: Option<&str>) -> Result<Variant, String> {
        if let Some(obj) = value.as_object() {
            if let Some(type_name) = obj.get("_type").and_then(Value::as_str) {
                let inner = obj.get("value").cloned().unwrap_or(Value::Null);
                return Ok(Variant::Unknown {
                    type_name: type_name.to_string(),
                    value: inner.as_str().map(str::to_string).or_else(|| {
                        if inner.is_null() {
                            None
                        } else {
                            Some(inner.to_string())
                        }
                    }),
                });
            }
            if let (Some(x), Some(y)) = (obj.get("x"), obj.get("y")) {
                if let (Some(width), Some(height)) = (obj.get("width"), obj.get("height")) {
                    return Ok(Variant::Rect {
                        x: num(x)?,
                        y: num(y)?,
                        width: num(width)?,
                        height: num(height)?,
                    });
                }
                return Ok(Variant::Point {
                    x: num(x)?,
                    y: num(y)?,
                });
            }
            if let (Some(width), Some(height)) = (obj.get("width"), obj.get("height")) {
                return Ok(Variant::Size {
                    width: num(width)?,
                    height: num(height)?,
                });
            }
            if let (Some(r), Some(g), Some(b)) = (obj.get("r"), obj.get("g"), obj.get("b")) {
                let a = obj.get("a").map(num).transpose()?.unwrap_or(255.0);
                return Ok(Variant::Color {
                    r: num(r)? as u8,
                    g: num(g)? as u8,
                    b: num(b)? as u8,
                    a: a as u8,
                });
            }
            let mut map = BTreeMap::new();
            for (k, v) in obj {
                map.insert(k.clone(), Variant::from_json(v, None)?);
            }
            return Ok(Variant::Map(map));
        }

        match (value, target_type) {
            (Value::Null, _) => Ok(Variant::Null),
            (Value::Bool(b), _) => Ok(Variant::Bool(*b)),
            (Value::Array(items), Some("QStringList")) => {
                let strings = items
                    .iter()
                    .map(|v| v.as_str().map(str::to_string).ok_or_else(|| "expected string".to_string()))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Variant::StringList(strings))
            }
            (Value::Array(items), _) => Ok(Variant::List(
                items
                    .iter()
                    .map(|v| Variant::from_json(v, None))
                    .collect::<Result<Vec<_>, _>>()?,
            )),
            (Value::String(s), Some("QUrl")) => Ok(Variant::Url(s.clone())),
            (Value::String(s), Some("QDateTime")) => DateTime::parse_from_rfc3339(s)
                .map(|dt| Variant::DateTime(dt.with_timezone(&Utc)))
                .map_err(|e| format!("invalid ISO-8601 datetime: {e}")),
            (Value::String(s), Some("QByteArray")) => base64::engine::general_purpose::STANDARD
                .decode(s)
                .map(Variant::Bytes)
                .map_err(|e| format!("invalid base64: {e}")),
            (Value::String(s), Some("double") | Some("float")) => s
                .parse::<f64>()
                .map(Variant::Float)
                .map_err(|_| format!("cannot coerce \"{s}\" to {}", target_type.unwrap())),
            (Value::String(s), Some("int")) => s
                .parse::<i64>()
                .map(Variant::Int)
                .map_err(|_| format!("cannot coerce \"{s}\" to int")),
            (Value::String(s), _) => Ok(Variant::Str(s.clone())),
            (Value::Number(n), Some("double") | Some("float")) => {
                Ok(Variant::Float(n.as_f64().unwrap_or_default()))
            }
            (Value::Number(n), Some("QString")) => Ok(Variant::Str(n.to_string())),
            (Value::Number(n), _) => {
                if let Some(i) = n.as_i64() {
                    Ok(Variant::Int(i))
                } else {
                    Ok(Variant::Float(n.as_f64().unwrap_or_default()))
                }
            }
            (Value::Object(_), _) => unreachable!("handled above"),
        }
    }
}

fn num(v: &Value) -> Result<f64, String> {
    v.as_f64().ok_or_else(|| format!("expected number, got {v}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn rect_round_trips() {
        let v = Variant::Rect {
            x: 1.0,
            y: 2.0,
            width: 3.0,
            height: 4.0,
        };
        let json = v.to_json();
        assert_eq!(json, json!({"x": 1.0, "y": 2.0, "width": 3.0, "height": 4.0}));
        let back = Variant::from_json(&json, None).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn unknown_variant_is_lossy_but_informational() {
        let v = Variant::Unknown {
            type_name: "QMatrix4x4".into(),
            value: Some("identity".into()),
        };
        let json = v.to_json();
        assert_eq!(json["_type"], "QMatrix4x4");
        let back = Variant::from_json(&json, None).unwrap();
        assert_eq!(back, v);
    }

    #[test]
    fn string_coerces_to_declared_numeric_type() {
        let v = Variant::from_json(&json!("42"), Some("int")).unwrap();
        assert_eq!(v, Variant::Int(42));
    }

    proptest! {
        #[test]
        fn color_round_trip(r in 0u8..=255, g in 0u8..=255, b in 0u8..=255, a in 0u8..=255) {
            let v = Variant::Color { r, g, b, a };
            let json = v.to_json();
            let back = Variant::from_json(&json, None).unwrap();
            prop_assert_eq!(back, v);
        }

        #[test]
        fn point_round_trip(x in -10000.0f64..10000.0, y in -10000.0f64..10000.0) {
            let v = Variant::Point { x, y };
            let json = v.to_json();
            let back = Variant::from_json(&json, None).unwrap();
            prop_assert_eq!(back, v);
        }
    }
}
