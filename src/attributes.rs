use serde_json::{Map, Number, Value};

use crate::metadata::{Scalar, encode_fill_value};

/// Attributes maintained by HDF5 for dimension scale bookkeeping.
const SKIPPED: [&str; 2] = ["REFERENCE_LIST", "DIMENSION_LIST"];

/// Attribute holding the fill value, encoded like array fill values.
pub const FILL_VALUE_ATTR: &str = "_FillValue";

/// Marker value of the `CLASS` attribute on dimension scales.
pub const DIMENSION_SCALE: &str = "DIMENSION_SCALE";

/// Attribute listing the dimension names of an array.
pub const ARRAY_DIMENSIONS_ATTR: &str = "_ARRAY_DIMENSIONS";

/// An attribute value as read from a source.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// A variable-length byte string.
    Bytes(Vec<u8>),
    Text(String),
    Scalar(Scalar),
    Array(Vec<Scalar>),
    /// A value with no JSON equivalent, e.g. an object reference.
    Opaque(String),
}

/// Convert one attribute into JSON.
///
/// Returns `Ok(None)` if the attribute is deliberately dropped.
pub fn coerce_attribute(
    name: &str,
    value: &AttributeValue,
    dimension_aware: bool,
) -> crate::Result<Option<Value>> {
    if SKIPPED.contains(&name) {
        return Ok(None);
    }
    let out = match value {
        AttributeValue::Bytes(b) => Value::String(utf8(name, b)?),
        AttributeValue::Text(s) => Value::String(s.clone()),
        AttributeValue::Opaque(kind) => {
            return Err(crate::Error::AttributeCoercion {
                name: name.into(),
                reason: format!("unsupported type {kind}"),
            });
        }
        AttributeValue::Scalar(s) => coerce_elements(name, std::slice::from_ref(s))?,
        AttributeValue::Array(a) => coerce_elements(name, a)?,
    };
    if dimension_aware && out.as_str() == Some(DIMENSION_SCALE) {
        return Ok(None);
    }
    Ok(Some(out))
}

fn coerce_elements(name: &str, elements: &[Scalar]) -> crate::Result<Value> {
    let texts = elements
        .iter()
        .map(|e| match e {
            Scalar::Bytes(b) => utf8(name, b).map(Scalar::Text),
            other => Ok(other.clone()),
        })
        .collect::<crate::Result<Vec<_>>>()?;

    let encode = |s: &Scalar| {
        if name == FILL_VALUE_ATTR {
            Ok(encode_fill_value(s))
        } else {
            scalar_to_json(name, s)
        }
    };
    match texts.as_slice() {
        [single] => encode(single),
        many => many
            .iter()
            .map(encode)
            .collect::<crate::Result<Vec<_>>>()
            .map(Value::Array),
    }
}

fn scalar_to_json(name: &str, value: &Scalar) -> crate::Result<Value> {
    let out = match value {
        Scalar::Bool(b) => Value::Bool(*b),
        Scalar::Int(i) => Value::from(*i),
        Scalar::UInt(u) => Value::from(*u),
        Scalar::Float(f) => Number::from_f64(*f).map(Value::Number).ok_or_else(|| {
            crate::Error::AttributeCoercion {
                name: name.into(),
                reason: format!("non-finite float {f}"),
            }
        })?,
        Scalar::Bytes(b) => Value::String(utf8(name, b)?),
        Scalar::Text(s) => Value::String(s.clone()),
    };
    Ok(out)
}

fn utf8(name: &str, bytes: &[u8]) -> crate::Result<String> {
    String::from_utf8(bytes.to_vec()).map_err(|e| crate::Error::AttributeCoercion {
        name: name.into(),
        reason: e.to_string(),
    })
}

/// Copy all representable attributes of `path` into a JSON map.
///
/// Attributes which cannot be converted are logged and skipped.
pub fn transfer_attributes<'a>(
    path: &str,
    attributes: impl IntoIterator<Item = &'a (String, AttributeValue)>,
    dimension_aware: bool,
) -> Map<String, Value> {
    let mut out = Map::new();
    for (name, value) in attributes {
        match coerce_attribute(name, value, dimension_aware) {
            Ok(Some(v)) => {
                out.insert(name.clone(), v);
            }
            Ok(None) => {}
            Err(e) => log::warn!("dropping attribute {name}@/{path} = {value:?}: {e}"),
        }
    }
    out
}
