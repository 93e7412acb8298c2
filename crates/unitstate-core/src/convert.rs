// ── Wire → cache conversion ──
//
// Decodes `unitstate_api::Variant` payloads into `PropertyValue`. A map is
// decoded as a whole: one bad value rejects the entire map.

use std::collections::HashMap;

use unitstate_api::{PropertyMap, Variant};

use crate::error::CoreError;
use crate::value::PropertyValue;

/// Decode one wire value.
pub fn decode_value(variant: &Variant) -> Result<PropertyValue, String> {
    let value = match variant {
        Variant::Bool(v) => PropertyValue::Boolean(*v),
        Variant::Byte(v) => PropertyValue::Integer(i64::from(*v)),
        Variant::Int16(v) => PropertyValue::Integer(i64::from(*v)),
        Variant::UInt16(v) => PropertyValue::Integer(i64::from(*v)),
        Variant::Int32(v) => PropertyValue::Integer(i64::from(*v)),
        Variant::UInt32(v) => PropertyValue::Integer(i64::from(*v)),
        Variant::Int64(v) => PropertyValue::Integer(*v),
        Variant::UInt64(v) => PropertyValue::BigInteger(*v),
        Variant::Double(v) => PropertyValue::Double(*v),
        Variant::Str(s) | Variant::ObjectPath(s) | Variant::Signature(s) => {
            PropertyValue::String(s.clone())
        }
        Variant::Array { element, items } => decode_array(element, items)?,
        Variant::Dict {
            key,
            value,
            entries,
        } => {
            let expected = format!("{key}{value}");
            let mut records = Vec::with_capacity(entries.len());
            for (k, v) in entries {
                let found = format!("{}{}", k.signature(), v.signature());
                if found != expected {
                    return Err(format!(
                        "dictionary entry has signature {{{found}}}, expected {{{expected}}}"
                    ));
                }
                records.push(PropertyValue::Record(vec![decode_value(k)?, decode_value(v)?]));
            }
            PropertyValue::List(records)
        }
        Variant::Struct(fields) => PropertyValue::Record(
            fields
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        Variant::Variant(inner) => PropertyValue::Variant(Box::new(decode_value(inner)?)),
    };
    Ok(value)
}

fn decode_array(element: &str, items: &[Variant]) -> Result<PropertyValue, String> {
    if let Some(bad) = items.iter().find(|item| item.signature() != element) {
        return Err(format!(
            "array of '{element}' contains a '{}' item",
            bad.signature()
        ));
    }

    let value = match element {
        "y" => PropertyValue::Bytes(
            items
                .iter()
                .filter_map(|item| match item {
                    Variant::Byte(b) => Some(*b),
                    _ => None,
                })
                .collect(),
        ),
        "s" | "o" | "g" => PropertyValue::Strings(
            items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_owned))
                .collect(),
        ),
        _ => PropertyValue::List(
            items
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()?,
        ),
    };
    Ok(value)
}

/// Decode one named property.
pub fn decode_property(key: &str, variant: &Variant) -> Result<PropertyValue, CoreError> {
    decode_value(variant).map_err(|reason| CoreError::DecodeFailure {
        key: key.to_owned(),
        reason,
    })
}

/// Decode a whole property map, failing on the first bad value.
pub fn decode_map(map: &PropertyMap) -> Result<HashMap<String, PropertyValue>, CoreError> {
    map.iter()
        .map(|(key, variant)| Ok((key.clone(), decode_property(key, variant)?)))
        .collect()
}
