//! Conversions between [`PropValue`], yrs values and JSON.

use std::sync::Arc;

use serde_json::{Map as JsonMap, Number, Value};
use yrs::{
    Any, Array, ArrayPrelim, ArrayRef, GetString, Map, MapPrelim, MapRef, Out, ReadTxn,
    TextPrelim, TransactionMut,
};

use crate::factory::PropValue;

/// Collaborative text seeded with `initial`.
pub fn new_text(initial: &str) -> TextPrelim {
    TextPrelim::new(initial.to_string())
}

/// Write `value` under `key`, creating nested shared types as needed.
pub fn write_prop(map: &MapRef, txn: &mut TransactionMut, key: &str, value: &PropValue) {
    match value {
        PropValue::Text(text) => {
            map.insert(txn, key, new_text(text));
        }
        PropValue::Map(entries) => {
            let child = map.insert(txn, key, MapPrelim::default());
            for (k, v) in entries {
                write_prop(&child, txn, k, v);
            }
        }
        PropValue::Array(items) => {
            let child = map.insert(txn, key, ArrayPrelim::default());
            for item in items {
                push_prop(&child, txn, item);
            }
        }
        scalar => {
            map.insert(txn, key, scalar_any(scalar));
        }
    }
}

/// Append `value` to a shared array.
pub fn push_prop(array: &ArrayRef, txn: &mut TransactionMut, value: &PropValue) {
    match value {
        PropValue::Text(text) => {
            array.push_back(txn, new_text(text));
        }
        PropValue::Map(entries) => {
            let child = array.push_back(txn, MapPrelim::default());
            for (k, v) in entries {
                write_prop(&child, txn, k, v);
            }
        }
        PropValue::Array(items) => {
            let child = array.push_back(txn, ArrayPrelim::default());
            for item in items {
                push_prop(&child, txn, item);
            }
        }
        scalar => {
            array.push_back(txn, scalar_any(scalar));
        }
    }
}

fn scalar_any(value: &PropValue) -> Any {
    match value {
        PropValue::Str(s) | PropValue::Text(s) => Any::String(Arc::from(s.as_str())),
        PropValue::Bool(b) => Any::Bool(*b),
        PropValue::Number(n) => Any::Number(*n),
        PropValue::Null | PropValue::Map(_) | PropValue::Array(_) => Any::Null,
    }
}

/// String content of a text or string value.
pub fn out_to_string<T: ReadTxn>(out: &Out, txn: &T) -> Option<String> {
    match out {
        Out::YText(text) => Some(text.get_string(txn)),
        Out::Any(Any::String(s)) => Some(s.to_string()),
        _ => None,
    }
}

/// Numeric content, accepting both float and bigint encodings.
pub fn out_to_number(out: &Out) -> Option<f64> {
    match out {
        Out::Any(Any::Number(n)) => Some(*n),
        Out::Any(Any::BigInt(n)) => Some(*n as f64),
        _ => None,
    }
}

/// Strings of a shared or plain array, skipping anything else.
pub fn out_to_strings<T: ReadTxn>(out: &Out, txn: &T) -> Vec<String> {
    match out {
        Out::YArray(array) => array
            .iter(txn)
            .filter_map(|item| out_to_string(&item, txn))
            .collect(),
        Out::Any(Any::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Any::String(s) => Some(s.to_string()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// JSON view of a stored value. Text reads back as a plain string.
pub fn out_to_json<T: ReadTxn>(out: &Out, txn: &T) -> Value {
    match out {
        Out::Any(any) => any_to_json(any),
        Out::YText(text) => Value::String(text.get_string(txn)),
        Out::YArray(array) => Value::Array(
            array
                .iter(txn)
                .map(|item| out_to_json(&item, txn))
                .collect(),
        ),
        Out::YMap(map) => Value::Object(
            map.iter(txn)
                .map(|(k, v)| (k.to_string(), out_to_json(&v, txn)))
                .collect(),
        ),
        _ => Value::Null,
    }
}

/// JSON form of a yrs scalar or nested `Any`.
pub fn any_to_json(any: &Any) -> Value {
    match any {
        Any::Null | Any::Undefined => Value::Null,
        Any::Bool(b) => Value::Bool(*b),
        Any::Number(n) => number_to_json(*n),
        Any::BigInt(n) => Value::from(*n),
        Any::String(s) => Value::String(s.to_string()),
        Any::Buffer(bytes) => Value::Array(bytes.iter().map(|b| Value::from(*b)).collect()),
        Any::Array(items) => Value::Array(items.iter().map(any_to_json).collect()),
        Any::Map(entries) => Value::Object(
            entries
                .iter()
                .map(|(k, v)| (k.clone(), any_to_json(v)))
                .collect::<JsonMap<_, _>>(),
        ),
    }
}

/// Whole numbers read back as integers.
fn number_to_json(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}
