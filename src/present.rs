//! Rendering of decoded payloads for the terminal.

use std::convert::TryFrom;
use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_cbor::Value;
use serde_json::{Map, Number};

use crate::eudcc::Certificate;

/// Maps a CBOR document onto JSON.
///
/// Integer map keys become their decimal text, byte strings become base64
/// and tags are dropped in favour of the tagged value.
pub fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => integer_to_json(*i),
        Value::Float(f) => Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Bytes(bytes) => serde_json::Value::String(STANDARD.encode(bytes)),
        Value::Text(text) => serde_json::Value::String(text.clone()),
        Value::Array(items) => {
            serde_json::Value::Array(items.iter().map(to_json).collect())
        }
        Value::Map(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                object.insert(key_to_string(key), to_json(value));
            }
            serde_json::Value::Object(object)
        }
        Value::Tag(_, inner) => to_json(inner),
        _ => serde_json::Value::Null,
    }
}

fn integer_to_json(i: i128) -> serde_json::Value {
    if let Ok(n) = i64::try_from(i) {
        serde_json::Value::from(n)
    } else if let Ok(n) = u64::try_from(i) {
        serde_json::Value::from(n)
    } else {
        serde_json::Value::String(i.to_string())
    }
}

fn key_to_string(key: &Value) -> String {
    match key {
        Value::Text(text) => text.clone(),
        Value::Integer(i) => i.to_string(),
        other => to_json(other).to_string(),
    }
}

/// Writes `payload` as indented JSON followed by a newline.
pub fn present<W: Write>(payload: &Value, mut out: W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut out, &to_json(payload))?;
    writeln!(out)
}

pub fn present_certificate<W: Write>(certificate: &Certificate, mut out: W) -> io::Result<()> {
    writeln!(out, "{:#?}", certificate)
}
