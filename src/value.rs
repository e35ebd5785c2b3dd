//! Stored values and search cell values
//!
//! Every record payload is a `Value`: a single-byte type tag followed by the
//! payload bytes. The tag set is closed; unknown tags decode to `None` so a
//! store written by a newer node still opens here.

use bytes::Bytes;

/// Type tag for string-encoded text values
pub const TYPE_TEXT: u8 = 0;

/// Type tag for compact binary document values
pub const TYPE_DOCUMENT: u8 = 1;

/// A stored value: type tag + payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// UTF-8 text
    Text(String),

    /// Opaque compact binary document
    Document(Bytes),
}

impl Value {
    /// The single-byte type tag written before the payload
    pub fn type_id(&self) -> u8 {
        match self {
            Value::Text(_) => TYPE_TEXT,
            Value::Document(_) => TYPE_DOCUMENT,
        }
    }

    /// Human-readable tag name, used by search field extraction
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Text(_) => "Text",
            Value::Document(_) => "Document",
        }
    }

    /// Payload bytes without the tag
    pub fn payload(&self) -> &[u8] {
        match self {
            Value::Text(s) => s.as_bytes(),
            Value::Document(b) => b,
        }
    }

    /// Text rendering used by the `value` search field. Text values render
    /// as-is; document payloads render as lossy UTF-8 so document stores
    /// stay searchable.
    pub fn to_field_text(&self) -> String {
        match self {
            Value::Text(s) => s.clone(),
            Value::Document(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Append `type_id | payload` to an output buffer
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(self.type_id());
        out.extend_from_slice(self.payload());
    }

    /// Decode `type_id | payload`.
    ///
    /// Returns `None` for an empty slice or an unknown tag; unknown tags are
    /// tolerated for forward compatibility rather than treated as corruption.
    pub fn decode(raw: &[u8]) -> Option<Value> {
        let (&tag, payload) = raw.split_first()?;
        match tag {
            TYPE_TEXT => Some(Value::Text(String::from_utf8_lossy(payload).into_owned())),
            TYPE_DOCUMENT => Some(Value::Document(Bytes::copy_from_slice(payload))),
            _ => None,
        }
    }
}

/// A single search result cell
///
/// Field extractors produce these directly from raw record bytes; rows handed
/// to a search consumer are one `FieldVal` per requested field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldVal {
    /// Field not present or not extractable for this record
    Null,

    /// Text cell
    Text(String),

    /// Integer cell (range bounds, epoch-millis times)
    Long(i64),
}

impl FieldVal {
    /// String form used by predicate helpers and the CLI
    pub fn as_text(&self) -> String {
        match self {
            FieldVal::Null => String::new(),
            FieldVal::Text(s) => s.clone(),
            FieldVal::Long(v) => v.to_string(),
        }
    }
}
