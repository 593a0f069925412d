//! Representations and the value conversion capability.

use std::{fmt, str::FromStr};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, NaiveDate, Utc};
use compound_uri::CompoundUri;
use serde_json::Number;

use crate::{ResourceData, Value};

/// Target type a raw value is converted to on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Representation {
    /// The resolved value, unconverted.
    #[default]
    Default,
    /// Text.
    String,
    /// Number.
    Number,
    /// Boolean.
    Boolean,
    /// Point in time.
    Date,
    /// Image. Only host-provided converters produce images.
    Image,
    /// Compound URI.
    Url,
    /// Raw bytes.
    Binary,
    /// Parsed structured data (maps and lists).
    Data,
    /// A nested configuration node.
    Configuration,
}

impl Representation {
    /// All representations, in declaration order.
    pub const ALL: [Self; 10] = [
        Self::Default,
        Self::String,
        Self::Number,
        Self::Boolean,
        Self::Date,
        Self::Image,
        Self::Url,
        Self::Binary,
        Self::Data,
        Self::Configuration,
    ];

    /// Canonical lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Image => "image",
            Self::Url => "url",
            Self::Binary => "binary",
            Self::Data => "data",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for Representation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Representation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(Self::Default),
            "string" | "text" => Ok(Self::String),
            "number" => Ok(Self::Number),
            "boolean" | "bool" => Ok(Self::Boolean),
            "date" => Ok(Self::Date),
            "image" => Ok(Self::Image),
            "url" | "uri" => Ok(Self::Url),
            "binary" => Ok(Self::Binary),
            "data" | "json" => Ok(Self::Data),
            "configuration" | "config" => Ok(Self::Configuration),
            other => Err(format!("unknown representation '{}'", other)),
        }
    }
}

/// Converts resolved values between representations.
///
/// [`Representation::Configuration`] is handled by the configuration itself,
/// since promotion needs the requesting node's context.
pub trait Converter {
    /// Convert `value` to `repr`, or `None` when no conversion exists.
    fn convert(&self, value: &Value, repr: Representation) -> Option<Value>;
}

/// Converter for the scalar representations: string, number, boolean, date,
/// URL, binary and structured data.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardConverter;

impl Converter for StandardConverter {
    fn convert(&self, value: &Value, repr: Representation) -> Option<Value> {
        match repr {
            Representation::Default | Representation::Configuration => Some(value.clone()),
            Representation::String => to_string(value).map(Value::String),
            Representation::Number => to_number(value).map(Value::Number),
            Representation::Boolean => to_bool(value).map(Value::Bool),
            Representation::Date => to_date(value).map(Value::Date),
            Representation::Url => to_uri(value).map(Value::Uri),
            Representation::Binary => to_binary(value).map(Value::Binary),
            Representation::Data => to_data(value),
            Representation::Image => None,
        }
    }
}

/// Text form of a scalar.
fn to_string(value: &Value) -> Option<String> {
    match value {
        Value::Binary(bytes) => String::from_utf8(bytes.clone()).ok(),
        Value::Object(_) => None,
        other => other.to_display_string(),
    }
}

/// Numeric form; strings are parsed, booleans become 0/1, dates become epoch seconds.
fn to_number(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        Value::Bool(b) => Some(Number::from(i64::from(*b))),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .map(Number::from)
                .or_else(|| s.parse::<f64>().ok().and_then(Number::from_f64))
        }
        Value::Date(d) => Some(Number::from(d.timestamp())),
        _ => None,
    }
}

/// Boolean form; accepts the usual textual spellings.
fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Date form from RFC 3339, `YYYY-MM-DD` or epoch seconds.
fn to_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Date(d) => Some(*d),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                let f = n.as_f64()?;
                DateTime::from_timestamp(f.trunc() as i64, (f.fract() * 1e9) as u32)
            }),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(d) = DateTime::parse_from_rfc3339(s) {
                return Some(d.with_timezone(&Utc));
            }
            if let Ok(day) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                return day.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
            s.parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
        }
        _ => None,
    }
}

/// Compound URI form.
fn to_uri(value: &Value) -> Option<CompoundUri> {
    match value {
        Value::Uri(u) => Some(u.clone()),
        Value::String(s) => CompoundUri::try_parse(s.trim()),
        Value::Resource(r) => Some(r.uri().clone()),
        _ => None,
    }
}

/// Bytes; strings are base64.
fn to_binary(value: &Value) -> Option<Vec<u8>> {
    match value {
        Value::Binary(b) => Some(b.clone()),
        Value::String(s) => STANDARD.decode(s.trim()).ok(),
        Value::Resource(r) => match r.data() {
            ResourceData::Bytes(b) => Some(b.clone()),
            ResourceData::Text(t) => Some(t.as_bytes().to_vec()),
            ResourceData::Json(j) => Some(j.to_string().into_bytes()),
        },
        _ => None,
    }
}

/// Structured data parsed from JSON text or a resource.
fn to_data(value: &Value) -> Option<Value> {
    match value {
        Value::Map(_) | Value::List(_) => Some(value.clone()),
        Value::String(s) => serde_json::from_str(s).ok().map(|j| Value::from_json(&j)),
        Value::Resource(r) => r.structured_data().map(|j| Value::from_json(&j)),
        Value::Configuration(c) => Some(Value::from_json(c.data())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn conv(v: impl Into<Value>, repr: Representation) -> Option<Value> {
        StandardConverter.convert(&v.into(), repr)
    }

    #[test]
    fn strings_to_scalars() {
        assert_eq!(conv("42", Representation::Number), Some(Value::from(42)));
        assert_eq!(conv(" 2.5 ", Representation::Number), Some(Value::from(2.5)));
        assert_eq!(conv("nope", Representation::Number), None);
        assert_eq!(conv("yes", Representation::Boolean), Some(Value::Bool(true)));
        assert_eq!(conv("off", Representation::Boolean), Some(Value::Bool(false)));
        assert_eq!(conv("maybe", Representation::Boolean), None);
    }

    #[test]
    fn scalars_to_strings() {
        assert_eq!(conv(42, Representation::String), Some(Value::from("42")));
        assert_eq!(conv(false, Representation::String), Some(Value::from("false")));
        assert_eq!(conv(Value::Null, Representation::String), None);
    }

    #[test]
    fn dates() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).single();
        let as_date = |v: Option<Value>| match v {
            Some(Value::Date(d)) => Some(d),
            _ => None,
        };
        assert_eq!(as_date(conv("2024-03-01", Representation::Date)), expected);
        assert_eq!(
            as_date(conv("2024-03-01T00:00:00Z", Representation::Date)),
            expected
        );
        let secs = expected.map(|d| d.timestamp()).unwrap_or_default();
        assert_eq!(as_date(conv(secs, Representation::Date)), expected);
    }

    #[test]
    fn binary_and_urls() {
        assert_eq!(
            conv("aGk=", Representation::Binary),
            Some(Value::Binary(b"hi".to_vec()))
        );
        match conv("named:db#pool", Representation::Url) {
            Some(Value::Uri(u)) => assert_eq!(u.fragment(), Some("pool")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(conv("not a uri", Representation::Url), None);
        assert_eq!(conv("x", Representation::Image), None);
    }

    #[test]
    fn parse_names() {
        for repr in Representation::ALL {
            assert_eq!(repr.as_str().parse::<Representation>(), Ok(repr));
        }
        assert_eq!("JSON".parse::<Representation>(), Ok(Representation::Data));
        assert!("pixels".parse::<Representation>().is_err());
    }
}
