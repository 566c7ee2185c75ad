//! Settings record encoding
//!
//! A feature's rules are stored as one pipe-delimited string:
//!
//! ```text
//! percentage|users|groups|requestParam|data
//! ```
//!
//! `users` and `groups` are comma-joined, `data` is a JSON object. Older
//! writers produced only the first three or four fields; every shape decodes
//! to the same [`Settings`]. Encoding always writes all five fields.

use crate::error::SettingsError;
use serde_json::{Map, Value};
use tracing::warn;

/// Separator between record fields.
pub const FIELD_SEPARATOR: char = '|';

/// Separator between entries of the users and groups fields.
pub const LIST_SEPARATOR: char = ',';

const MAX_FIELDS: usize = 5;

/// Raw fields of a record, tagged by the shape it was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordShape<'a> {
    /// `percentage|users|groups`
    Legacy {
        percentage: &'a str,
        users: &'a str,
        groups: &'a str,
    },
    /// `percentage|users|groups|requestParam`
    WithRequestParam {
        percentage: &'a str,
        users: &'a str,
        groups: &'a str,
        request_param: &'a str,
    },
    /// `percentage|users|groups|requestParam|data`
    Full {
        percentage: &'a str,
        users: &'a str,
        groups: &'a str,
        request_param: &'a str,
        data: &'a str,
    },
}

impl<'a> RecordShape<'a> {
    /// Split a record into one of the supported shapes.
    ///
    /// The data field is last and may itself contain `|`, so at most five
    /// fields are split off.
    pub fn split(record: &'a str) -> Result<Self, SettingsError> {
        let fields: Vec<&'a str> = record.splitn(MAX_FIELDS, FIELD_SEPARATOR).collect();

        match fields[..] {
            [percentage, users, groups] => Ok(Self::Legacy {
                percentage,
                users,
                groups,
            }),
            [percentage, users, groups, request_param] => Ok(Self::WithRequestParam {
                percentage,
                users,
                groups,
                request_param,
            }),
            [percentage, users, groups, request_param, data] => Ok(Self::Full {
                percentage,
                users,
                groups,
                request_param,
                data,
            }),
            _ => Err(SettingsError::TooFewFields(fields.len())),
        }
    }

    /// Legacy shape built from whatever fields a truncated record has.
    fn padded(record: &'a str) -> Self {
        let mut fields = record.splitn(MAX_FIELDS, FIELD_SEPARATOR);
        Self::Legacy {
            percentage: fields.next().unwrap_or(""),
            users: fields.next().unwrap_or(""),
            groups: fields.next().unwrap_or(""),
        }
    }

    fn percentage(&self) -> &'a str {
        match self {
            Self::Legacy { percentage, .. }
            | Self::WithRequestParam { percentage, .. }
            | Self::Full { percentage, .. } => percentage,
        }
    }

    fn users(&self) -> &'a str {
        match self {
            Self::Legacy { users, .. }
            | Self::WithRequestParam { users, .. }
            | Self::Full { users, .. } => users,
        }
    }

    fn groups(&self) -> &'a str {
        match self {
            Self::Legacy { groups, .. }
            | Self::WithRequestParam { groups, .. }
            | Self::Full { groups, .. } => groups,
        }
    }

    fn request_param(&self) -> &'a str {
        match self {
            Self::Legacy { .. } => "",
            Self::WithRequestParam { request_param, .. } | Self::Full { request_param, .. } => {
                request_param
            }
        }
    }

    fn data(&self) -> &'a str {
        match self {
            Self::Full { data, .. } => data,
            _ => "",
        }
    }
}

/// Canonical, decoded rules of one feature.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub percentage: u8,
    pub users: Vec<String>,
    pub groups: Vec<String>,
    pub request_param: String,
    pub data: Map<String, Value>,
}

impl Settings {
    /// Decode a record, rejecting anything malformed.
    pub fn decode_strict(record: &str) -> Result<Self, SettingsError> {
        let shape = RecordShape::split(record)?;

        Ok(Self {
            percentage: decode_percentage(shape.percentage())?,
            users: decode_list(shape.users()),
            groups: decode_list(shape.groups()),
            request_param: shape.request_param().to_string(),
            data: decode_data(shape.data())?,
        })
    }

    /// Decode a record, defaulting every malformed field.
    ///
    /// A non-integer percentage becomes 0, an out-of-range one is clamped,
    /// missing fields are empty and invalid data becomes an empty map. Each
    /// default is logged against `feature`.
    pub fn decode_lenient(feature: &str, record: &str) -> Self {
        let shape = RecordShape::split(record).unwrap_or_else(|err| {
            warn!(feature = %feature, error = %err, "Padding truncated settings record");
            RecordShape::padded(record)
        });

        let percentage = match decode_percentage(shape.percentage()) {
            Ok(p) => p,
            Err(SettingsError::PercentageOutOfRange(value)) => {
                let clamped = value.clamp(0, 100) as u8;
                warn!(feature = %feature, value = value, clamped = clamped, "Clamping stored percentage");
                clamped
            }
            Err(err) => {
                warn!(feature = %feature, error = %err, "Defaulting stored percentage to 0");
                0
            }
        };

        let data = decode_data(shape.data()).unwrap_or_else(|err| {
            warn!(feature = %feature, error = %err, "Defaulting stored data to empty");
            Map::new()
        });

        Self {
            percentage,
            users: decode_list(shape.users()),
            groups: decode_list(shape.groups()),
            request_param: shape.request_param().to_string(),
            data,
        }
    }

    /// Encode as a five-field record.
    pub fn encode(&self) -> String {
        let data = serde_json::to_string(&self.data).unwrap_or_else(|_| "{}".to_string());

        format!(
            "{}|{}|{}|{}|{}",
            self.percentage,
            self.users.join(","),
            self.groups.join(","),
            self.request_param,
            data,
        )
    }
}

/// Check that a users or groups entry decodes back to itself.
///
/// `field` names the entry kind in the error.
pub fn check_list_entry(field: &'static str, entry: &str) -> Result<(), SettingsError> {
    let reason = if entry.is_empty() {
        "is empty"
    } else if entry.contains(LIST_SEPARATOR) {
        "contains ','"
    } else if entry.contains(FIELD_SEPARATOR) {
        "contains '|'"
    } else {
        return Ok(());
    };

    Err(SettingsError::Unencodable {
        field,
        value: entry.to_string(),
        reason,
    })
}

/// Check that a request-param gate decodes back to itself. Empty is allowed.
pub fn check_request_param(request_param: &str) -> Result<(), SettingsError> {
    if request_param.contains(FIELD_SEPARATOR) {
        return Err(SettingsError::Unencodable {
            field: "request param",
            value: request_param.to_string(),
            reason: "contains '|'",
        });
    }
    Ok(())
}

fn decode_percentage(raw: &str) -> Result<u8, SettingsError> {
    let value: i64 = raw
        .trim()
        .parse()
        .map_err(|_| SettingsError::InvalidPercentage(raw.to_string()))?;

    u8::try_from(value)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or(SettingsError::PercentageOutOfRange(value))
}

/// Split a comma-joined list, dropping empty entries and duplicates.
fn decode_list(raw: &str) -> Vec<String> {
    let mut items: Vec<String> = Vec::new();
    for item in raw.split(LIST_SEPARATOR).filter(|s| !s.is_empty()) {
        if !items.iter().any(|existing| existing == item) {
            items.push(item.to_string());
        }
    }
    items
}

fn decode_data(raw: &str) -> Result<Map<String, Value>, SettingsError> {
    if raw.trim().is_empty() {
        return Ok(Map::new());
    }

    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        // Some writers encode an empty map as an empty JSON array.
        Ok(Value::Array(items)) if items.is_empty() => Ok(Map::new()),
        Ok(other) => Err(SettingsError::InvalidData(format!(
            "expected an object, found {}",
            json_kind(&other)
        ))),
        Err(err) => Err(SettingsError::InvalidData(err.to_string())),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
