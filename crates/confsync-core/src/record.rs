use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// On-disk and on-wire representation of a record's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Format {
    Json,
    Yaml,
    Script,
}

impl Default for Format {
    fn default() -> Self {
        Self::Json
    }
}

impl Format {
    /// Infer the format from a file extension, with or without the leading dot.
    ///
    /// Anything that is not YAML or a script is treated as JSON.
    pub fn from_extension(ext: &str) -> Self {
        let ext = ext.strip_prefix('.').unwrap_or(ext);
        if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") {
            Self::Yaml
        } else if ext.eq_ignore_ascii_case("js") {
            Self::Script
        } else {
            Self::Json
        }
    }

    /// Extension (with leading dot) used when writing a record of this format.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => ".json",
            Self::Yaml => ".yaml",
            Self::Script => ".js",
        }
    }
}

/// Value carried by a record.
///
/// JSON values are kept structured; YAML and script values stay raw text so
/// the remote store sees exactly what was on disk.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Json(serde_json::Value),
    Yaml(String),
    Script(String),
}

impl RecordValue {
    pub fn format(&self) -> Format {
        match self {
            Self::Json(_) => Format::Json,
            Self::Yaml(_) => Format::Yaml,
            Self::Script(_) => Format::Script,
        }
    }

    /// Raw text for YAML and script values, `None` for JSON.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Yaml(text) | Self::Script(text) => Some(text),
        }
    }

    /// Rebuild a value from the shape stored in a document collection:
    /// the stored value plus its `js`/`yaml` flags.
    ///
    /// A YAML entry stored pre-parsed is rendered back to YAML text.
    pub fn from_stored(value: serde_json::Value, js: bool, yaml: bool) -> Self {
        if yaml {
            match value {
                serde_json::Value::String(text) => Self::Yaml(text),
                other => Self::Yaml(serde_yaml::to_string(&other).unwrap_or_default()),
            }
        } else if js {
            match value {
                serde_json::Value::String(text) => Self::Script(text),
                other => Self::Script(other.to_string()),
            }
        } else {
            Self::Json(value)
        }
    }

    /// Value as stored remotely: structured for JSON, a string otherwise.
    pub fn to_stored(&self) -> serde_json::Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Yaml(text) | Self::Script(text) => serde_json::Value::String(text.clone()),
        }
    }
}

/// One unit of configuration, exchanged between local files and remote stores.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: String,
    pub value: RecordValue,
    /// Set by the backend at write time; `None` for records decoded from files.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new(key: impl Into<String>, value: RecordValue) -> Self {
        Self {
            key: key.into(),
            value,
            updated_at: None,
        }
    }

    pub fn json(key: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(key, RecordValue::Json(value))
    }

    pub fn yaml(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(key, RecordValue::Yaml(text.into()))
    }

    pub fn script(key: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(key, RecordValue::Script(text.into()))
    }

    pub fn format(&self) -> Format {
        self.value.format()
    }

    /// File name this record is written to.
    pub fn file_name(&self) -> String {
        format!("{}{}", self.key, self.format().extension())
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(Format::from_extension(".yaml"), Format::Yaml);
        assert_eq!(Format::from_extension(".yml"), Format::Yaml);
        assert_eq!(Format::from_extension("YML"), Format::Yaml);
        assert_eq!(Format::from_extension(".js"), Format::Script);
        assert_eq!(Format::from_extension(".json"), Format::Json);
        assert_eq!(Format::from_extension(".txt"), Format::Json);
        assert_eq!(Format::from_extension(""), Format::Json);
    }

    #[test]
    fn test_extension_is_inverse_of_inference() {
        for format in [Format::Json, Format::Yaml, Format::Script] {
            assert_eq!(Format::from_extension(format.extension()), format);
        }
    }

    #[test]
    fn test_file_name() {
        assert_eq!(Record::json("a", json!({"x": 1})).file_name(), "a.json");
        assert_eq!(Record::yaml("b", "x: 1").file_name(), "b.yaml");
        assert_eq!(Record::script("c", "console.log(1)").file_name(), "c.js");
    }

    #[test]
    fn test_from_stored_flags() {
        assert_eq!(
            RecordValue::from_stored(json!("x: 1"), false, true),
            RecordValue::Yaml("x: 1".into())
        );
        assert_eq!(
            RecordValue::from_stored(json!("console.log(1)"), true, false),
            RecordValue::Script("console.log(1)".into())
        );
        assert_eq!(
            RecordValue::from_stored(json!({"x": 1}), false, false),
            RecordValue::Json(json!({"x": 1}))
        );
    }

    #[test]
    fn test_from_stored_preparsed_yaml() {
        let value = RecordValue::from_stored(json!({"x": 1}), false, true);
        let RecordValue::Yaml(text) = value else {
            panic!("expected YAML value");
        };
        let parsed: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(parsed, serde_yaml::from_str::<serde_yaml::Value>("x: 1").unwrap());
    }

    #[test]
    fn test_to_stored() {
        assert_eq!(Record::yaml("b", "x: 1").value.to_stored(), json!("x: 1"));
        assert_eq!(
            Record::json("a", json!({"x": 1})).value.to_stored(),
            json!({"x": 1})
        );
    }
}
