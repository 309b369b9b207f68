//! Runtime job values bound to tool inputs for one invocation.
//!
//! Job documents are decoded into [`JobValue`] exactly once. File and
//! directory objects (`{"class": "File", "path": ...}`) become an explicit
//! [`JobValue::File`] variant at that boundary so renderers never have to
//! inspect mappings for `path`/`location` keys.

use std::borrow::Cow;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};

/// Class of a file-system reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileClass {
    File,
    Directory,
}

impl FileClass {
    pub fn as_str(self) -> &'static str {
        match self {
            FileClass::File => "File",
            FileClass::Directory => "Directory",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "File" => Some(FileClass::File),
            "Directory" => Some(FileClass::Directory),
            _ => None,
        }
    }
}

/// A value carrying a path or storage-location identity.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRef {
    pub class: FileClass,
    pub path: Option<String>,
    pub location: Option<String>,
    /// Remaining attributes (`basename`, `secondaryFiles`, ...), visible to expressions.
    pub extra: IndexMap<String, JobValue>,
}

impl FileRef {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            class: FileClass::File,
            path: Some(path.into()),
            location: None,
            extra: IndexMap::new(),
        }
    }

    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            class: FileClass::Directory,
            ..Self::file(path)
        }
    }

    /// Identity placed on the command line: `path`, else `location`.
    pub fn identity(&self) -> &str {
        self.path
            .as_deref()
            .or(self.location.as_deref())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Number(Number),
    Bool(bool),
}

/// Tagged runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum JobValue {
    #[default]
    Null,
    Scalar(Scalar),
    File(FileRef),
    Sequence(Vec<JobValue>),
    Mapping(IndexMap<String, JobValue>),
}

impl JobValue {
    pub fn string(value: impl Into<String>) -> Self {
        JobValue::Scalar(Scalar::String(value.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, JobValue::Null)
    }

    /// Look up a mapping key, or a sequence index when `key` parses as one.
    pub fn get(&self, key: &str) -> Option<&JobValue> {
        match self {
            JobValue::Mapping(map) => map.get(key),
            JobValue::Sequence(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Truthiness used for flags and redirections: `null`, `false`, `0` and
    /// the empty string are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            JobValue::Null => false,
            JobValue::Scalar(Scalar::Bool(b)) => *b,
            JobValue::Scalar(Scalar::String(s)) => !s.is_empty(),
            JobValue::Scalar(Scalar::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
            JobValue::File(_) | JobValue::Sequence(_) | JobValue::Mapping(_) => true,
        }
    }

    /// Substitute a file reference by its identity string. One level only:
    /// elements of sequences and mappings are left untouched.
    pub fn unwrap_file(&self) -> Cow<'_, JobValue> {
        match self {
            JobValue::File(file) => Cow::Owned(JobValue::string(file.identity())),
            other => Cow::Borrowed(other),
        }
    }

    /// Text of this value as it appears on a command line.
    pub fn to_text(&self) -> String {
        match self {
            JobValue::Null => "null".to_string(),
            JobValue::Scalar(Scalar::String(s)) => s.clone(),
            JobValue::Scalar(Scalar::Number(n)) => number_text(n),
            JobValue::Scalar(Scalar::Bool(b)) => b.to_string(),
            JobValue::File(file) => file.identity().to_string(),
            JobValue::Sequence(items) => items
                .iter()
                .map(JobValue::to_text)
                .collect::<Vec<_>>()
                .join(","),
            JobValue::Mapping(_) => self.to_json().to_string(),
        }
    }

    /// Short name of the value's shape, for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            JobValue::Null => "null",
            JobValue::Scalar(Scalar::String(_)) => "string",
            JobValue::Scalar(Scalar::Number(_)) => "number",
            JobValue::Scalar(Scalar::Bool(_)) => "boolean",
            JobValue::File(file) => file.class.as_str(),
            JobValue::Sequence(_) => "array",
            JobValue::Mapping(_) => "object",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            JobValue::Null => Value::Null,
            JobValue::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            JobValue::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            JobValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            JobValue::File(file) => {
                let mut map = Map::new();
                map.insert("class".to_string(), Value::from(file.class.as_str()));
                if let Some(path) = &file.path {
                    map.insert("path".to_string(), Value::from(path.as_str()));
                }
                if let Some(location) = &file.location {
                    map.insert("location".to_string(), Value::from(location.as_str()));
                }
                for (key, value) in &file.extra {
                    map.insert(key.clone(), value.to_json());
                }
                Value::Object(map)
            }
            JobValue::Sequence(items) => {
                Value::Array(items.iter().map(JobValue::to_json).collect())
            }
            JobValue::Mapping(map) => Value::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for JobValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => JobValue::Null,
            Value::Bool(b) => JobValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => JobValue::Scalar(Scalar::Number(n)),
            Value::String(s) => JobValue::Scalar(Scalar::String(s)),
            Value::Array(items) => {
                JobValue::Sequence(items.into_iter().map(JobValue::from).collect())
            }
            Value::Object(map) => decode_object(map),
        }
    }
}

/// Integral floats print without a fraction, so `2.0` renders as `2`.
fn number_text(n: &Number) -> String {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e21 => {
            if f == 0.0 {
                "0".to_string()
            } else {
                format!("{f:.0}")
            }
        }
        _ => n.to_string(),
    }
}

fn decode_object(mut map: Map<String, Value>) -> JobValue {
    let class = map
        .get("class")
        .and_then(Value::as_str)
        .and_then(FileClass::parse);
    let has_identity = ["path", "location"]
        .iter()
        .any(|key| map.get(*key).is_some_and(Value::is_string));
    match class {
        Some(class) if has_identity => {
            map.remove("class");
            let path = take_string(&mut map, "path");
            let location = take_string(&mut map, "location");
            JobValue::File(FileRef {
                class,
                path,
                location,
                extra: map
                    .into_iter()
                    .map(|(key, value)| (key, JobValue::from(value)))
                    .collect(),
            })
        }
        _ => JobValue::Mapping(
            map.into_iter()
                .map(|(key, value)| (key, JobValue::from(value)))
                .collect(),
        ),
    }
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) => Some(s),
        _ => None,
    }
}

impl From<&str> for JobValue {
    fn from(value: &str) -> Self {
        JobValue::string(value)
    }
}

impl From<bool> for JobValue {
    fn from(value: bool) -> Self {
        JobValue::Scalar(Scalar::Bool(value))
    }
}

impl From<i64> for JobValue {
    fn from(value: i64) -> Self {
        JobValue::Scalar(Scalar::Number(Number::from(value)))
    }
}

impl From<FileRef> for JobValue {
    fn from(value: FileRef) -> Self {
        JobValue::File(value)
    }
}

impl Serialize for JobValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JobValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(JobValue::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn file_objects_decode_to_file_refs() {
        let value = JobValue::from(json!({
            "class": "File",
            "path": "/data/reads.fq",
            "basename": "reads.fq"
        }));
        let JobValue::File(file) = &value else {
            panic!("expected file ref, got {:?}", value);
        };
        assert_eq!(file.identity(), "/data/reads.fq");
        assert_eq!(
            file.extra.get("basename"),
            Some(&JobValue::from("reads.fq"))
        );
    }

    #[test]
    fn location_is_used_when_path_is_missing() {
        let value = JobValue::from(json!({"class": "Directory", "location": "s3://bucket/dir"}));
        assert_eq!(value.to_text(), "s3://bucket/dir");
        assert_eq!(value.kind_name(), "Directory");
    }

    #[test]
    fn objects_without_file_class_stay_mappings() {
        let value = JobValue::from(json!({"path": "not-a-file", "n": 1}));
        assert!(matches!(value, JobValue::Mapping(_)));
    }

    #[test]
    fn unwrap_file_is_one_level() {
        let nested = JobValue::Sequence(vec![FileRef::file("a.txt").into()]);
        assert_eq!(nested.unwrap_file().as_ref(), &nested);
        let file = JobValue::from(FileRef::file("a.txt"));
        assert_eq!(file.unwrap_file().as_ref(), &JobValue::from("a.txt"));
    }

    #[test]
    fn truthiness_follows_flag_semantics() {
        assert!(!JobValue::Null.is_truthy());
        assert!(!JobValue::from(false).is_truthy());
        assert!(!JobValue::from(0).is_truthy());
        assert!(!JobValue::from("").is_truthy());
        assert!(JobValue::from("x").is_truthy());
        assert!(JobValue::Sequence(Vec::new()).is_truthy());
    }

    #[test]
    fn integral_floats_render_without_fraction() {
        assert_eq!(JobValue::from(json!(2.0)).to_text(), "2");
        assert_eq!(JobValue::from(json!(-0.0)).to_text(), "0");
        assert_eq!(JobValue::from(json!(2.5)).to_text(), "2.5");
        assert_eq!(JobValue::from(json!(7)).to_text(), "7");
    }

    #[test]
    fn get_indexes_sequences_and_mappings() {
        let value = JobValue::from(json!({"xs": ["a", "b"]}));
        let xs = value.get("xs").expect("xs");
        assert_eq!(xs.get("1"), Some(&JobValue::from("b")));
        assert_eq!(xs.get("nope"), None);
    }
}
