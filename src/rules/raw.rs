//! Raw, untyped rule nodes as they come out of configuration storage

use serde::{Deserialize, Deserializer};

/// One rule set exactly as configured: every field is an optional string.
///
/// Integers and booleans written natively in TOML are accepted and kept in
/// their string form, so `max_width = 1024` and `max_width = "1024"` are the
/// same node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize)]
pub struct RawRuleNode {
    /// Display label, irrelevant to matching
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,

    /// Comma-separated group identifiers
    #[serde(default, deserialize_with = "lenient_string")]
    pub usergroup: Option<String>,

    /// Comma-separated directory patterns (`*` and `**` segments allowed)
    #[serde(default, deserialize_with = "lenient_string")]
    pub directories: Option<String>,

    /// Comma-separated file extensions without the dot
    #[serde(default, deserialize_with = "lenient_string")]
    pub file_types: Option<String>,

    /// Size threshold in bytes, or with a `K` / `M` suffix
    #[serde(default, deserialize_with = "lenient_string")]
    pub threshold: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub max_width: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub max_height: Option<String>,

    /// `"1"` keeps metadata, anything else strips it
    #[serde(default, deserialize_with = "lenient_string")]
    pub keep_metadata: Option<String>,

    /// `"1"` enables auto-orientation
    #[serde(default, deserialize_with = "lenient_string")]
    pub auto_orient: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LenientValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<LenientValue>::deserialize(deserializer)?;
    Ok(value.map(|v| match v {
        LenientValue::Str(s) => s,
        LenientValue::Int(i) => i.to_string(),
        LenientValue::Float(f) => f.to_string(),
        LenientValue::Bool(true) => "1".to_string(),
        LenientValue::Bool(false) => "0".to_string(),
    }))
}
