//! SQL template rendering.
//!
//! A template is plain SQL with `${name}` placeholders. Rendering runs in two
//! passes:
//!
//! 1. The reserved placeholders `${payload}`, `${topic}`, `${table}` and
//!    `${database}` are replaced literally, whatever the payload holds.
//! 2. If the raw payload parses as a JSON object, every remaining
//!    placeholder whose name is a field of that object is replaced by the
//!    field's value. Reserved names are skipped, unknown names are left as
//!    they are.
//!
//! Rendering is pure and never fails: malformed payloads skip the second
//! pass, and malformed placeholders stay verbatim.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};

/// Placeholder names substituted in the first pass.
pub const RESERVED_PLACEHOLDERS: &[&str] = &["payload", "topic", "table", "database"];

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([^}]+)\}").expect("placeholder pattern is valid")
});

/// Renders `template` for one message.
///
/// # Examples
///
/// ```
/// use sensor_bridge::template::render;
///
/// let sql = render(
///     "INSERT INTO ${table} VALUES (${co2})",
///     "sensors/air",
///     r#"{"co2":400}"#,
///     "air",
///     "power",
/// );
/// assert_eq!(sql, "INSERT INTO air VALUES (400)");
/// ```
pub fn render(template: &str, topic: &str, raw_payload: &str, table: &str, database: &str) -> String {
    let substituted = substitute_reserved(template, topic, raw_payload, table, database);

    match parse_record(raw_payload) {
        Some(record) => substitute_fields(&substituted, &record),
        None => {
            log::debug!("Payload is not a JSON object, field placeholders left unresolved");
            substituted
        }
    }
}

fn substitute_reserved(
    template: &str,
    topic: &str,
    raw_payload: &str,
    table: &str,
    database: &str,
) -> String {
    template
        .replace("${payload}", raw_payload)
        .replace("${topic}", topic)
        .replace("${table}", table)
        .replace("${database}", database)
}

/// Parses the payload as a structured record (a JSON object).
pub fn parse_record(raw_payload: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw_payload) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

fn substitute_fields(text: &str, record: &Map<String, Value>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            let name = &caps[1];
            if RESERVED_PLACEHOLDERS.contains(&name) {
                return caps[0].to_string();
            }
            match record.get(name) {
                Some(value) => stringify(value),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Text form of a JSON value as it appears inside a rendered statement.
///
/// Strings are inserted without quotes so templates control quoting;
/// everything else uses its JSON text.
pub fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
