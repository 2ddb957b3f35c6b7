//! Batched-mode record construction.
//!
//! Turns one inbound message into a [`BufferedRecord`]: the configured batch
//! columns, the first of which receives the timestamp, filled from the
//! payload's fields.
//!
//! Missing fields are written as `NULL` unless fabrication is switched on, in
//! which case a random value from the field's plausible range is used.

use std::sync::LazyLock;

use chrono::Utc;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};

use crate::batch::BufferedRecord;
use crate::config::{
    Config, FABRICATED_DEFAULT_RANGE, FABRICATED_FIELD_RANGES, RAW_VALUE_FIELD, TIMESTAMP_FIELD,
};
use crate::error_handling::RecordError;
use crate::source::InboundMessage;
use crate::storage::insert::{sql_literal, value_tuple};
use crate::template::{parse_record, render};

/// Table names accepted after rendering: an identifier, optionally
/// qualified with a database prefix.
static TABLE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
        .expect("table name pattern is valid")
});

/// Payload fields of one message. Non-JSON payloads become
/// `{"value": <payload>}`.
pub fn payload_fields(raw_payload: &str) -> Map<String, Value> {
    parse_record(raw_payload).unwrap_or_else(|| {
        let mut fields = Map::new();
        fields.insert(
            RAW_VALUE_FIELD.to_string(),
            Value::String(raw_payload.to_string()),
        );
        fields
    })
}

/// Random value in the plausible range of `field`.
pub fn fabricated_value(field: &str) -> i64 {
    let (low, high) = FABRICATED_FIELD_RANGES
        .iter()
        .find(|(name, _, _)| *name == field)
        .map(|(_, low, high)| (*low, *high))
        .unwrap_or(FABRICATED_DEFAULT_RANGE);
    rand::rng().random_range(low..high)
}

/// Builds buffered records from messages.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    table: String,
    database: String,
    columns: Vec<String>,
    fabricate: bool,
}

impl RecordBuilder {
    pub fn new(table: &str, database: &str, columns: Vec<String>, fabricate: bool) -> Self {
        RecordBuilder {
            table: table.to_string(),
            database: database.to_string(),
            columns,
            fabricate,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.table,
            &config.database,
            config.batch_columns.clone(),
            config.fabricate_missing_fields,
        )
    }

    /// Target table for `msg`. The configured table may reference the topic or
    /// payload fields, e.g. `sensor_${device}`; the result must be a plain
    /// identifier.
    pub fn table_for(&self, msg: &InboundMessage) -> Result<String, RecordError> {
        let table = render(&self.table, &msg.topic, &msg.payload_str(), "", &self.database);
        let table = table.trim();
        if table.is_empty() {
            return Err(RecordError::EmptyTable);
        }
        if table.contains("${") {
            return Err(RecordError::UnresolvedTable(table.to_string()));
        }
        if !TABLE_NAME.is_match(table) {
            return Err(RecordError::InvalidTable(table.to_string()));
        }
        Ok(table.to_string())
    }

    pub fn build(&self, msg: &InboundMessage) -> Result<BufferedRecord, RecordError> {
        let table = self.table_for(msg)?;
        let fields = payload_fields(&msg.payload_str());

        let mut literals = Vec::with_capacity(self.columns.len());
        for (index, column) in self.columns.iter().enumerate() {
            let value = if index == 0 {
                fields.get(TIMESTAMP_FIELD)
            } else {
                fields.get(column)
            };
            let literal = match value {
                Some(value) if !value.is_null() => sql_literal(value),
                _ if index == 0 => Utc::now().timestamp_millis().to_string(),
                _ if self.fabricate => fabricated_value(column).to_string(),
                _ => "NULL".to_string(),
            };
            literals.push(literal);
        }

        Ok(BufferedRecord::new(
            table,
            self.columns.clone(),
            value_tuple(&literals),
        ))
    }
}
