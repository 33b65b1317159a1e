// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit query parsing for the boundary surface.

use aether_core::{AuditEventType, AuditQuery, Pid};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("unknown query key: {0}")]
    UnknownKey(String),
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, QueryError> {
    value.parse().map_err(|_| QueryError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Build an [`AuditQuery`] from decoded key/value pairs.
///
/// Recognized keys: `pid`, `uid`, `action`, `event_type`, `start_ms`,
/// `end_ms`, `limit`, `offset`. Unknown keys are an error so callers get a
/// diagnosable 4xx instead of a silently unfiltered query.
pub fn parse_audit_query<'a>(
    pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Result<AuditQuery, QueryError> {
    let mut query = AuditQuery::default();
    for (key, value) in pairs {
        match key {
            "pid" => query.pid = Some(Pid(parse_num(key, value)?)),
            "uid" => query.uid = Some(value.to_string()),
            "action" => query.action = Some(value.to_string()),
            "event_type" => {
                query.event_type = Some(match value {
                    "tool.invocation" => AuditEventType::ToolInvocation,
                    "auth" => AuditEventType::Auth,
                    "admin" => AuditEventType::Admin,
                    "resource" => AuditEventType::Resource,
                    other => {
                        return Err(QueryError::InvalidValue {
                            key: key.to_string(),
                            value: other.to_string(),
                        })
                    }
                })
            }
            "start_ms" => query.start_ms = Some(parse_num(key, value)?),
            "end_ms" => query.end_ms = Some(parse_num(key, value)?),
            "limit" => query.limit = parse_num(key, value)?,
            "offset" => query.offset = parse_num(key, value)?,
            other => return Err(QueryError::UnknownKey(other.to_string())),
        }
    }
    Ok(query)
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
