use chrono::{DateTime, SecondsFormat, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Renders a Kubernetes timestamp as RFC 3339 in UTC. Missing values become
/// an empty string and unparseable ones are passed through untouched.
pub fn normalize_timestamp(ts: Option<&str>) -> String {
    let ts = match ts {
        Some(s) if !s.is_empty() => s,
        _ => return String::new(),
    };

    match DateTime::parse_from_rfc3339(ts) {
        Ok(dt) => dt
            .with_timezone(&Utc)
            .to_rfc3339_opts(SecondsFormat::Secs, true),
        Err(_) => ts.to_string(),
    }
}

/// The object's creation time, normalized as above.
pub fn creation_timestamp(meta: &ObjectMeta) -> String {
    let raw = meta
        .creation_timestamp
        .as_ref()
        .and_then(|t| match serde_json::to_value(t) {
            Ok(serde_json::Value::String(s)) => Some(s),
            _ => None,
        });
    normalize_timestamp(raw.as_deref())
}
