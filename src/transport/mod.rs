pub mod http;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Reserved delta key: the server asks the client to discard all cached
/// state and resync from scratch.
pub const RELOAD_KEY: &str = "page";
/// Reserved delta key: a new event was recorded on the server.
pub const NEW_EVENT_KEY: &str = "new_event";
/// Per-device delta entries are namespaced as `node_<id>`.
pub const NODE_KEY_PREFIX: &str = "node_";
/// Camera slots per device.
pub const IMAGE_SLOTS: usize = 6;

/// Partial state document returned by `GET /update`.
///
/// Only fields that changed since the previous poll are present. Absent
/// keys mean "unchanged", never "cleared".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateDelta(pub Map<String, Value>);

impl StateDelta {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// True when the server requested a full resync.
    pub fn reload_requested(&self) -> bool {
        self.0.get(RELOAD_KEY).map(truthy).unwrap_or(false)
    }

    pub fn has_new_event(&self) -> bool {
        self.0.get(NEW_EVENT_KEY).map(truthy).unwrap_or(false)
    }

    /// Iterate the per-device entries, yielding `(node_id, fields)`.
    /// A `node_` key whose value is not an object is skipped.
    pub fn nodes<'a>(&'a self) -> impl Iterator<Item = (&'a str, NodeDelta<'a>)> + 'a {
        self.0.iter().filter_map(|(key, value)| {
            let id = key.strip_prefix(NODE_KEY_PREFIX)?;
            let fields = value.as_object()?;
            Some((id, NodeDelta { fields }))
        })
    }
}

// The server marks signals with `true`, but any non-empty value counts.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        _ => true,
    }
}

/// Borrowed view over one `node_<id>` delta entry.
#[derive(Debug, Clone, Copy)]
pub struct NodeDelta<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> NodeDelta<'a> {
    /// File path for camera slot `cam`, when that slot changed.
    pub fn image_slot(&self, cam: usize) -> Option<&'a str> {
        self.fields.get(&format!("current_image_{cam}"))?.as_str()
    }

    /// Server-formatted timestamp of the device's last packet.
    pub fn last_updated(&self) -> Option<&'a str> {
        self.fields.get("last_updated")?.as_str()
    }
}

/// Response body of `POST /data/{subject}`. An empty object means silent
/// success.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CommandResult {
    /// The message to show the user, if the server sent a non-empty one.
    pub fn user_alert(&self) -> Option<&str> {
        self.alert.as_deref().filter(|a| !a.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn delta(value: Value) -> StateDelta {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn node_entries_are_parsed() {
        let d = delta(json!({
            "node_3": {"current_image_0": "a.png", "last_updated": "12:00"},
            "node_7": {"current_image_2": "b.png"},
            "page": false,
        }));

        let nodes: Vec<_> = d.nodes().collect();
        assert_eq!(nodes.len(), 2);

        let (id, fields) = nodes[0];
        assert_eq!(id, "3");
        assert_eq!(fields.image_slot(0), Some("a.png"));
        assert_eq!(fields.image_slot(1), None);
        assert_eq!(fields.last_updated(), Some("12:00"));

        let (id, fields) = nodes[1];
        assert_eq!(id, "7");
        assert_eq!(fields.image_slot(2), Some("b.png"));
        assert_eq!(fields.last_updated(), None);
    }

    #[test]
    fn non_object_node_values_are_skipped() {
        let d = delta(json!({"node_3": "garbage"}));
        assert_eq!(d.nodes().count(), 0);
    }

    #[test]
    fn reload_signal_detection() {
        assert!(delta(json!({"page": true})).reload_requested());
        assert!(!delta(json!({"page": false})).reload_requested());
        assert!(!delta(json!({"page": null})).reload_requested());
        assert!(!delta(json!({})).reload_requested());
        // Servers sometimes send truthy non-booleans
        assert!(delta(json!({"page": 1})).reload_requested());
        assert!(!delta(json!({"page": ""})).reload_requested());
    }

    #[test]
    fn new_event_detection() {
        assert!(delta(json!({"new_event": true})).has_new_event());
        assert!(!delta(json!({"page": true})).has_new_event());
    }

    #[test]
    fn empty_alert_is_not_user_visible() {
        let silent: CommandResult = serde_json::from_str("{}").unwrap();
        assert_eq!(silent.user_alert(), None);

        let empty: CommandResult = serde_json::from_value(json!({"alert": ""})).unwrap();
        assert_eq!(empty.user_alert(), None);

        let loud: CommandResult =
            serde_json::from_value(json!({"alert": "Invalid Route"})).unwrap();
        assert_eq!(loud.user_alert(), Some("Invalid Route"));
    }

    #[test]
    fn unknown_result_fields_are_preserved() {
        let res: CommandResult =
            serde_json::from_value(json!({"alert": "x", "queued": 2})).unwrap();
        assert_eq!(res.extra.get("queued"), Some(&json!(2)));
    }
}
