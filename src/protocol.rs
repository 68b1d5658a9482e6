//! Wire shape of the shared registry records.
//!
//! Every type here produces JSON matching the registry's storage layout:
//!
//! ```text
//! hotspot_list/<code>: {
//!   "display_name": "7",
//!   "updated_at_timestamp": 1718029440123,
//!   "hosted_anchor_id": "cid-..."   // present only after hosting succeeds
//! }
//! last_room_code: 7                  // global atomic counter
//! ```
//!
//! `hosted_anchor_id` is omitted from serialization while absent so that a
//! freshly created room record never carries the field, and deserialization
//! tolerates its absence.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque identifier returned by the perception subsystem after hosting.
pub type CloudAnchorId = String;

/// Registry key prefix under which room records live.
pub const ROOM_LIST_KEY: &str = "hotspot_list";

/// Registry key of the global room-code counter.
pub const ROOM_COUNTER_KEY: &str = "last_room_code";

/// Returns the full registry path of a room record.
pub fn room_path(code: &str) -> String {
    format!("{ROOM_LIST_KEY}/{code}")
}

/// Milliseconds since the Unix epoch, as stored in `updated_at_timestamp`.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// A room record as stored in the shared registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomRecord {
    /// Human-readable copy of the room code, set at creation.
    pub display_name: String,
    /// Last-write time in milliseconds since the Unix epoch. Updated on
    /// creation and on anchor publication.
    pub updated_at_timestamp: i64,
    /// Cloud anchor id published by the hosting client. Transitions from
    /// absent to present at most once and is never modified afterward.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hosted_anchor_id: Option<CloudAnchorId>,
}

impl RoomRecord {
    /// Create the initial record for a freshly allocated room code.
    pub fn new(code: &str, timestamp_ms: i64) -> Self {
        Self {
            display_name: code.to_owned(),
            updated_at_timestamp: timestamp_ms,
            hosted_anchor_id: None,
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn initial_record_omits_hosted_anchor_id() {
        let record = RoomRecord::new("7", 1_718_029_440_123);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "display_name": "7",
                "updated_at_timestamp": 1_718_029_440_123_i64,
            })
        );
    }

    #[test]
    fn published_record_carries_hosted_anchor_id() {
        let mut record = RoomRecord::new("7", 1);
        record.hosted_anchor_id = Some("cid-123".into());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["hosted_anchor_id"], "cid-123");
    }

    #[test]
    fn deserializes_record_without_anchor_field() {
        let record: RoomRecord = serde_json::from_str(
            r#"{"display_name":"42","updated_at_timestamp":9}"#,
        )
        .unwrap();
        assert_eq!(record.display_name, "42");
        assert!(record.hosted_anchor_id.is_none());
    }

    #[test]
    fn room_path_nests_under_hotspot_list() {
        assert_eq!(room_path("7"), "hotspot_list/7");
    }
}
