//! JSON-lines feed decoding.
//!
//! Each line is one complete snapshot: an array of `{x, y, z, state}`
//! messages. Unknown state labels are logged and dropped here so the engine
//! only ever sees known states.

use anyhow::Context;
use serde::Deserialize;
use voxstream_common::{VoxelKey, VoxelState};
use voxstream_engine::ChangeSet;

#[derive(Debug, Deserialize)]
struct FeedMessage {
    x: i32,
    y: i32,
    z: i32,
    state: String,
}

/// A decoded snapshot and the number of messages dropped from it.
#[derive(Debug, Default)]
pub struct DecodedSnapshot {
    pub changes: ChangeSet,
    pub dropped: usize,
}

pub fn decode_line(line: &str) -> anyhow::Result<DecodedSnapshot> {
    let messages: Vec<FeedMessage> =
        serde_json::from_str(line).context("feed line is not an array of voxel messages")?;
    let mut snapshot = DecodedSnapshot::default();
    for msg in messages {
        let key = VoxelKey::new(msg.x, msg.y, msg.z);
        match msg.state.parse::<VoxelState>() {
            Ok(state) => {
                snapshot.changes.insert(key, state);
            }
            Err(e) => {
                tracing::warn!(%key, "dropping feed message: {e}");
                snapshot.dropped += 1;
            }
        }
    }
    Ok(snapshot)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_known_states() {
        let line = r#"[{"x":1,"y":2,"z":3,"state":"WALL"},{"x":0,"y":0,"z":0,"state":"CURRENT_POSITION"}]"#;
        let snapshot = decode_line(line).unwrap();
        assert_eq!(snapshot.dropped, 0);
        assert_eq!(snapshot.changes.len(), 2);
        assert_eq!(snapshot.changes[&VoxelKey::new(1, 2, 3)], VoxelState::Wall);
        assert_eq!(
            snapshot.changes[&VoxelKey::new(0, 0, 0)],
            VoxelState::CurrentPosition
        );
    }

    #[test]
    fn unknown_labels_are_dropped() {
        let line = r#"[{"x":1,"y":0,"z":0,"state":"LAVA"},{"x":2,"y":0,"z":0,"state":"WALKABLE"}]"#;
        let snapshot = decode_line(line).unwrap();
        assert_eq!(snapshot.dropped, 1);
        assert_eq!(snapshot.changes.len(), 1);
        assert!(!snapshot.changes.contains_key(&VoxelKey::new(1, 0, 0)));
    }

    #[test]
    fn empty_array_is_an_empty_snapshot() {
        let snapshot = decode_line("[]").unwrap();
        assert!(snapshot.changes.is_empty());
    }

    #[test]
    fn malformed_line_is_an_error() {
        assert!(decode_line(r#"{"x":1}"#).is_err());
        assert!(decode_line(r#"[{"x":1,"y":2,"state":"WALL"}]"#).is_err());
    }
}
