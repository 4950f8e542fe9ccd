use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use voxstream_common::{VoxelKey, VoxelState};

/// One complete snapshot of voxel state from the feed.
pub type ChangeSet = HashMap<VoxelKey, VoxelState>;

/// Cloneable sender for feeding snapshots from another thread.
///
/// The engine applies the newest snapshot queued since its last frame and
/// discards the older ones. After the engine is disposed every send is
/// a no-op.
#[derive(Debug, Clone)]
pub struct FeedHandle {
    tx: Sender<ChangeSet>,
}

impl FeedHandle {
    /// A handle whose sends go nowhere.
    pub(crate) fn detached() -> Self {
        let (tx, _) = crossbeam_channel::unbounded();
        Self { tx }
    }

    /// Queue a snapshot. Returns `false` when the engine is gone.
    pub fn apply_changes(&self, changes: ChangeSet) -> bool {
        match self.tx.try_send(changes) {
            Ok(()) => true,
            Err(TrySendError::Disconnected(_)) => false,
            Err(TrySendError::Full(_)) => {
                tracing::warn!("feed channel full, snapshot dropped");
                false
            }
        }
    }
}

/// Receiving end held by the engine.
#[derive(Debug)]
pub(crate) struct FeedReceiver {
    rx: Receiver<ChangeSet>,
}

impl FeedReceiver {
    pub(crate) fn channel() -> (FeedHandle, Self) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (FeedHandle { tx }, Self { rx })
    }

    /// Newest pending snapshot, discarding any older ones.
    pub(crate) fn latest(&self) -> Option<ChangeSet> {
        let mut skipped = 0usize;
        let mut latest = None;
        for changes in self.rx.try_iter() {
            if latest.replace(changes).is_some() {
                skipped += 1;
            }
        }
        if skipped > 0 {
            tracing::debug!(skipped, "superseded feed snapshots discarded");
        }
        latest
    }
}
