//! Scripted demo source for display-client development.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::events::MetadataUpdate;
use crate::session::{PlayerState, SessionReconciler};

/// Source name reported to the reconciler.
pub const MOCK_SOURCE_NAME: &str = "MOCK";

/// One step of the demo script.
#[derive(Debug, Clone, Copy)]
pub struct MockStep {
    pub state: PlayerState,
    pub songid: &'static str,
    pub title: &'static str,
    pub artist: &'static str,
    pub album: &'static str,
}

/// Play, pause, next track, stop.
pub const MOCK_SCRIPT: [MockStep; 4] = [
    MockStep {
        state: PlayerState::Playing,
        songid: "101",
        title: "One More Time",
        artist: "Daft Punk",
        album: "Discovery",
    },
    MockStep {
        state: PlayerState::Paused,
        songid: "101",
        title: "One More Time",
        artist: "Daft Punk",
        album: "Discovery",
    },
    MockStep {
        state: PlayerState::Playing,
        songid: "102",
        title: "Feel Good Inc",
        artist: "Gorillaz",
        album: "Demon Days",
    },
    MockStep {
        state: PlayerState::Stopped,
        songid: "",
        title: "",
        artist: "",
        album: "",
    },
];

/// Cycles through [`MOCK_SCRIPT`] at a fixed interval.
pub struct MockSource {
    reconciler: Arc<SessionReconciler>,
    interval: Duration,
}

impl MockSource {
    pub fn new(reconciler: Arc<SessionReconciler>, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Reports `step` as a metadata event followed by a transport event.
    pub fn apply(&self, step: &MockStep) {
        if step.state != PlayerState::Stopped {
            let fields = MetadataUpdate {
                songid: Some(step.songid.to_string()),
                title: Some(step.title.to_string()),
                artist: Some(step.artist.to_string()),
                album: Some(step.album.to_string()),
                cover_url: None,
            };
            self.reconciler.update_metadata(MOCK_SOURCE_NAME, fields);
        }
        self.reconciler
            .update_transport_state(MOCK_SOURCE_NAME, step.state.as_str());
    }

    /// Applies the first step immediately, then one step per interval.
    pub async fn run(self, cancel: CancellationToken) {
        log::info!("[Mock] Demo source started ({:?} per step)", self.interval);
        let mut ticker = tokio::time::interval(self.interval);

        for step in MOCK_SCRIPT.iter().cycle() {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.apply(step),
            }
        }
        log::info!("[Mock] Demo source stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artwork::ArtCache;
    use crate::events::SnapshotEmitter;
    use crate::runtime::TokioSpawner;
    use crate::session::SessionRecord;
    use crate::state::Config;
    use crate::test_support::RecordingEmitter;
    use reqwest::Client;

    fn reconciler(recorder: &Arc<RecordingEmitter>) -> Arc<SessionReconciler> {
        Arc::new(SessionReconciler::new(
            Arc::new(ArtCache::new(&Config::default(), Client::new())),
            Arc::clone(recorder) as Arc<dyn SnapshotEmitter>,
            TokioSpawner::current(),
        ))
    }

    #[tokio::test]
    async fn one_cycle_broadcasts_each_change_once() {
        let recorder = Arc::new(RecordingEmitter::default());
        let reconciler = reconciler(&recorder);
        let source = MockSource::new(Arc::clone(&reconciler), Duration::from_secs(8));

        for step in &MOCK_SCRIPT {
            source.apply(step);
        }

        let states: Vec<PlayerState> = recorder
            .snapshots()
            .iter()
            .map(|s| s.record.player_state)
            .collect();
        assert_eq!(
            states,
            vec![
                PlayerState::Playing,
                PlayerState::Paused,
                PlayerState::Playing,
                PlayerState::Stopped,
            ]
        );
        assert_eq!(reconciler.snapshot().record, SessionRecord::stopped());
    }

    #[tokio::test(start_paused = true)]
    async fn run_steps_on_the_interval() {
        let recorder = Arc::new(RecordingEmitter::default());
        let source = MockSource::new(reconciler(&recorder), Duration::from_secs(8));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(source.run(cancel.clone()));

        tokio::time::sleep(Duration::from_secs(9)).await;
        cancel.cancel();
        task.await.unwrap();

        let snapshots = recorder.snapshots();
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[1].record.player_state, PlayerState::Paused);
    }
}
