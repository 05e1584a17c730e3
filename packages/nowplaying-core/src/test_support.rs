//! Shared helpers for unit tests.

use std::path::Path;
use std::time::Duration;

use parking_lot::Mutex;

use crate::events::SnapshotEmitter;
use crate::session::SessionSnapshot;

/// Emitter that keeps every snapshot it receives.
#[derive(Default)]
pub(crate) struct RecordingEmitter {
    snapshots: Mutex<Vec<SessionSnapshot>>,
}

impl RecordingEmitter {
    pub fn snapshots(&self) -> Vec<SessionSnapshot> {
        self.snapshots.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.snapshots.lock().len()
    }

    /// Polls until at least `count` snapshots arrived or two seconds passed.
    pub async fn wait_for(&self, count: usize) -> Vec<SessionSnapshot> {
        for _ in 0..200 {
            if self.count() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.snapshots()
    }
}

impl SnapshotEmitter for RecordingEmitter {
    fn emit_snapshot(&self, snapshot: &SessionSnapshot) {
        self.snapshots.lock().push(snapshot.clone());
    }
}

/// Encodes a small solid-colour PNG.
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

/// Writes a small PNG to `path`.
pub(crate) fn write_png(path: &Path) {
    std::fs::write(path, png_bytes(16, 9)).unwrap();
}
