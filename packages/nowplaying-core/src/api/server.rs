//! TCP broadcast server.
//!
//! Accepts subscriber connections and runs one task per subscriber that
//! writes queued frames and drains (and discards) whatever the subscriber
//! sends, which is how a disconnect is noticed.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::SinkExt;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;

use crate::api::frame::frame_codec;
use crate::api::subscribers::SubscriberRegistry;
use crate::protocol_constants::SUBSCRIBER_READ_BUF;

/// Listening socket plus the registry it serves.
pub struct BroadcastServer {
    listener: TcpListener,
    registry: Arc<SubscriberRegistry>,
}

impl BroadcastServer {
    /// Binds the listening socket.
    pub async fn bind(addr: &str, registry: Arc<SubscriberRegistry>) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, registry })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts subscribers until `cancel` fires.
    pub async fn run(self, cancel: CancellationToken) {
        match self.local_addr() {
            Ok(addr) => log::info!("[Broadcast] Serving on {}", addr),
            Err(_) => log::info!("[Broadcast] Serving"),
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let registry = Arc::clone(&self.registry);
                        let cancel = cancel.clone();
                        tokio::spawn(async move {
                            handle_subscriber(stream, peer, registry, cancel).await;
                        });
                    }
                    Err(e) => {
                        // Per-connection accept errors (e.g. reset before accept) are not fatal
                        log::warn!("[Broadcast] Accept failed: {}", e);
                    }
                },
            }
        }

        log::info!("[Broadcast] Accept loop stopped");
    }
}

async fn handle_subscriber(
    stream: TcpStream,
    peer: SocketAddr,
    registry: Arc<SubscriberRegistry>,
    cancel: CancellationToken,
) {
    let (guard, mut frames) = registry.register();
    let close = guard.cancel_token().clone();
    log::info!("[Broadcast] Accepted sub-{} from {}", guard.id(), peer);

    let (mut reader, writer) = stream.into_split();
    let mut writer = FramedWrite::new(writer, frame_codec());
    let mut discard = [0u8; SUBSCRIBER_READ_BUF];

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = close.cancelled() => break,
            frame = frames.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.send(frame).await {
                    log::warn!("[Broadcast] Write to {} failed: {}", peer, e);
                    break;
                }
            }
            read = reader.read(&mut discard) => match read {
                Ok(0) => {
                    log::info!("[Broadcast] {} disconnected", peer);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    log::info!("[Broadcast] {} disconnected: {}", peer, e);
                    break;
                }
            },
        }
    }

    drop(guard);
    log::debug!("[Broadcast] Closed connection for {}", peer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::frame::decode_payload;
    use crate::session::{PlayerState, SessionRecord, SessionSnapshot};
    use futures::StreamExt;
    use std::time::Duration;
    use tokio::net::tcp::OwnedReadHalf;
    use tokio_util::codec::FramedRead;

    type Frames = FramedRead<OwnedReadHalf, tokio_util::codec::LengthDelimitedCodec>;

    struct Running {
        addr: SocketAddr,
        registry: Arc<SubscriberRegistry>,
        cancel: CancellationToken,
    }

    impl Drop for Running {
        fn drop(&mut self) {
            self.cancel.cancel();
        }
    }

    async fn start() -> Running {
        let registry = Arc::new(SubscriberRegistry::new());
        let server = BroadcastServer::bind("127.0.0.1:0", Arc::clone(&registry))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let cancel = CancellationToken::new();
        tokio::spawn(server.run(cancel.clone()));
        Running {
            addr,
            registry,
            cancel,
        }
    }

    fn snapshot(revision: u64, state: PlayerState, title: Option<&str>) -> SessionSnapshot {
        SessionSnapshot {
            revision,
            record: SessionRecord {
                player_state: state,
                songid: title.map(|t| format!("id-{}", t)),
                title: title.map(str::to_string),
                ..SessionRecord::default()
            },
        }
    }

    async fn connect(running: &Running) -> (Frames, tokio::net::tcp::OwnedWriteHalf) {
        let stream = TcpStream::connect(running.addr).await.unwrap();
        let (read, write) = stream.into_split();
        (FramedRead::new(read, frame_codec()), write)
    }

    async fn next_record(frames: &mut Frames) -> SessionRecord {
        let frame = tokio::time::timeout(Duration::from_secs(2), frames.next())
            .await
            .expect("timed out waiting for frame")
            .expect("connection closed")
            .unwrap();
        decode_payload(&frame).unwrap()
    }

    async fn wait_for_subscribers(registry: &SubscriberRegistry, count: usize) {
        for _ in 0..200 {
            if registry.subscriber_count() == count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} subscribers", count);
    }

    #[tokio::test]
    async fn late_subscriber_receives_exactly_the_current_state() {
        let running = start().await;
        running
            .registry
            .publish(&snapshot(1, PlayerState::Playing, Some("a")));
        running
            .registry
            .publish(&snapshot(2, PlayerState::Playing, Some("b")));
        running
            .registry
            .publish(&snapshot(3, PlayerState::Paused, Some("b")));

        let (mut frames, _write) = connect(&running).await;
        let record = next_record(&mut frames).await;
        assert_eq!(record.player_state, PlayerState::Paused);
        assert_eq!(record.title.as_deref(), Some("b"));

        let extra = tokio::time::timeout(Duration::from_millis(200), frames.next()).await;
        assert!(extra.is_err(), "unexpected second frame");
    }

    #[tokio::test]
    async fn updates_arrive_in_order() {
        let running = start().await;
        let (mut frames, _write) = connect(&running).await;
        wait_for_subscribers(&running.registry, 1).await;

        for (revision, title) in ["x", "y", "z"].iter().enumerate() {
            running.registry.publish(&snapshot(
                revision as u64 + 1,
                PlayerState::Playing,
                Some(*title),
            ));
        }

        for title in ["x", "y", "z"] {
            assert_eq!(next_record(&mut frames).await.title.as_deref(), Some(title));
        }
    }

    #[tokio::test]
    async fn client_bytes_are_ignored() {
        use tokio::io::AsyncWriteExt;

        let running = start().await;
        running
            .registry
            .publish(&snapshot(1, PlayerState::Playing, Some("a")));
        let (mut frames, mut write) = connect(&running).await;
        next_record(&mut frames).await;

        write.write_all(b"hello server").await.unwrap();
        running
            .registry
            .publish(&snapshot(2, PlayerState::Stopped, None));
        assert_eq!(
            next_record(&mut frames).await.player_state,
            PlayerState::Stopped
        );
    }

    #[tokio::test]
    async fn disconnected_subscriber_does_not_block_others() {
        let running = start().await;
        let (gone, gone_write) = connect(&running).await;
        let (mut stays, _write) = connect(&running).await;
        wait_for_subscribers(&running.registry, 2).await;

        drop(gone);
        drop(gone_write);
        wait_for_subscribers(&running.registry, 1).await;

        running
            .registry
            .publish(&snapshot(1, PlayerState::Playing, Some("a")));
        assert_eq!(next_record(&mut stays).await.title.as_deref(), Some("a"));
    }

    #[tokio::test]
    async fn close_all_disconnects_subscribers() {
        let running = start().await;
        let (mut frames, _write) = connect(&running).await;
        wait_for_subscribers(&running.registry, 1).await;

        running.registry.close_all();

        let end = tokio::time::timeout(Duration::from_secs(2), frames.next())
            .await
            .unwrap();
        assert!(end.is_none());
        wait_for_subscribers(&running.registry, 0).await;
    }
}
