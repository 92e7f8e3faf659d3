use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, atomic::Ordering};

use anyhow::Result;
use async_trait::async_trait;

use tokio::sync::{Mutex, Notify, mpsc};
use tokio::time::{Duration, sleep};

use rand::random_range;

use crate::{metrics::METRICS, schema::RenderFrame, util};

/// Frames buffered per connection before new ones are dropped.
const QUEUE_CAPACITY: usize = 1_024;

const PING_INTERVAL: Duration = Duration::from_secs(30);
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Destination for rendered frames.
///
/// Implementations must not block: rotators call `publish` from inside
/// their state machine and a slow sink would stretch fade timings.
#[async_trait]
pub trait FrameSink: Send + Sync {
    async fn publish(&self, frame: RenderFrame) -> Result<()>;
}

/// Most recent frame per render target.
///
/// The graphics host only receives changes, so a fresh connection would
/// otherwise stay blank until the next change of every target. Shared by
/// the pool (writer) and all its connections (replay on login).
#[derive(Clone, Default)]
pub struct LatestFrames {
    frames: Arc<std::sync::Mutex<HashMap<String, RenderFrame>>>,
}

impl LatestFrames {
    pub fn record(&self, frame: &RenderFrame) {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(frame.key(), frame.clone());
    }

    /// All retained frames, oldest first.
    pub fn snapshot(&self) -> Vec<RenderFrame> {
        let mut frames: Vec<RenderFrame> = self
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        frames.sort_by_key(RenderFrame::timestamp);
        frames
    }
}

/// ============================================================
/// OverlaySender
/// ============================================================
///
/// One persistent WebSocket connection to the graphics host.
///
/// Responsibilities:
/// - Login handshake
/// - Replay the latest frame of every target after login
/// - Drain the frame queue onto the socket
/// - Periodic JSON ping
/// - Reconnect after connection loss
#[derive(Clone)]
pub struct OverlaySender {
    /// Replaced with a fresh channel on every reconnect.
    queue: Arc<Mutex<mpsc::Sender<RenderFrame>>>,
}

impl OverlaySender {
    /// Spawns the reconnect loop and returns immediately.
    ///
    /// Frames queued while disconnected go to a channel whose receiver
    /// is already gone; they are counted as dropped.
    pub fn connect_loop(
        url: String,
        login_msg: String,
        debug: bool,
        latest: LatestFrames,
    ) -> Self {
        let (tx, _) = mpsc::channel::<RenderFrame>(QUEUE_CAPACITY);
        let queue = Arc::new(Mutex::new(tx));

        tokio::spawn({
            let queue = queue.clone();

            async move {
                loop {
                    let (tx, rx) = mpsc::channel::<RenderFrame>(QUEUE_CAPACITY);
                    *queue.lock().await = tx;

                    if let Err(e) =
                        Self::run_connection(&url, &login_msg, debug, rx, &latest).await
                    {
                        log::warn!("overlay connection lost: {e}");
                    }

                    sleep(util::jittered(RECONNECT_DELAY)).await;
                }
            }
        });

        Self { queue }
    }

    /// Runs one connection until it fails or the host closes it.
    ///
    /// The queue is swapped before connecting, so frames published during
    /// the replay arrive after it and may duplicate a replayed frame.
    async fn run_connection(
        url: &str,
        login_msg: &str,
        debug: bool,
        mut rx: mpsc::Receiver<RenderFrame>,
        latest: &LatestFrames,
    ) -> Result<()> {
        let (ws, _) = connect_async(url).await?;
        let (mut write, mut read) = ws.split();

        let closed = Arc::new(Notify::new());

        write.send(Message::Text(login_msg.to_string().into())).await?;
        log::info!("overlay connected to {url}");

        let replay = latest.snapshot();
        log::debug!("replaying {} frames to {url}", replay.len());
        for frame in replay {
            let json = serde_json::to_string(&frame)?;
            write.send(Message::Text(json.into())).await?;
        }

        let mut ping = tokio::time::interval(PING_INTERVAL);

        // Reader: only used to notice EOF
        tokio::spawn({
            let closed = closed.clone();

            async move {
                while let Some(Ok(msg)) = read.next().await {
                    if let Message::Text(text) = msg {
                        if debug {
                            log::debug!("[overlay RECV] {}", text.as_str());
                        }
                    }
                }
                closed.notify_one();
            }
        });

        loop {
            tokio::select! {
                Some(frame) = rx.recv() => {
                    let json = serde_json::to_string(&frame)?;
                    if debug {
                        log::debug!("[overlay SEND] {json}");
                    }
                    write.send(Message::Text(json.into())).await?;
                }

                _ = ping.tick() => {
                    write.send(Message::Text(r#"{"op":"ping"}"#.into())).await?;
                }

                _ = closed.notified() => {
                    return Err(anyhow::anyhow!("graphics host closed connection"));
                }
            }
        }
    }

    /// Queues a frame without waiting.
    ///
    /// A full queue drops the frame (the next frame supersedes it anyway);
    /// a closed queue means the connection is down and is reported.
    fn try_send(&self, frame: RenderFrame) -> Result<()> {
        let Ok(tx) = self.queue.try_lock() else {
            METRICS.dropped_frames.fetch_add(1, Ordering::Relaxed);
            return Ok(());
        };

        match tx.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                METRICS.dropped_frames.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(anyhow::anyhow!("overlay connection down"))
            }
        }
    }
}

/// ============================================================
/// OverlayPool
/// ============================================================
///
/// Several `OverlaySender` connections for redundancy, or none in
/// demo mode where frames are only logged.
#[derive(Clone)]
pub struct OverlayPool {
    senders: Vec<OverlaySender>,
    latest: LatestFrames,
    demo: bool,
}

impl OverlayPool {
    /// LOGIN FORMAT: key=<KEY>&role=graphics
    pub fn new(url: String, key: &str, debug: bool, count: usize, demo: bool) -> Self {
        if demo {
            log::warn!("OverlayPool running in DEMO mode, frames are only logged");
        }

        let latest = LatestFrames::default();
        let senders = if demo {
            Vec::new()
        } else {
            let login = format!("key={key}&role=graphics");
            (0..count)
                .map(|_| {
                    OverlaySender::connect_loop(url.clone(), login.clone(), debug, latest.clone())
                })
                .collect()
        };

        Self {
            senders,
            latest,
            demo,
        }
    }
}

#[async_trait]
impl FrameSink for OverlayPool {
    /// Tries every connection once, starting at a random one.
    async fn publish(&self, frame: RenderFrame) -> Result<()> {
        METRICS.frames_published.fetch_add(1, Ordering::Relaxed);
        self.latest.record(&frame);

        if self.demo {
            log::info!("DEMO -> {}", serde_json::to_string(&frame)?);
            return Ok(());
        }

        let n = self.senders.len();
        if n == 0 {
            return Err(anyhow::anyhow!("no overlay connections configured"));
        }

        let start = random_range(0..n);
        for i in 0..n {
            if self.senders[(start + i) % n].try_send(frame.clone()).is_ok() {
                return Ok(());
            }
        }

        METRICS.send_errors.fetch_add(1, Ordering::Relaxed);
        Err(anyhow::anyhow!("all overlay connections down"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{GameInfoFrame, TimekeeperFrame};
    use tokio::net::TcpListener;

    fn frame() -> RenderFrame {
        RenderFrame::Game(GameInfoFrame {
            primary: "p".into(),
            secondary: "s".into(),
            timestamp: 1,
        })
    }

    fn game(primary: &str, timestamp: i64) -> RenderFrame {
        RenderFrame::Game(GameInfoFrame {
            primary: primary.into(),
            secondary: String::new(),
            timestamp,
        })
    }

    #[tokio::test]
    async fn demo_pool_accepts_frames() {
        let pool = OverlayPool::new("ws://unused".into(), "k", false, 3, true);
        assert!(pool.senders.is_empty());
        assert!(pool.publish(frame()).await.is_ok());
        assert_eq!(pool.latest.snapshot(), vec![frame()]);
    }

    #[test]
    fn latest_frames_keep_newest_per_target() {
        let latest = LatestFrames::default();
        latest.record(&game("old", 1));
        latest.record(&RenderFrame::Timekeeper(TimekeeperFrame {
            runners: Default::default(),
            timestamp: 2,
        }));
        latest.record(&game("new", 3));

        let frames = latest.snapshot();
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[0], RenderFrame::Timekeeper(_)));
        assert_eq!(frames[1], game("new", 3));
    }

    #[tokio::test]
    async fn reconnect_replays_latest_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let latest = LatestFrames::default();
        latest.record(&game("A", 1));

        // Host that reads login plus one message, then hangs up.
        let host = tokio::spawn(async move {
            let mut seen = Vec::new();
            for _ in 0..2 {
                let (tcp, _) = listener.accept().await.unwrap();
                let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
                let mut texts = Vec::new();
                while texts.len() < 2 {
                    match ws.next().await {
                        Some(Ok(Message::Text(text))) => texts.push(text.as_str().to_owned()),
                        Some(Ok(_)) => continue,
                        _ => break,
                    }
                }
                seen.push(texts);
                drop(ws);
            }
            seen
        });

        for _ in 0..2 {
            let (_tx, rx) = mpsc::channel(8);
            let result =
                OverlaySender::run_connection(&url, "key=k&role=graphics", false, rx, &latest)
                    .await;
            assert!(result.is_err());
        }

        let seen = host.await.unwrap();
        assert_eq!(seen.len(), 2);
        for texts in seen {
            assert_eq!(texts[0], "key=k&role=graphics");
            let replayed: RenderFrame = serde_json::from_str(&texts[1]).unwrap();
            assert_eq!(replayed, game("A", 1));
        }
    }

    #[tokio::test]
    async fn empty_pool_reports_error() {
        let pool = OverlayPool::new("ws://unused".into(), "k", false, 0, false);
        assert!(pool.publish(frame()).await.is_err());
    }

    #[tokio::test]
    async fn sender_without_connection_is_down() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = OverlaySender {
            queue: Arc::new(Mutex::new(tx)),
        };
        assert!(sender.try_send(frame()).is_err());
    }

    #[tokio::test]
    async fn full_queue_drops_silently() {
        let (tx, mut rx) = mpsc::channel(1);
        let sender = OverlaySender {
            queue: Arc::new(Mutex::new(tx)),
        };

        assert!(sender.try_send(frame()).is_ok());
        assert!(sender.try_send(frame()).is_ok());

        assert!(rx.recv().await.is_some());
        assert!(rx.try_recv().is_err());
    }
}
