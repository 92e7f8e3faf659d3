use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::atomic::Ordering;
use tokio::time::{Duration, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message, tungstenite::Utf8Bytes};

use crate::{
    config::FeedConfig,
    metrics::METRICS,
    schema::CurrentRun,
    util,
};

use super::CurrentRunFeed;

/// Envelope of every frame the replicant server sends.
///
/// Only `declared` (initial value after subscribe) and `change`
/// carry a value we care about.
#[derive(Debug, Deserialize)]
struct ReplicantEnvelope {
    #[serde(rename = "type")]
    kind: String,
    namespace: Option<String>,
    name: Option<String>,
    value: Option<Value>,
}

/// Outcome of decoding one text frame.
#[derive(Debug, PartialEq)]
pub enum FeedMessage {
    /// New full snapshot of the watched replicant
    Snapshot(CurrentRun),

    /// Heartbeats, acks, other replicants
    Ignored,

    /// Frame claimed to be ours but could not be decoded
    Malformed,
}

/// Builds the subscribe message for the configured replicant.
pub fn build_subscribe_message(cfg: &FeedConfig) -> Value {
    json!({
        "type": "subscribe",
        "namespace": cfg.namespace,
        "name": cfg.replicant,
    })
}

/// Decodes a raw text frame.
///
/// Must never panic; anything unexpected is `Ignored` or `Malformed`.
pub fn parse_feed_message(raw: &str, cfg: &FeedConfig) -> FeedMessage {
    let Ok(env) = serde_json::from_str::<ReplicantEnvelope>(raw) else {
        return FeedMessage::Malformed;
    };

    if env.kind != "declared" && env.kind != "change" {
        return FeedMessage::Ignored;
    }

    // Frames without routing fields are assumed to target our subscription.
    if env.namespace.as_deref().is_some_and(|ns| ns != cfg.namespace)
        || env.name.as_deref().is_some_and(|n| n != cfg.replicant)
    {
        return FeedMessage::Ignored;
    }

    match env.value {
        // Undeclared replicant: behave like an empty run.
        None | Some(Value::Null) => FeedMessage::Snapshot(CurrentRun::default()),
        Some(v) => match serde_json::from_value(v) {
            Ok(run) => FeedMessage::Snapshot(run),
            Err(_) => FeedMessage::Malformed,
        },
    }
}

/// Keeps one subscription to the replicant alive forever.
///
/// This loop:
/// - Connects to the replicant server
/// - Subscribes to the configured replicant
/// - Republishes every snapshot on `feed`
/// - Reconnects after `reconnect_secs` (plus jitter) on any failure
///
/// It never returns.
pub async fn run_feed_loop(cfg: FeedConfig, feed: CurrentRunFeed, raw: bool) {
    let backoff = Duration::from_secs(cfg.reconnect_secs);

    loop {
        match connect_async(cfg.url.as_str()).await {
            Ok((ws, _)) => {
                log::info!("feed connected to {} ({}/{})", cfg.url, cfg.namespace, cfg.replicant);
                METRICS.feed_connections_active.fetch_add(1, Ordering::Relaxed);

                let (mut write, mut read) = ws.split();

                let sub = build_subscribe_message(&cfg);
                if let Err(e) = write
                    .send(Message::Text(Utf8Bytes::from(sub.to_string())))
                    .await
                {
                    log::warn!("feed subscribe failed: {e}");
                } else {
                    while let Some(msg) = read.next().await {
                        match msg {
                            Ok(Message::Text(text)) => {
                                if raw {
                                    log::debug!("[feed RECV] {}", text.as_str());
                                }
                                handle_text(&text, &cfg, &feed);
                            }

                            Ok(Message::Close(_)) => break,

                            // Ping/pong are answered by tungstenite; binary unused
                            Ok(_) => {}

                            Err(e) => {
                                log::warn!("feed read error: {e}");
                                break;
                            }
                        }
                    }
                }

                METRICS.feed_connections_active.fetch_sub(1, Ordering::Relaxed);
            }

            Err(e) => {
                log::warn!("feed connect failed [{}]: {e}", cfg.url);
            }
        }

        METRICS.feed_reconnects.fetch_add(1, Ordering::Relaxed);
        let delay = util::jittered(backoff);
        log::info!("feed reconnecting in {:?}", delay);
        sleep(delay).await;
    }
}

fn handle_text(text: &str, cfg: &FeedConfig, feed: &CurrentRunFeed) {
    match parse_feed_message(text, cfg) {
        FeedMessage::Snapshot(run) => {
            METRICS.feed_updates.fetch_add(1, Ordering::Relaxed);
            let reached = feed.publish(run);
            log::debug!("current run update delivered to {reached} subscribers");
        }
        FeedMessage::Ignored => {}
        FeedMessage::Malformed => {
            METRICS.parse_errors.fetch_add(1, Ordering::Relaxed);
            log::warn!("malformed replicant frame dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> FeedConfig {
        FeedConfig {
            url: "ws://127.0.0.1:9090".into(),
            namespace: "rtaij".into(),
            replicant: "currentRun".into(),
            reconnect_secs: 5,
        }
    }

    #[test]
    fn subscribe_message_names_replicant() {
        let v = build_subscribe_message(&cfg());
        assert_eq!(v["type"], "subscribe");
        assert_eq!(v["namespace"], "rtaij");
        assert_eq!(v["name"], "currentRun");
    }

    #[test]
    fn change_frame_yields_snapshot() {
        let raw = r#"{"type":"change","namespace":"rtaij","name":"currentRun",
            "value":{"title":"Celeste","runners":[{"name":"bob","nico":"co123"}]}}"#;

        let FeedMessage::Snapshot(run) = parse_feed_message(raw, &cfg()) else {
            panic!("expected snapshot");
        };
        assert_eq!(run.title.as_deref(), Some("Celeste"));
        assert_eq!(run.runners[0].as_ref().unwrap().nico.as_deref(), Some("co123"));
    }

    #[test]
    fn null_value_is_empty_run() {
        let raw = r#"{"type":"declared","value":null}"#;
        assert_eq!(
            parse_feed_message(raw, &cfg()),
            FeedMessage::Snapshot(CurrentRun::default())
        );
    }

    #[test]
    fn other_replicants_and_types_are_ignored() {
        let other = r#"{"type":"change","namespace":"rtaij","name":"stopwatch","value":{}}"#;
        assert_eq!(parse_feed_message(other, &cfg()), FeedMessage::Ignored);

        let ack = r#"{"type":"subscribed","name":"currentRun"}"#;
        assert_eq!(parse_feed_message(ack, &cfg()), FeedMessage::Ignored);
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(parse_feed_message("not json", &cfg()), FeedMessage::Malformed);

        let bad = r#"{"type":"change","name":"currentRun","value":{"runners":"nope"}}"#;
        assert_eq!(parse_feed_message(bad, &cfg()), FeedMessage::Malformed);
    }

    #[tokio::test]
    async fn handled_snapshot_is_published() {
        let feed = CurrentRunFeed::new();
        let mut rx = feed.subscribe();

        handle_text(
            r#"{"type":"change","value":{"category":"Any%"}}"#,
            &cfg(),
            &feed,
        );

        assert_eq!(rx.recv().await.unwrap().category.as_deref(), Some("Any%"));
    }
}
