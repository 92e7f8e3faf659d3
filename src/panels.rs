//! Info panels fed by the current run
//!
//! - Game panel: title on the first line, category and platform below
//! - Timekeeper: names of the four runner slots for the dashboard
//!
//! Neither panel animates; every feed push re-renders both.
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::{
    config::PanelsConfig,
    feed::CurrentRunFeed,
    overlay_sender::FrameSink,
    schema::{CurrentRun, GameInfoFrame, MAX_RUNNER_SLOTS, RenderFrame, TimekeeperFrame},
    util,
};

/// "category - platform", or just the category when no platform is set.
pub fn game_info(run: &CurrentRun) -> GameInfoFrame {
    let category = run.category.clone().unwrap_or_default();
    let secondary = match run.platform.as_deref() {
        Some(platform) if !platform.is_empty() => format!("{category} - {platform}"),
        _ => category,
    };

    GameInfoFrame {
        primary: run.title.clone().unwrap_or_default(),
        secondary,
        timestamp: util::now_ms(),
    }
}

/// Four slots; absent runners are `None`, runners past the fourth are ignored.
pub fn timekeeper_slots(run: &CurrentRun) -> TimekeeperFrame {
    let mut runners: [Option<String>; MAX_RUNNER_SLOTS] = Default::default();

    for (slot, runner) in runners.iter_mut().zip(&run.runners) {
        *slot = runner.as_ref().map(|r| r.name.clone());
    }

    TimekeeperFrame {
        runners,
        timestamp: util::now_ms(),
    }
}

/// Spawns the panel renderer. Ends when the feed closes.
pub fn spawn_panels(
    cfg: PanelsConfig,
    feed: &CurrentRunFeed,
    sink: Arc<dyn FrameSink>,
) -> JoinHandle<()> {
    let mut rx = feed.subscribe();

    tokio::spawn(async move {
        loop {
            let run = match rx.recv().await {
                Ok(run) => run,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => break,
            };

            let mut frames = Vec::with_capacity(2);
            if cfg.game {
                frames.push(RenderFrame::Game(game_info(&run)));
            }
            if cfg.timekeeper {
                frames.push(RenderFrame::Timekeeper(timekeeper_slots(&run)));
            }

            for frame in frames {
                if let Err(e) = sink.publish(frame).await {
                    log::warn!("panel frame not delivered: {e}");
                }
            }
        }
    })
}
