//! Shared test doubles.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::overlay_sender::FrameSink;
use crate::schema::{CurrentRun, NameplateFrame, RenderFrame, Runner};

/// Sink that remembers every frame with the (virtual) time it arrived.
#[derive(Default)]
pub struct RecordingSink {
    frames: Mutex<Vec<(Instant, RenderFrame)>>,
}

impl RecordingSink {
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn frames(&self) -> Vec<(Instant, RenderFrame)> {
        self.frames.lock().unwrap().clone()
    }

    pub fn nameplates(&self) -> Vec<(Instant, NameplateFrame)> {
        self.frames()
            .into_iter()
            .filter_map(|(at, f)| match f {
                RenderFrame::Nameplate(np) => Some((at, np)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl FrameSink for RecordingSink {
    async fn publish(&self, frame: RenderFrame) -> anyhow::Result<()> {
        self.frames.lock().unwrap().push((Instant::now(), frame));
        Ok(())
    }
}

pub fn runner(name: &str, twitch: Option<&str>, nico: Option<&str>, twitter: Option<&str>) -> Runner {
    Runner {
        name: name.to_string(),
        twitch: twitch.map(Into::into),
        nico: nico.map(Into::into),
        twitter: twitter.map(Into::into),
    }
}

pub fn run_with(runners: Vec<Option<Runner>>) -> CurrentRun {
    CurrentRun {
        runners,
        ..Default::default()
    }
}
