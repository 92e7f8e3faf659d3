use serde::Deserialize;
use std::time::Duration;

use crate::nameplate::get_variant;
use crate::schema::MAX_RUNNER_SLOTS;

// ------------------------------------------------------------
// Root configuration
// ------------------------------------------------------------
//
// Top-level structure loaded from `config.json`.
//
// It defines:
// - Where the current-run replicant is read from
// - Where rendered frames are sent to
// - Which nameplates are mounted
//
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Replicant feed connection
    pub feed: FeedConfig,

    /// Graphics host connection
    pub overlay: OverlayConfig,

    /// Nameplates mounted at startup
    pub nameplates: Vec<NameplateConfig>,

    /// Optional info panels (game, timekeeper)
    pub panels: Option<PanelsConfig>,

    /// Optional fade / rotation timing overrides
    pub timing: Option<TimingConfig>,

    /// Optional debug configuration
    pub debug: Option<DebugConfig>,
}

impl Config {
    /// Parses and validates a JSON document.
    pub fn from_json(data: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_json::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Semantic checks serde cannot express.
    pub fn validate(&self) -> anyhow::Result<()> {
        let demo = self.overlay.demo.unwrap_or(false);
        if !demo && self.overlay.connections == 0 {
            anyhow::bail!("overlay.connections must be at least 1 outside demo mode");
        }

        if self.feed.reconnect_secs == 0 {
            anyhow::bail!("feed.reconnect_secs must be at least 1");
        }

        for np in &self.nameplates {
            if get_variant(&np.variant).is_none() {
                anyhow::bail!("unknown nameplate variant '{}'", np.variant);
            }
            if np.index >= MAX_RUNNER_SLOTS {
                anyhow::bail!(
                    "nameplate '{}' index {} out of range (max {})",
                    np.variant,
                    np.index,
                    MAX_RUNNER_SLOTS - 1
                );
            }
        }

        let timing = self.timing();
        if timing.rotate_interval <= timing.fade * 2 {
            anyhow::bail!(
                "timing.rotate_secs must be longer than two fades ({:?})",
                timing.fade * 2
            );
        }

        Ok(())
    }

    /// Effective timing, defaults applied.
    pub fn timing(&self) -> Timing {
        self.timing
            .as_ref()
            .map(TimingConfig::resolve)
            .unwrap_or_default()
    }

    pub fn debug_log(&self) -> bool {
        self.debug
            .as_ref()
            .is_some_and(|d| d.log.unwrap_or(false))
    }

    pub fn debug_raw(&self) -> bool {
        self.debug
            .as_ref()
            .is_some_and(|d| d.raw.unwrap_or(false))
    }
}

// ------------------------------------------------------------
// Feed configuration
// ------------------------------------------------------------
//
// The replicant server pushes the full value of the configured
// replicant on subscribe and on every change.
//
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// WebSocket URL of the replicant server
    pub url: String,

    /// Bundle namespace the replicant lives in
    pub namespace: String,

    /// Replicant name
    #[serde(default = "default_replicant")]
    pub replicant: String,

    /// Delay before reconnecting after a lost connection
    #[serde(default = "default_reconnect_secs")]
    pub reconnect_secs: u64,
}

fn default_replicant() -> String {
    "currentRun".to_string()
}

fn default_reconnect_secs() -> u64 {
    5
}

// ------------------------------------------------------------
// Overlay configuration
// ------------------------------------------------------------
//
// Notes:
// - `key` is sent in the login message and must not be committed.
// - `demo` logs frames locally instead of sending them.
//
#[derive(Debug, Deserialize, Clone)]
pub struct OverlayConfig {
    /// WebSocket URL of the graphics host
    pub url: String,

    /// Authentication key (sent as: key=XYZ&role=graphics)
    pub key: String,

    /// Number of parallel connections
    pub connections: usize,

    /// Demo mode flag
    pub demo: Option<bool>,
}

/// One mounted nameplate.
#[derive(Debug, Deserialize, Clone)]
pub struct NameplateConfig {
    /// Variant identifier ("runner", "commentator")
    pub variant: String,

    /// Slot in the variant's runner set
    #[serde(default)]
    pub index: usize,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PanelsConfig {
    #[serde(default = "default_true")]
    pub game: bool,

    #[serde(default = "default_true")]
    pub timekeeper: bool,
}

impl Default for PanelsConfig {
    fn default() -> Self {
        Self {
            game: true,
            timekeeper: true,
        }
    }
}

fn default_true() -> bool {
    true
}

// ------------------------------------------------------------
// Timing
// ------------------------------------------------------------
//
// Fade duration applies to every opacity change; the rotation
// interval is the period between consecutive fade-outs.
//
#[derive(Debug, Deserialize, Clone)]
pub struct TimingConfig {
    pub fade_ms: Option<u64>,
    pub rotate_secs: Option<u64>,
}

impl TimingConfig {
    fn resolve(&self) -> Timing {
        let defaults = Timing::default();
        Timing {
            fade: self
                .fade_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.fade),
            rotate_interval: self
                .rotate_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.rotate_interval),
        }
    }
}

/// Resolved timing used by the rotators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub fade: Duration,
    pub rotate_interval: Duration,
}

pub const FADE_DURATION: Duration = Duration::from_millis(500);
pub const SOCIAL_ROTATE_INTERVAL: Duration = Duration::from_secs(20);

impl Default for Timing {
    fn default() -> Self {
        Self {
            fade: FADE_DURATION,
            rotate_interval: SOCIAL_ROTATE_INTERVAL,
        }
    }
}

// ------------------------------------------------------------
// Debug configuration
// ------------------------------------------------------------
#[derive(Debug, Deserialize, Clone)]
pub struct DebugConfig {
    /// Logs every raw feed frame
    pub raw: Option<bool>,

    /// Enables debug-level logging
    pub log: Option<bool>,
}
