use serde::{Deserialize, Serialize};

use crate::social::SocialType;

/// Number of runner slots a run can carry.
pub const MAX_RUNNER_SLOTS: usize = 4;

// ------------------------------------------------------------
// Current run (feed input)
// ------------------------------------------------------------
//
// Full snapshot of the `currentRun` replicant. Every feed push
// replaces the previous value wholesale; nothing is diffed.
//
// Unknown fields are ignored so schema additions on the
// replicant side do not break the rotators.
//
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CurrentRun {
    pub title: Option<String>,
    pub category: Option<String>,
    pub platform: Option<String>,

    /// Up to four runner slots; `null` marks an empty slot
    pub runners: Vec<Option<Runner>>,

    /// Commentator slots, same shape as `runners`
    pub commentators: Vec<Option<Runner>>,
}

/// A competitor (or commentator) profile.
///
/// Handles are `None` when the replicant omits them. An empty string is
/// still `Some("")`, which matters for [`crate::social::next_social_type`].
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Runner {
    pub name: String,
    pub twitch: Option<String>,
    pub nico: Option<String>,
    pub twitter: Option<String>,
}

impl Runner {
    /// Handle text for a social type, if the runner has one.
    pub fn handle(&self, social_type: SocialType) -> Option<&str> {
        match social_type {
            SocialType::Twitch => self.twitch.as_deref(),
            SocialType::Nico => self.nico.as_deref(),
            SocialType::Twitter => self.twitter.as_deref(),
        }
    }
}

/// Ordered runner slots as seen by one nameplate variant.
pub type RunnerSet = Vec<Option<Runner>>;

// ------------------------------------------------------------
// Render frames (output)
// ------------------------------------------------------------
//
// Everything the graphics layer needs to draw. The `type` field
// is added by serde and used for routing on the graphics host
// ("nameplate", "game", "timekeeper").
//
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RenderFrame {
    Nameplate(NameplateFrame),
    Game(GameInfoFrame),
    Timekeeper(TimekeeperFrame),
}

impl RenderFrame {
    /// Render target this frame updates; a newer frame with the same key
    /// supersedes it.
    pub fn key(&self) -> String {
        match self {
            RenderFrame::Nameplate(np) => format!("nameplate:{}", np.root_id),
            RenderFrame::Game(_) => "game".to_string(),
            RenderFrame::Timekeeper(_) => "timekeeper".to_string(),
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            RenderFrame::Nameplate(np) => np.timestamp,
            RenderFrame::Game(g) => g.timestamp,
            RenderFrame::Timekeeper(t) => t.timestamp,
        }
    }
}

/// State of one nameplate at a point in time.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct NameplateFrame {
    /// DOM id of the nameplate root (e.g. "runner-0")
    pub root_id: String,

    pub label: String,

    /// Variant icon shown before the label
    pub icon: String,

    /// Display name of the target runner, "" when the slot is empty
    pub name: String,

    /// Currently selected social type, unset until first resolved
    pub social_type: Option<SocialType>,

    /// Icon keyed by `social_type`
    pub social_icon: Option<String>,

    /// Handle text for `social_type`
    pub handle: Option<String>,

    /// Opacity of the social container, 0.0 or 1.0; the graphics
    /// layer animates between values over the fade duration
    pub opacity: f32,

    /// Milliseconds since Unix epoch
    pub timestamp: i64,
}

/// Game title / category line.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct GameInfoFrame {
    pub primary: String,
    pub secondary: String,
    pub timestamp: i64,
}

/// Runner names for the timekeeper dashboard, always four slots.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TimekeeperFrame {
    pub runners: [Option<String>; MAX_RUNNER_SLOTS],
    pub timestamp: i64,
}
