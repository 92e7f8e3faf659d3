use crate::schema::{CurrentRun, RunnerSet};
use crate::social::SocialType;

/// Capabilities a concrete nameplate provides to the shared rotator.
///
/// The rotator owns all fade and timer handling. A variant only decides
/// which runner set it shows and how it looks.
///
/// THREAD SAFETY:
/// - Must be Send + Sync
/// - One variant instance is shared by every nameplate of that kind
///
pub trait NameplateVariant: Send + Sync {
    /// Registry name, matches `nameplates[].variant` in config.
    fn name(&self) -> &'static str;

    /// Selects this variant's runner slots from a full run snapshot.
    ///
    /// MUST NOT keep references into `run`; the snapshot is replaced on
    /// the next feed push.
    fn apply_run_change(&self, run: &CurrentRun) -> RunnerSet;

    /// Icon shown next to the handle for the given social type.
    fn icon_path_for(&self, social_type: SocialType) -> &'static str {
        match social_type {
            SocialType::Twitch => "icon/twitch.png",
            SocialType::Nico => "icon/nico.png",
            SocialType::Twitter => "icon/twitter.png",
        }
    }

    /// Icon shown before the label.
    fn icon_path(&self) -> &'static str;

    /// DOM id of the nameplate root for slot `index`.
    fn root_id(&self, index: usize) -> String {
        format!("{}-{}", self.name(), index)
    }

    fn label(&self) -> &'static str;
}
