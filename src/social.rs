//! Social handle selection for nameplates.
//!
//! Two separate rules live here and they intentionally disagree in places:
//! - [`social_info`] decides *whether* and *how much* to rotate
//! - [`next_social_type`] decides *which* handle comes next
//!
//! Rotation order is a fixed three-way cycle with per-step fallback, not a
//! round-robin over the available entries.

use serde::{Deserialize, Serialize};

use crate::schema::Runner;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SocialType {
    Twitch,
    Nico,
    Twitter,
}

/// A (type, handle) pair derived from a runner profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialEntry {
    pub social_type: SocialType,
    pub info: String,
}

/// Lists the runner's non-empty handles in Twitch, Nico, Twitter order.
///
/// KNOWN DEFECT (kept on purpose, pending confirmation):
/// the twitter entry is tagged `SocialType::Twitch`. Only the length of
/// this list drives behaviour today, so the tag is never displayed.
pub fn social_info(runner: Option<&Runner>) -> Vec<SocialEntry> {
    let Some(runner) = runner else {
        return Vec::new();
    };

    let mut entries = Vec::with_capacity(3);

    if let Some(twitch) = runner.twitch.as_deref().filter(|s| !s.is_empty()) {
        entries.push(SocialEntry {
            social_type: SocialType::Twitch,
            info: twitch.to_string(),
        });
    }
    if let Some(nico) = runner.nico.as_deref().filter(|s| !s.is_empty()) {
        entries.push(SocialEntry {
            social_type: SocialType::Nico,
            info: nico.to_string(),
        });
    }
    if let Some(twitter) = runner.twitter.as_deref().filter(|s| !s.is_empty()) {
        entries.push(SocialEntry {
            social_type: SocialType::Twitch,
            info: twitter.to_string(),
        });
    }

    entries
}

/// Picks the social type to show after `current`.
///
/// Returns `None` when no fallback applies; callers keep the previous
/// value in that case. From unset the answer is always `Twitch`, even
/// for a runner without a twitch handle.
///
/// Presence here means "field set", so an empty handle still counts.
pub fn next_social_type(
    current: Option<SocialType>,
    runner: Option<&Runner>,
) -> Option<SocialType> {
    let has = |t: SocialType| runner.is_some_and(|r| r.handle(t).is_some());

    match current {
        Some(SocialType::Twitch) => [SocialType::Nico, SocialType::Twitter]
            .into_iter()
            .find(|t| has(*t)),
        Some(SocialType::Nico) => [SocialType::Twitter, SocialType::Twitch]
            .into_iter()
            .find(|t| has(*t)),
        Some(SocialType::Twitter) => [SocialType::Twitch, SocialType::Nico]
            .into_iter()
            .find(|t| has(*t)),
        None => Some(SocialType::Twitch),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner(twitch: Option<&str>, nico: Option<&str>, twitter: Option<&str>) -> Runner {
        Runner {
            name: "r".into(),
            twitch: twitch.map(Into::into),
            nico: nico.map(Into::into),
            twitter: twitter.map(Into::into),
        }
    }

    #[test]
    fn entries_follow_precedence_and_keep_twitter_tag_defect() {
        let r = runner(Some("tw"), Some("nc"), Some("tt"));
        let entries = social_info(Some(&r));

        let infos: Vec<_> = entries.iter().map(|e| e.info.as_str()).collect();
        assert_eq!(infos, ["tw", "nc", "tt"]);
        assert_eq!(entries[2].social_type, SocialType::Twitch);
    }

    #[test]
    fn empty_handles_are_not_entries() {
        let r = runner(Some(""), None, Some("tt"));
        assert_eq!(social_info(Some(&r)).len(), 1);
        assert!(social_info(None).is_empty());
    }

    #[test]
    fn unset_always_starts_at_twitch() {
        let r = runner(None, Some("nc"), None);
        assert_eq!(next_social_type(None, Some(&r)), Some(SocialType::Twitch));
        assert_eq!(next_social_type(None, None), Some(SocialType::Twitch));
    }

    #[test]
    fn precedence_table() {
        use SocialType::*;

        let all = runner(Some("a"), Some("b"), Some("c"));
        assert_eq!(next_social_type(Some(Twitch), Some(&all)), Some(Nico));
        assert_eq!(next_social_type(Some(Nico), Some(&all)), Some(Twitter));
        assert_eq!(next_social_type(Some(Twitter), Some(&all)), Some(Twitch));

        let no_nico = runner(Some("a"), None, Some("c"));
        assert_eq!(next_social_type(Some(Twitch), Some(&no_nico)), Some(Twitter));
        assert_eq!(next_social_type(Some(Twitter), Some(&no_nico)), Some(Twitch));

        let only_nico = runner(None, Some("b"), None);
        assert_eq!(next_social_type(Some(Twitch), Some(&only_nico)), Some(Nico));
        assert_eq!(next_social_type(Some(Nico), Some(&only_nico)), None);
        assert_eq!(next_social_type(Some(Twitter), Some(&only_nico)), Some(Nico));

        let only_twitch = runner(Some("a"), None, None);
        assert_eq!(next_social_type(Some(Twitch), Some(&only_twitch)), None);
        assert_eq!(next_social_type(Some(Nico), Some(&only_twitch)), Some(Twitch));
    }

    #[test]
    fn empty_handle_still_counts_for_selection() {
        let r = runner(Some("a"), Some(""), None);
        assert_eq!(
            next_social_type(Some(SocialType::Twitch), Some(&r)),
            Some(SocialType::Nico)
        );
    }
}
