use crate::schema::{CurrentRun, RunnerSet};

use super::variant::NameplateVariant;

/// Nameplate for a commentator slot.
///
/// Commentators carry the same profile shape as runners.
pub struct CommentatorNameplate;

impl NameplateVariant for CommentatorNameplate {
    fn name(&self) -> &'static str {
        "commentator"
    }

    fn apply_run_change(&self, run: &CurrentRun) -> RunnerSet {
        run.commentators.clone()
    }

    fn icon_path(&self) -> &'static str {
        "icon/commentator.png"
    }

    fn label(&self) -> &'static str {
        "Commentator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Runner;

    #[test]
    fn selects_commentators_not_runners() {
        let run = CurrentRun {
            runners: vec![Some(Runner::default())],
            commentators: vec![
                None,
                Some(Runner {
                    name: "carol".into(),
                    ..Default::default()
                }),
            ],
            ..Default::default()
        };

        let set = CommentatorNameplate.apply_run_change(&run);
        assert_eq!(set.len(), 2);
        assert_eq!(set[1].as_ref().map(|r| r.name.as_str()), Some("carol"));
        assert_eq!(CommentatorNameplate.root_id(0), "commentator-0");
    }
}
