use crate::schema::{CurrentRun, RunnerSet};

use super::variant::NameplateVariant;

/// Nameplate for a competitor slot.
pub struct RunnerNameplate;

impl NameplateVariant for RunnerNameplate {
    fn name(&self) -> &'static str {
        "runner"
    }

    fn apply_run_change(&self, run: &CurrentRun) -> RunnerSet {
        run.runners.clone()
    }

    fn icon_path(&self) -> &'static str {
        "icon/runner.png"
    }

    fn label(&self) -> &'static str {
        "Runner"
    }
}
