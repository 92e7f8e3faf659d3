use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};

use crate::{
    config::Timing,
    feed::CurrentRunFeed,
    metrics::METRICS,
    overlay_sender::FrameSink,
    schema::{CurrentRun, NameplateFrame, RenderFrame, Runner, RunnerSet},
    social::{SocialType, next_social_type, social_info},
    util,
};

use super::variant::NameplateVariant;

/// Visible phase of the social container.
///
/// Every phase with a pending continuation carries it, so a feed update
/// can replace what happens next without racing an older wait.
#[derive(Debug)]
enum Phase {
    /// Opacity 0, nothing pending
    Hidden,

    /// Opacity 0, waiting for the fade to finish
    FadingOut(AfterFadeOut),

    /// Opacity 1, waiting for the fade to finish
    FadingIn(AfterFadeIn),

    /// Opacity 1, idle until the next rotation or feed update
    Shown,
}

#[derive(Debug)]
enum AfterFadeOut {
    /// Replace the runner set with this snapshot
    Apply(Arc<CurrentRun>),

    /// Rotation step: advance the social type
    Advance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AfterFadeIn {
    /// First show after a feed update: arm rotation if worthwhile
    StartRotation,

    /// Show inside a rotation step
    Settle,
}

/// Social-info fade/rotate state machine of one nameplate.
///
/// Driven by exactly two kinds of events: feed updates and deadlines.
/// All methods take `now` explicitly and return whether the rendered
/// frame changed. At most one hold deadline and one rotation deadline
/// exist at any time, so duplicate timers are unrepresentable.
pub struct Rotator {
    variant: Arc<dyn NameplateVariant>,
    index: usize,
    timing: Timing,

    runners: RunnerSet,
    social_type: Option<SocialType>,
    opacity: f32,
    phase: Phase,

    /// When opacity last dropped to 0; `None` while visible or never shown
    hidden_since: Option<Instant>,

    /// End of the current fade hold
    hold_until: Option<Instant>,

    /// Start of the next rotation fade-out
    next_rotation: Option<Instant>,
}

impl Rotator {
    pub fn new(variant: Arc<dyn NameplateVariant>, index: usize, timing: Timing) -> Self {
        Self {
            variant,
            index,
            timing,
            runners: Vec::new(),
            social_type: None,
            opacity: 0.0,
            phase: Phase::Hidden,
            hidden_since: None,
            hold_until: None,
            next_rotation: None,
        }
    }

    fn target_runner(&self) -> Option<&Runner> {
        self.runners.get(self.index).and_then(Option::as_ref)
    }

    /// Feed pushed a new snapshot.
    ///
    /// The rotation timer is canceled on arrival; it is re-armed only
    /// once the new runner has been shown.
    pub fn on_feed_update(&mut self, run: Arc<CurrentRun>, now: Instant) -> bool {
        self.next_rotation = None;

        if self.opacity != 0.0 {
            self.hide(now);
            self.phase = Phase::FadingOut(AfterFadeOut::Apply(run));
            self.hold_until = Some(now + self.timing.fade);
            return true;
        }

        // Already hidden, but the previous fade-out may still be running.
        // The pending continuation (if any) is superseded by this snapshot.
        let fade_end = self.hidden_since.map(|t| t + self.timing.fade);
        if let Some(end) = fade_end.filter(|end| *end > now) {
            self.phase = Phase::FadingOut(AfterFadeOut::Apply(run));
            self.hold_until = Some(end);
            return false;
        }

        self.apply(run, now)
    }

    /// The current fade hold elapsed.
    pub fn on_hold_elapsed(&mut self, now: Instant) -> bool {
        self.hold_until = None;

        match std::mem::replace(&mut self.phase, Phase::Hidden) {
            Phase::FadingOut(AfterFadeOut::Apply(run)) => self.apply(run, now),

            Phase::FadingOut(AfterFadeOut::Advance) => {
                self.advance();
                self.show(now, AfterFadeIn::Settle);
                METRICS.rotations.fetch_add(1, Ordering::Relaxed);
                true
            }

            Phase::FadingIn(AfterFadeIn::StartRotation) => {
                self.phase = Phase::Shown;
                self.next_rotation = None;
                if social_info(self.target_runner()).len() > 1 {
                    self.next_rotation = Some(now + self.timing.rotate_interval);
                }
                false
            }

            Phase::FadingIn(AfterFadeIn::Settle) => {
                self.phase = Phase::Shown;
                false
            }

            idle => {
                self.phase = idle;
                false
            }
        }
    }

    /// The rotation deadline passed.
    ///
    /// The next deadline is one interval after this one, so fade-outs
    /// start on a fixed period regardless of how late this fired.
    pub fn on_rotation_due(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_rotation else {
            return false;
        };
        self.next_rotation = Some(due + self.timing.rotate_interval);

        if !matches!(self.phase, Phase::Shown) {
            return false;
        }

        self.hide(now);
        self.phase = Phase::FadingOut(AfterFadeOut::Advance);
        self.hold_until = Some(now + self.timing.fade);
        true
    }

    /// Cancels every pending deadline. Rendered state is left untouched.
    pub fn teardown(&mut self) {
        self.hold_until = None;
        self.next_rotation = None;
        self.phase = Phase::Hidden;
    }

    fn apply(&mut self, run: Arc<CurrentRun>, now: Instant) -> bool {
        self.runners = self.variant.apply_run_change(&run);

        if social_info(self.target_runner()).is_empty() {
            self.phase = Phase::Hidden;
            self.hold_until = None;
            return true;
        }

        self.advance();
        self.show(now, AfterFadeIn::StartRotation);
        true
    }

    fn advance(&mut self) {
        if let Some(next) = next_social_type(self.social_type, self.target_runner()) {
            self.social_type = Some(next);
        }
    }

    fn hide(&mut self, now: Instant) {
        self.opacity = 0.0;
        self.hidden_since = Some(now);
    }

    fn show(&mut self, now: Instant, then: AfterFadeIn) {
        self.opacity = 1.0;
        self.hidden_since = None;
        self.phase = Phase::FadingIn(then);
        self.hold_until = Some(now + self.timing.fade);
    }

    /// Current render state.
    pub fn frame(&self) -> NameplateFrame {
        let runner = self.target_runner();
        let handle = self
            .social_type
            .and_then(|t| runner.and_then(|r| r.handle(t)))
            .map(str::to_string);

        NameplateFrame {
            root_id: self.variant.root_id(self.index),
            label: self.variant.label().to_string(),
            icon: self.variant.icon_path().to_string(),
            name: runner.map(|r| r.name.clone()).unwrap_or_default(),
            social_type: self.social_type,
            social_icon: self
                .social_type
                .map(|t| self.variant.icon_path_for(t).to_string()),
            handle,
            opacity: self.opacity,
            timestamp: util::now_ms(),
        }
    }

    /// Event loop of a mounted nameplate.
    ///
    /// Ends when `shutdown` fires (or its sender is dropped) or the feed
    /// closes. Returning drops `feed`, which deregisters the subscription.
    pub async fn run(
        mut self,
        mut feed: broadcast::Receiver<Arc<CurrentRun>>,
        sink: Arc<dyn FrameSink>,
        mut shutdown: oneshot::Receiver<()>,
    ) {
        let root_id = self.variant.root_id(self.index);

        loop {
            let changed = tokio::select! {
                biased;

                _ = &mut shutdown => break,

                update = feed.recv() => match update {
                    Ok(run) => self.on_feed_update(run, Instant::now()),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        log::warn!("{root_id}: skipped {skipped} stale run snapshots");
                        false
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        log::info!("{root_id}: feed closed");
                        break;
                    }
                },

                _ = wait_until(self.hold_until) => self.on_hold_elapsed(Instant::now()),

                _ = wait_until(self.next_rotation) => self.on_rotation_due(Instant::now()),
            };

            if changed {
                let frame = self.frame();
                log::debug!(
                    "{root_id}: opacity={} social={:?}",
                    frame.opacity,
                    frame.social_type
                );
                if let Err(e) = sink.publish(RenderFrame::Nameplate(frame)).await {
                    log::warn!("{root_id}: frame not delivered: {e}");
                }
            }
        }

        self.teardown();
        METRICS.nameplates_mounted.fetch_sub(1, Ordering::Relaxed);
        log::info!("{root_id}: unmounted");
    }
}

#[cfg(test)]
impl Rotator {
    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn social_type(&self) -> Option<SocialType> {
        self.social_type
    }

    pub fn hold_until(&self) -> Option<Instant> {
        self.hold_until
    }

    pub fn next_rotation(&self) -> Option<Instant> {
        self.next_rotation
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// A mounted nameplate.
///
/// Dropping the handle unmounts the nameplate as well; `unmount` also
/// waits for the task to finish.
pub struct NameplateHandle {
    root_id: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl NameplateHandle {
    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub async fn unmount(self) {
        let NameplateHandle {
            root_id,
            shutdown,
            task,
        } = self;

        let _ = shutdown.send(());
        if let Err(e) = task.await {
            log::error!("{root_id}: rotator task failed: {e}");
        }
    }
}

/// Mounts a nameplate: subscribes to `feed` and spawns its rotator.
///
/// The subscription exists before this returns, so no snapshot
/// published afterwards can be missed.
pub fn mount(
    variant: Arc<dyn NameplateVariant>,
    index: usize,
    timing: Timing,
    feed: &CurrentRunFeed,
    sink: Arc<dyn FrameSink>,
) -> NameplateHandle {
    let rx = feed.subscribe();
    let (shutdown, shutdown_rx) = oneshot::channel();
    let root_id = variant.root_id(index);

    METRICS.nameplates_mounted.fetch_add(1, Ordering::Relaxed);
    log::info!("{root_id}: mounted");

    let rotator = Rotator::new(variant, index, timing);
    let task = tokio::spawn(rotator.run(rx, sink, shutdown_rx));

    NameplateHandle {
        root_id,
        shutdown,
        task,
    }
}
