//! Small shared helpers.
//!
//! IMPORTANT:
//! - No nameplate or feed specific logic should live here.
//!
use std::time::Duration;

use rand::random_range;

/// Returns the current Unix timestamp in milliseconds.
///
/// Stamped on every outgoing render frame so the graphics host can
/// discard frames that arrive out of order across connections.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Reconnect delay with up to 20% random jitter added.
///
/// Keeps several pooled connections from reconnecting in lockstep
/// after the remote side restarts.
pub fn jittered(base: Duration) -> Duration {
    let max_extra = (base.as_millis() / 5) as u64;
    if max_extra == 0 {
        return base;
    }
    base + Duration::from_millis(random_range(0..=max_extra))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_stays_within_bounds() {
        let base = Duration::from_secs(5);
        for _ in 0..100 {
            let d = jittered(base);
            assert!(d >= base);
            assert!(d <= base + Duration::from_secs(1));
        }
    }

    #[test]
    fn zero_base_has_no_jitter() {
        assert_eq!(jittered(Duration::ZERO), Duration::ZERO);
    }
}
