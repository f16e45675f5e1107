//! Duration text grammar used by lock timers.
//!
//! A duration is written as an optional `<int>h`, an optional `<int>m` and an
//! optional `<int>s`, in that order, with nothing in between:
//!
//! ```text
//! "1h30m"   -> 1 hour 30 minutes
//! "45s"     -> 45 seconds
//! "2h0m0s"  -> 2 hours
//! ""        -> zero (never a valid timer)
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+)h)?(?:(\d+)m)?(?:(\d+)s)?$").expect("duration pattern is valid")
});

/// Parse duration text into a [`Duration`].
///
/// Text that does not follow the grammar parses to [`Duration::ZERO`], as does a
/// string with every part absent. A part whose digits overflow counts as zero.
pub fn parse_duration(input: &str) -> Duration {
    let Some(caps) = DURATION_RE.captures(input) else {
        return Duration::ZERO;
    };

    let part = |idx: usize| -> u64 {
        caps.get(idx)
            .and_then(|m| m.as_str().parse::<u64>().ok())
            .unwrap_or(0)
    };

    let secs = part(1)
        .saturating_mul(3600)
        .saturating_add(part(2).saturating_mul(60))
        .saturating_add(part(3));
    Duration::from_secs(secs)
}

/// Render a remaining duration for countdown display, e.g. `1h 05m 09s`.
///
/// Leading zero units are dropped; sub-second precision is truncated.
pub fn format_remaining(remaining: Duration) -> String {
    let total = remaining.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes:02}m {seconds:02}s")
    } else {
        format!("{seconds:02}s")
    }
}
