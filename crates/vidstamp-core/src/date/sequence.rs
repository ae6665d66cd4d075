use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, Utc};
use regex::Regex;
use tracing::debug;

use crate::metadata::Confidence;
use crate::provider::SiblingFile;

/// Camera counter names: an alphabetic prefix, an optional separator, a
/// 3-6 digit counter, and an extension. `DJI_0042.MP4`, `IMG1234.MOV`.
static SEQUENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<prefix>[A-Za-z]+[_\-]?)(?P<number>\d{3,6})\.(?P<ext>[A-Za-z0-9]+)$").unwrap()
});

/// Interpolated neighbors dated before this year are treated as clock
/// glitches rather than evidence.
const EARLIEST_PLAUSIBLE_YEAR: i32 = 2020;

/// A filename following a device counter convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceName {
    pub prefix: String,
    pub number: u64,
}

/// Split a device-sequence filename into its prefix and counter.
pub fn parse_sequence_name(filename: &str) -> Option<SequenceName> {
    let caps = SEQUENCE_RE.captures(filename)?;
    let number = caps["number"].parse().ok()?;
    Some(SequenceName {
        prefix: caps["prefix"].to_string(),
        number,
    })
}

/// Estimate a timestamp for counter value `target` from dated neighbors.
///
/// Neighbors only count when they carry a timestamp that is neither in the
/// future nor implausibly old, and the target's own listing never counts.
/// Two-sided matches interpolate linearly and rank medium; a one-sided
/// match borrows that neighbor's timestamp and ranks low.
pub fn interpolate(
    target: u64,
    target_name: &str,
    siblings: &[SiblingFile],
    now: DateTime<Utc>,
) -> Option<(DateTime<Utc>, Confidence)> {
    let mut dated: Vec<(u64, DateTime<Utc>)> = siblings
        .iter()
        .filter(|sibling| sibling.name != target_name)
        .filter_map(|sibling| {
            let ts = sibling.timestamp?;
            (ts <= now && ts.year() >= EARLIEST_PLAUSIBLE_YEAR).then_some((sibling.sequence, ts))
        })
        .collect();
    if dated.is_empty() {
        debug!(target, "no dated sequence neighbors");
        return None;
    }

    dated.sort_by_key(|entry| entry.0);
    // Duplicate counters keep the earliest-sorted entry.
    dated.dedup_by_key(|entry| entry.0);

    let before = dated.iter().rev().find(|entry| entry.0 <= target).copied();
    let after = dated.iter().find(|entry| entry.0 > target).copied();

    match (before, after) {
        (Some((seq_before, ts_before)), Some((seq_after, ts_after))) if seq_after != seq_before => {
            let span_seconds = (ts_after - ts_before).num_seconds();
            let offset =
                span_seconds * (target - seq_before) as i64 / (seq_after - seq_before) as i64;
            Some((ts_before + Duration::seconds(offset), Confidence::Medium))
        }
        // Equal neighbor counters leave nothing to scale between; fall back
        // to the one-sided rule.
        (Some((_, ts)), _) | (None, Some((_, ts))) => Some((ts, Confidence::Low)),
        (None, None) => None,
    }
}
