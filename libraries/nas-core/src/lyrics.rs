//! LRC lyric parsing and position lookup
//!
//! Embedded lyrics are either plain text or LRC (`[mm:ss.xx]line`). The
//! player samples position at ~60 Hz, so [`active_line`] is cheap: a reverse
//! scan over an already sorted slice.

use serde::{Deserialize, Serialize};

/// Look-ahead applied when matching a position to a line, so the highlight
/// lands slightly before the vocal rather than after it.
pub const SYNC_OFFSET_MS: u64 = 300;

/// One lyric line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricsLine {
    /// Start time in milliseconds
    pub time_ms: u64,

    /// Line text, timestamps stripped
    pub text: String,

    /// `false` for untimed lines interleaved with timed ones
    pub synced: bool,
}

/// Parse LRC (or plain) lyric text
///
/// - A line with several leading timestamps yields one entry per timestamp.
/// - Untimed, non-empty lines that are not tags become unsynced entries one
///   millisecond after the previous line, keeping their relative order.
/// - Metadata tags (`[ar:...]`, `[ti:...]`) and empty lines are dropped.
pub fn parse_lrc(raw: &str) -> Vec<LyricsLine> {
    let mut lines = Vec::new();
    let mut last_time_ms = 0u64;

    for row in raw.lines() {
        let mut rest = row.trim();
        let mut timestamps = Vec::new();

        while rest.starts_with('[') {
            let Some(end) = rest.find(']') else {
                break;
            };
            match parse_timestamp_tag(&rest[1..end]) {
                Some(ms) => timestamps.push(ms),
                None => break,
            }
            rest = rest[end + 1..].trim_start();
        }

        if timestamps.is_empty() {
            let text = row.trim();
            if !text.is_empty() && !text.starts_with('[') {
                last_time_ms += 1;
                lines.push(LyricsLine {
                    time_ms: last_time_ms,
                    text: text.to_string(),
                    synced: false,
                });
            }
            continue;
        }

        let text = rest.trim();
        if text.is_empty() {
            continue;
        }

        for time_ms in timestamps {
            lines.push(LyricsLine {
                time_ms,
                text: text.to_string(),
                synced: true,
            });
            last_time_ms = time_ms;
        }
    }

    // Stable: equal timestamps keep file order
    lines.sort_by_key(|line| line.time_ms);
    lines
}

/// Index of the line to highlight at `position_ms`
///
/// Returns `None` for empty lyrics and `Some(0)` before the first synced line.
pub fn active_line(lines: &[LyricsLine], position_ms: u64) -> Option<usize> {
    if lines.is_empty() {
        return None;
    }

    let target = position_ms.saturating_add(SYNC_OFFSET_MS);
    let index = lines
        .iter()
        .rposition(|line| line.synced && line.time_ms <= target)
        .unwrap_or(0);

    Some(index)
}

/// Parse `mm:ss`, `mm:ss.f`, `mm:ss.ff`, `mm:ss.fff` (or `:` before the fraction)
fn parse_timestamp_tag(tag: &str) -> Option<u64> {
    let (minutes, rest) = tag.split_once(':')?;
    let (seconds, fraction) = match rest.split_once(['.', ':']) {
        Some((s, f)) => (s, Some(f)),
        None => (rest, None),
    };

    if !is_digits(minutes) || !is_digits(seconds) {
        return None;
    }

    let minutes: u64 = minutes.parse().ok()?;
    let seconds: u64 = seconds.parse().ok()?;

    let millis = match fraction {
        None => 0,
        Some(f) if !is_digits(f) => return None,
        Some(f) => match f.len() {
            1 => f.parse::<u64>().ok()? * 100,
            2 => f.parse::<u64>().ok()? * 10,
            3 => f.parse::<u64>().ok()?,
            _ => 0,
        },
    };

    minutes
        .checked_mul(60_000)?
        .checked_add(seconds.checked_mul(1_000)?)?
        .checked_add(millis)
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
