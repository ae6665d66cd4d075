use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use regex::Regex;
use tracing::debug;

use crate::atom::{self, AtomNode};
use crate::metadata::GpsCoordinates;

/// Seconds between the QuickTime epoch (1904-01-01) and the Unix epoch.
pub const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Apple annotation tags carried under `udta` or `ilst`.
pub const DAY: &[u8; 4] = b"\xa9day";
pub const MAKE: &[u8; 4] = b"\xa9mak";
pub const MODEL: &[u8; 4] = b"\xa9mod";
pub const SOFTWARE: &[u8; 4] = b"\xa9swr";
pub const LOCATION: &[u8; 4] = b"\xa9xyz";

/// Creation time from a movie header payload. Zero and future values are
/// rejected; cameras with a dead clock write the epoch itself.
pub fn mvhd_creation_time(node: &AtomNode, buf: &[u8], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let payload = node.payload(buf);
    let version = *payload.first()?;
    let mac_seconds = match version {
        // 32-bit creation time right after version/flags.
        0 => atom::be_u32(payload, 4)? as i64,
        // Version 1 widens the field to 64 bits; the low word carries the
        // whole plausible range.
        1 => atom::be_u32(payload, 8)? as i64,
        _ => return None,
    };
    let unix = mac_seconds - MAC_EPOCH_OFFSET;
    if unix <= 0 {
        return None;
    }
    let ts = DateTime::from_timestamp(unix, 0)?;
    if ts > now {
        debug!(%ts, "movie header creation time is in the future, ignoring");
        return None;
    }
    Some(ts)
}

/// Text value of an Apple annotation tag. The value sits in a nested
/// `data` sub-atom: 8-byte header, 4-byte type indicator, 4-byte locale,
/// then UTF-8 text.
pub fn apple_text(node: &AtomNode, buf: &[u8]) -> Option<String> {
    let end = node.end().min(buf.len() as u64);
    let mut cursor = node.data_offset;
    while cursor + 8 <= end {
        let head = cursor as usize;
        let size = atom::be_u32(buf, head)? as u64;
        if size < 8 || cursor + size > end {
            return None;
        }
        if &buf[head + 4..head + 8] == b"data" {
            if size <= 16 {
                return None;
            }
            let raw = &buf[head + 16..(cursor + size) as usize];
            let text = std::str::from_utf8(raw).ok()?.trim_end_matches('\0').trim();
            return (!text.is_empty()).then(|| text.to_string());
        }
        cursor += size;
    }
    None
}

static ISO6709_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-]\d+(?:\.\d+)?)([+-]\d+(?:\.\d+)?)").unwrap());

/// Coordinates from an ISO 6709 string such as `+37.7749-122.4194/`.
/// Altitude and the trailing solidus are ignored.
pub fn parse_iso6709(text: &str) -> Option<GpsCoordinates> {
    let caps = ISO6709_RE.captures(text.trim())?;
    let latitude: f64 = caps[1].parse().ok()?;
    let longitude: f64 = caps[2].parse().ok()?;
    if latitude.abs() > 90.0 || longitude.abs() > 180.0 {
        return None;
    }
    Some(GpsCoordinates { latitude, longitude })
}

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y:%m:%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Parse an embedded date string. `©day` values often append a timezone
/// suffix (`2023-11-05T14:30:22+0900`); only the 19-character head is read
/// and the instant is taken as UTC. Years before 2000 are rejected.
pub fn normalize_date_string(text: &str) -> Option<DateTime<Utc>> {
    let head: String = text.trim().chars().take(19).collect();
    for format in DATE_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&head, format) {
            if parsed.year() < 2000 {
                return None;
            }
            return Some(parsed.and_utc());
        }
    }
    None
}

/// First valid embedded timestamp in pinned traversal order: top-level
/// atoms in file order, the movie header before `udta` inside `moov`, and
/// direct `©day` tags before the nested `meta` tree inside `udta`. The
/// order is the tie-break when sources disagree, so it must not change.
pub fn first_timestamp(nodes: &[AtomNode], buf: &[u8], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    nodes.iter().find_map(|node| timestamp_under(node, buf, now))
}

fn timestamp_under(node: &AtomNode, buf: &[u8], now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match &node.kind {
        b"mvhd" => mvhd_creation_time(node, buf, now),
        DAY => apple_text(node, buf).and_then(|text| normalize_date_string(&text)),
        b"moov" => {
            let header = node
                .children
                .iter()
                .filter(|child| &child.kind == b"mvhd")
                .find_map(|child| mvhd_creation_time(child, buf, now));
            header.or_else(|| {
                node.children
                    .iter()
                    .filter(|child| &child.kind != b"mvhd")
                    .find_map(|child| timestamp_under(child, buf, now))
            })
        }
        b"udta" => {
            let direct = node
                .children
                .iter()
                .filter(|child| &child.kind == DAY)
                .find_map(|child| timestamp_under(child, buf, now));
            direct.or_else(|| {
                node.children
                    .iter()
                    .filter(|child| &child.kind != DAY)
                    .find_map(|child| timestamp_under(child, buf, now))
            })
        }
        _ => node
            .children
            .iter()
            .find_map(|child| timestamp_under(child, buf, now)),
    }
}

/// First in-range GPS fix anywhere in the tree.
pub fn first_gps(nodes: &[AtomNode], buf: &[u8]) -> Option<GpsCoordinates> {
    let mut found = None;
    atom::walk(nodes, &mut |node| {
        if found.is_none() && &node.kind == LOCATION {
            found = apple_text(node, buf).and_then(|text| parse_iso6709(&text));
        }
    });
    found
}

/// Make, model, and software strings joined into one identity line,
/// e.g. `Apple iPhone 14 Pro 16.1`.
pub fn device_info(nodes: &[AtomNode], buf: &[u8]) -> Option<String> {
    let mut make = None;
    let mut model = None;
    let mut software = None;
    atom::walk(nodes, &mut |node| {
        let slot = match &node.kind {
            MAKE => &mut make,
            MODEL => &mut model,
            SOFTWARE => &mut software,
            _ => return,
        };
        if slot.is_none() {
            *slot = apple_text(node, buf);
        }
    });
    let parts: Vec<String> = [make, model, software].into_iter().flatten().collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}
