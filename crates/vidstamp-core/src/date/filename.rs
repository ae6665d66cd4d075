use std::path::Path;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use regex::Regex;

struct DatePattern {
    regex: &'static LazyLock<Regex>,
    format: &'static str,
}

static RE_DASHED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>20\d{2}-(0[1-9]|1[0-2])-[0-3]\d-[0-2]\d-[0-5]\d-[0-5]\d)").unwrap()
});

static RE_COMPACT_DASH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>20\d{2}(0[1-9]|1[0-2])[0-3]\d-[0-2]\d[0-5]\d[0-5]\d)").unwrap()
});

static RE_UNDERSCORED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>20\d{2}_(0[1-9]|1[0-2])_[0-3]\d_[0-2]\d_[0-5]\d_[0-5]\d)").unwrap()
});

static RE_COMPACT_UNDERSCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<date>20\d{2}(0[1-9]|1[0-2])[0-3]\d_[0-2]\d[0-5]\d[0-5]\d)").unwrap()
});

static PATTERNS: &[DatePattern] = &[
    DatePattern { regex: &RE_DASHED, format: "%Y-%m-%d-%H-%M-%S" },
    DatePattern { regex: &RE_COMPACT_DASH, format: "%Y%m%d-%H%M%S" },
    DatePattern { regex: &RE_UNDERSCORED, format: "%Y_%m_%d_%H_%M_%S" },
    DatePattern { regex: &RE_COMPACT_UNDERSCORE, format: "%Y%m%d_%H%M%S" },
];

/// Date-time digit runs recognized in file names, tried in order of how
/// specific their separators are. Years before 2000 never match.
pub fn date_from_filename(filename: &str) -> Option<DateTime<Utc>> {
    let basename = Path::new(filename)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(filename);

    for pattern in PATTERNS {
        let Some(caps) = pattern.regex.captures(basename) else {
            continue;
        };
        let Some(matched) = caps.name("date") else {
            continue;
        };
        if let Ok(parsed) = NaiveDateTime::parse_from_str(matched.as_str(), pattern.format) {
            if parsed.year() >= 2000 {
                return Some(parsed.and_utc());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_dashed_filename() {
        let expected = Utc.with_ymd_and_hms(2023, 11, 5, 14, 30, 0).unwrap();
        assert_eq!(date_from_filename("2023-11-05-14-30-00.mov"), Some(expected));
    }

    #[test]
    fn test_compact_filename_with_dash() {
        let expected = Utc.with_ymd_and_hms(2022, 7, 14, 9, 5, 33).unwrap();
        assert_eq!(date_from_filename("VID_20220714-090533.mp4"), Some(expected));
    }

    #[test]
    fn test_underscored_filename() {
        let expected = Utc.with_ymd_and_hms(2021, 2, 28, 23, 59, 59).unwrap();
        assert_eq!(date_from_filename("clip_2021_02_28_23_59_59_final.mov"), Some(expected));
    }

    #[test]
    fn test_compact_filename_with_underscore() {
        let expected = Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 1).unwrap();
        assert_eq!(date_from_filename("20241201_000001.mp4"), Some(expected));
    }

    #[test]
    fn test_full_path_uses_basename() {
        let expected = Utc.with_ymd_and_hms(2023, 11, 5, 14, 30, 0).unwrap();
        assert_eq!(
            date_from_filename("/backups/2019/2023-11-05-14-30-00.mov"),
            Some(expected)
        );
    }

    #[test]
    fn test_no_date_in_name() {
        assert_eq!(date_from_filename("DJI_0042.MP4"), None);
        assert_eq!(date_from_filename("holiday.mov"), None);
    }

    #[test]
    fn test_pre_2000_years_never_match() {
        assert_eq!(date_from_filename("1999-12-31-23-59-59.mov"), None);
    }

    #[test]
    fn test_impossible_dates_rejected() {
        // Digit shape matches, calendar does not.
        assert_eq!(date_from_filename("2023-02-31-10-00-00.mov"), None);
    }
}
