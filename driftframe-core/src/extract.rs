//! Pure path and filename metadata extraction.
//!
//! Every provider needs the same filename/date heuristics; centralizing
//! them here keeps the regex sets from diverging. No I/O, never panics,
//! never errors — every function degrades to `None`/passthrough.

use chrono::{DateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use driftframe_model::{MediaKind, MediaMetadata};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp", "svg", "bmp", "heic"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mov", "m4v"];

// Built-in filename date patterns, tried in order. Datetime forms come
// before date-only forms so "20220727_140134" never half-matches.
static COMPACT_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)((?:19|20)\d{2})(\d{2})(\d{2})[_-](\d{2})(\d{2})(\d{2})(?:\D|$)")
        .expect("valid compact datetime regex")
});
static COMPACT_14: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)((?:19|20)\d{2})(\d{2})(\d{2})(\d{2})(\d{2})(\d{2})(?:\D|$)")
        .expect("valid 14-digit datetime regex")
});
static ISO_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"((?:19|20)\d{2})-(\d{2})-(\d{2})[ T](\d{2}):(\d{2}):(\d{2})")
        .expect("valid iso datetime regex")
});
static ISO_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)((?:19|20)\d{2})-(\d{2})-(\d{2})(?:\D|$)").expect("valid iso date regex")
});
static COMPACT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)((?:19|20)\d{2})(\d{2})(\d{2})(?:\D|$)").expect("valid compact date regex")
});
static DAY_FIRST_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\D)(\d{2})-(\d{2})-((?:19|20)\d{2})(?:\D|$)")
        .expect("valid day-first date regex")
});

/// Where a date candidate came from, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Filename,
    Folder,
}

/// Options influencing [`extract_path_metadata`].
#[derive(Debug, Clone, Default)]
pub struct PathMetadataOptions<'a> {
    /// Path segment marking the media root; the derived folder is
    /// relative to it.
    pub media_root_marker: &'a str,
    /// Custom token pattern tried against the folder name before any
    /// filename heuristics run.
    pub folder_date_pattern: Option<&'a str>,
}

/// Extract the display filename from a path or URI: strips a
/// pipe-delimited MIME suffix (`"file.jpg|image/jpeg"`), strips query
/// parameters, and returns the last path segment.
pub fn extract_filename(path: &str) -> String {
    let no_query = strip_query(path);
    let mut segments: Vec<&str> = no_query.split('|').collect();
    if segments.len() > 1 && segments.last().is_some_and(|s| s.contains('/')) {
        // Final pipe segment with a slash is a MIME type, not a path part.
        segments.pop();
    }
    let last = segments.last().copied().unwrap_or(no_query);
    last.rsplit('/').next().unwrap_or(last).to_string()
}

/// Classify a path by extension.
pub fn detect_kind(path: &str) -> MediaKind {
    let filename = extract_filename(path);
    let Some(ext) = filename.rsplit('.').next().filter(|e| *e != filename) else {
        return MediaKind::Unknown;
    };
    let ext = ext.to_ascii_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Image
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaKind::Video
    } else {
        MediaKind::Unknown
    }
}

/// Derive filename, media-root-relative folder, and a best-effort
/// capture date from a path alone. Index-derived metadata later merges
/// over whatever this returns.
pub fn extract_path_metadata(path: &str, opts: &PathMetadataOptions) -> MediaMetadata {
    let normalized = normalize_hierarchical_uri(strip_query(path));
    let filename = normalized
        .rsplit('/')
        .next()
        .unwrap_or(normalized.as_str())
        .to_string();

    let segments: Vec<&str> = normalized.split('/').filter(|s| !s.is_empty()).collect();
    let dir_segments = segments.len().saturating_sub(1);
    let folder = if opts.media_root_marker.is_empty() {
        None
    } else {
        segments[..dir_segments]
            .iter()
            .position(|s| *s == opts.media_root_marker)
            .map(|pos| segments[pos + 1..dir_segments].join("/"))
            .filter(|f| !f.is_empty())
    }
    .or_else(|| {
        (dir_segments > 0).then(|| segments[dir_segments - 1].to_string())
    });

    let mut captured_at = None;
    if let (Some(pattern), Some(folder)) = (opts.folder_date_pattern, folder.as_deref()) {
        let deepest = folder.rsplit('/').next().unwrap_or(folder);
        captured_at = extract_date_with_custom_format(deepest, pattern, DateSource::Folder);
    }
    if captured_at.is_none() {
        // Folder-pattern success suppresses the filename heuristics.
        captured_at = extract_date_from_filename(&filename);
    }

    MediaMetadata {
        filename: Some(filename),
        folder,
        captured_at,
        ..Default::default()
    }
}

/// Normalize a pipe-delimited hierarchical URI to slash form. Pipes are
/// treated as separators unless the final pipe segment contains a `/`,
/// which marks it as a MIME suffix to drop.
pub fn normalize_hierarchical_uri(path: &str) -> String {
    if !path.contains('|') {
        return path.to_string();
    }
    let mut segments: Vec<&str> = path.split('|').collect();
    if segments.last().is_some_and(|s| s.contains('/')) {
        segments.pop();
    }
    segments.join("/")
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

/// Try the built-in date patterns against a filename. Returns the first
/// candidate that forms a valid date.
pub fn extract_date_from_filename(filename: &str) -> Option<DateTime<Utc>> {
    for regex in [
        &*COMPACT_DATETIME,
        &*COMPACT_14,
        &*ISO_DATETIME,
    ] {
        if let Some(date) = first_datetime_match(regex, filename) {
            return Some(date);
        }
    }
    if let Some(caps) = ISO_DATE.captures(filename).or_else(|| COMPACT_DATE.captures(filename)) {
        if let Some(date) = build_date(
            parse_group(&caps, 1)?,
            parse_group(&caps, 2)?,
            parse_group(&caps, 3)?,
            0,
            0,
            0,
        ) {
            return Some(date);
        }
    }
    if let Some(caps) = DAY_FIRST_DATE.captures(filename) {
        if let Some(date) = build_date(
            parse_group(&caps, 3)?,
            parse_group(&caps, 2)?,
            parse_group(&caps, 1)?,
            0,
            0,
            0,
        ) {
            return Some(date);
        }
    }
    None
}

fn first_datetime_match(regex: &Regex, input: &str) -> Option<DateTime<Utc>> {
    let caps = regex.captures(input)?;
    build_date(
        parse_group(&caps, 1)?,
        parse_group(&caps, 2)?,
        parse_group(&caps, 3)?,
        parse_group(&caps, 4)?,
        parse_group(&caps, 5)?,
        parse_group(&caps, 6)?,
    )
}

/// The capture time used when ordering files chronologically. Some
/// vendors embed two timestamps in one URI (upload time, then capture
/// time); when two datetime candidates appear, the second one wins.
pub fn capture_time_for_ordering(path: &str) -> Option<DateTime<Utc>> {
    let filename = extract_filename(path);
    let mut candidates: Vec<(usize, DateTime<Utc>)> = Vec::new();
    for regex in [&*COMPACT_DATETIME, &*COMPACT_14, &*ISO_DATETIME] {
        // Restart just past each year group: the boundary character is
        // consumed by the match, so captures_iter would step over a
        // second timestamp that directly follows the first.
        let mut pos = 0;
        while let Some(caps) = regex.captures_at(&filename, pos) {
            let start = caps.get(1).map(|m| m.start()).unwrap_or(pos);
            pos = start + 1;
            if candidates.iter().any(|(s, _)| *s == start) {
                continue;
            }
            if let Some(date) = (|| {
                build_date(
                    parse_group(&caps, 1)?,
                    parse_group(&caps, 2)?,
                    parse_group(&caps, 3)?,
                    parse_group(&caps, 4)?,
                    parse_group(&caps, 5)?,
                    parse_group(&caps, 6)?,
                )
            })() {
                candidates.push((start, date));
            }
        }
    }
    candidates.sort_by_key(|(start, _)| *start);
    match candidates.len() {
        0 => extract_date_from_filename(&filename),
        1 => Some(candidates[0].1),
        _ => Some(candidates[1].1),
    }
}

/// Match `input` against a token pattern (`YYYY`, `MM`, `DD`, `HH`,
/// `mm`, `ss`; everything else literal). Capture groups are consumed in
/// the order the tokens appear in the pattern. Returns `None` on any
/// mismatch, out-of-range year, or impossible date — never errors.
pub fn extract_date_with_custom_format(
    input: &str,
    pattern: &str,
    source: DateSource,
) -> Option<DateTime<Utc>> {
    let (regex, tokens) = compile_token_pattern(pattern)?;
    let caps = regex.captures(input)?;

    let mut year: Option<i32> = None;
    let (mut month, mut day, mut hour, mut minute, mut second) = (1u32, 1u32, 0u32, 0u32, 0u32);
    for (group, token) in tokens.iter().enumerate() {
        let value = caps.get(group + 1)?.as_str();
        match token {
            DateToken::Year => year = value.parse().ok(),
            DateToken::Month => month = value.parse().ok()?,
            DateToken::Day => day = value.parse().ok()?,
            DateToken::Hour => hour = value.parse().ok()?,
            DateToken::Minute => minute = value.parse().ok()?,
            DateToken::Second => second = value.parse().ok()?,
        }
    }

    let date = build_date(year?, month, day, hour, minute, second);
    if date.is_none() {
        debug!(?source, pattern, input, "custom date pattern matched but produced no valid date");
    }
    date
}

#[derive(Debug, Clone, Copy)]
enum DateToken {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

fn compile_token_pattern(pattern: &str) -> Option<(Regex, Vec<DateToken>)> {
    const TOKENS: &[(&str, DateToken, &str)] = &[
        ("YYYY", DateToken::Year, r"(\d{4})"),
        ("MM", DateToken::Month, r"(\d{2})"),
        ("DD", DateToken::Day, r"(\d{2})"),
        ("HH", DateToken::Hour, r"(\d{2})"),
        ("mm", DateToken::Minute, r"(\d{2})"),
        ("ss", DateToken::Second, r"(\d{2})"),
    ];

    let mut source = String::from("^");
    let mut tokens = Vec::new();
    let mut rest = pattern;
    'outer: while !rest.is_empty() {
        for (literal, token, fragment) in TOKENS {
            if let Some(tail) = rest.strip_prefix(literal) {
                source.push_str(fragment);
                tokens.push(*token);
                rest = tail;
                continue 'outer;
            }
        }
        let ch = rest.chars().next().expect("rest is non-empty");
        source.push_str(&regex::escape(&ch.to_string()));
        rest = &rest[ch.len_utf8()..];
    }
    source.push('$');

    if !tokens.iter().any(|t| matches!(t, DateToken::Year)) {
        return None;
    }
    Regex::new(&source).ok().map(|r| (r, tokens))
}

fn parse_group<T: std::str::FromStr>(caps: &regex::Captures<'_>, idx: usize) -> Option<T> {
    caps.get(idx)?.as_str().parse().ok()
}

fn build_date(
    year: i32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
) -> Option<DateTime<Utc>> {
    if !(1900..=2100).contains(&year) {
        return None;
    }
    Utc.with_ymd_and_hms(year, month, day, hour, minute, second)
        .single()
}

/// Best-effort ordinal for sorting folders named by date: compact
/// `YYYYMMDD`, separated `YYYY-MM-DD`, `YYYY-MM`, bare years, and bare
/// day numbers all produce comparable values. Non-date names return
/// `None` and should fall back to lexical order. Lossy by design.
pub fn folder_date_value(name: &str) -> Option<i64> {
    static YMD: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^((?:19|20)\d{2})[-_.]?(\d{1,2})[-_.]?(\d{1,2})$").expect("valid ymd regex")
    });
    static YM: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^((?:19|20)\d{2})[-_.](\d{1,2})$").expect("valid ym regex"));
    static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?:19|20)\d{2}$").expect("valid year regex"));
    static DAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}$").expect("valid day regex"));

    if let Some(caps) = YMD.captures(name) {
        let y: i64 = caps[1].parse().ok()?;
        let m: i64 = caps[2].parse().ok()?;
        let d: i64 = caps[3].parse().ok()?;
        if (1..=12).contains(&m) && (1..=31).contains(&d) {
            return Some(y * 10_000 + m * 100 + d);
        }
    }
    if let Some(caps) = YM.captures(name) {
        let y: i64 = caps[1].parse().ok()?;
        let m: i64 = caps[2].parse().ok()?;
        if (1..=12).contains(&m) {
            return Some(y * 10_000 + m * 100);
        }
    }
    if YEAR.is_match(name) {
        return name.parse::<i64>().ok().map(|y| y * 10_000);
    }
    if DAY.is_match(name) {
        return name.parse().ok();
    }
    None
}
