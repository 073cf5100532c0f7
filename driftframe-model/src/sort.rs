//! Sort fields and comparators for ordered traversal.
//!
//! Missing values sort last regardless of direction, so a descending
//! date sort still puts undated items at the tail instead of the head.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::MediaItem;

/// Sort field for ordered (sequential) traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    DateTaken,
    Filename,
    Path,
    ModifiedTime,
}

impl OrderBy {
    /// Date-keyed fields need the client-side re-sort with the
    /// three-way date fallback (the backend's null handling for missing
    /// dates is not trusted).
    pub fn is_date(&self) -> bool {
        matches!(self, OrderBy::DateTaken | OrderBy::ModifiedTime)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderBy::DateTaken => "date_taken",
            OrderBy::Filename => "filename",
            OrderBy::Path => "path",
            OrderBy::ModifiedTime => "modified_time",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderDirection::Asc => "asc",
            OrderDirection::Desc => "desc",
        }
    }

    pub fn is_desc(&self) -> bool {
        matches!(self, OrderDirection::Desc)
    }
}

/// The effective sort date of an item: captured-at first, then
/// modified-time, then created-time.
pub fn sort_date(item: &MediaItem) -> Option<DateTime<Utc>> {
    let meta = item.metadata.as_ref()?;
    meta.captured_at.or(meta.modified_at).or(meta.created_at)
}

/// Compare two items by their fallback sort date, honoring `direction`
/// for present values while keeping missing values at the tail.
pub fn compare_by_date_fallback(
    a: &MediaItem,
    b: &MediaItem,
    direction: OrderDirection,
) -> Ordering {
    match (sort_date(a), sort_date(b)) {
        (Some(da), Some(db)) => {
            if direction.is_desc() {
                db.cmp(&da)
            } else {
                da.cmp(&db)
            }
        }
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{MediaKind, MediaMetadata};
    use chrono::TimeZone;

    fn dated(id: &str, ts: Option<i64>) -> MediaItem {
        MediaItem::new(id, MediaKind::Image).with_metadata(MediaMetadata {
            captured_at: ts.map(|t| Utc.timestamp_opt(t, 0).unwrap()),
            ..Default::default()
        })
    }

    #[test]
    fn missing_dates_sort_last_in_both_directions() {
        let mut items = vec![dated("a", Some(100)), dated("b", None), dated("c", Some(200))];
        items.sort_by(|x, y| compare_by_date_fallback(x, y, OrderDirection::Desc));
        assert_eq!(
            items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            ["c", "a", "b"]
        );

        items.sort_by(|x, y| compare_by_date_fallback(x, y, OrderDirection::Asc));
        assert_eq!(
            items.iter().map(|i| i.id.as_str()).collect::<Vec<_>>(),
            ["a", "c", "b"]
        );
    }

    #[test]
    fn modified_time_backfills_missing_capture_date() {
        let mut undated = dated("m", None);
        undated.metadata.as_mut().unwrap().modified_at =
            Some(Utc.timestamp_opt(300, 0).unwrap());
        let items = [dated("a", Some(100)), undated];
        assert_eq!(
            compare_by_date_fallback(&items[1], &items[0], OrderDirection::Asc),
            std::cmp::Ordering::Greater
        );
    }
}
