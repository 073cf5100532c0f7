use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::item::MediaItem;
use crate::sort::{OrderBy, sort_date};

/// The sort-field value half of a pagination cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CursorValue {
    Date(DateTime<Utc>),
    Text(String),
}

/// Compound pagination cursor: the last item returned, keyed by the
/// active sort value plus a monotonic row id from the backing index.
/// The tie-break id is what lets a query advance past runs of equal
/// sort values without skipping or repeating rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageCursor {
    pub sort_value: CursorValue,
    pub tie_break_id: i64,
}

impl PageCursor {
    /// Build the cursor that represents "everything strictly after
    /// `item`" for the given sort field. Returns `None` when the item
    /// carries no index row id (nothing to tie-break on) or no usable
    /// sort value.
    pub fn for_item(item: &MediaItem, order_by: OrderBy) -> Option<Self> {
        let tie_break_id = item.index_id()?;
        let sort_value = match order_by {
            OrderBy::DateTaken | OrderBy::ModifiedTime => CursorValue::Date(sort_date(item)?),
            OrderBy::Filename => CursorValue::Text(item.filename()?.to_string()),
            OrderBy::Path => CursorValue::Text(item.id.clone()),
        };
        Some(Self {
            sort_value,
            tie_break_id,
        })
    }
}
