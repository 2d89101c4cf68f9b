//! Translate a requested listing view into a storage filter.
//!
//! Resolution is pure: the only outside knowledge is a [`Taxonomy`] snapshot
//! of the category and tag ids that exist, used to reject unknown ids before
//! storage is asked anything.

use std::collections::HashSet;

use thiserror::Error;
use time::{Date, Month, OffsetDateTime};
use uuid::Uuid;

use crate::domain::entities::PostRecord;

/// The listing a reader asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewSelector {
    All,
    ByCategory(Uuid),
    ByTag(Uuid),
    ByDateRange { year: i32, month: u32 },
    BySearch(String),
}

impl ViewSelector {
    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ViewSelector::All => "all",
            ViewSelector::ByCategory(_) => "category",
            ViewSelector::ByTag(_) => "tag",
            ViewSelector::ByDateRange { .. } => "archive",
            ViewSelector::BySearch(_) => "search",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest first, ties broken by descending id.
    #[default]
    CreatedDesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostPredicate {
    Any,
    Category(Uuid),
    Tag(Uuid),
    /// Half-open: `start <= created_at < end`.
    CreatedWithin {
        start: OffsetDateTime,
        end: OffsetDateTime,
    },
    /// Lower-cased needle matched against title or body.
    Search(String),
}

impl PostPredicate {
    pub fn matches(&self, post: &PostRecord) -> bool {
        match self {
            PostPredicate::Any => true,
            PostPredicate::Category(id) => post.category_id == *id,
            PostPredicate::Tag(id) => post.tag_ids.contains(id),
            PostPredicate::CreatedWithin { start, end } => {
                *start <= post.created_at && post.created_at < *end
            }
            PostPredicate::Search(needle) => {
                post.title.to_lowercase().contains(needle.as_str())
                    || post.body_markdown.to_lowercase().contains(needle.as_str())
            }
        }
    }
}

/// Predicate plus ordering, handed to storage as one value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostFilter {
    pub predicate: PostPredicate,
    pub sort: SortOrder,
}

impl PostFilter {
    pub fn all() -> Self {
        Self {
            predicate: PostPredicate::Any,
            sort: SortOrder::CreatedDesc,
        }
    }

    pub fn matches(&self, post: &PostRecord) -> bool {
        self.predicate.matches(post)
    }
}

impl Default for PostFilter {
    fn default() -> Self {
        Self::all()
    }
}

/// Known category and tag ids at the time of the request.
#[derive(Debug, Clone, Default)]
pub struct Taxonomy {
    categories: HashSet<Uuid>,
    tags: HashSet<Uuid>,
}

impl Taxonomy {
    pub fn new(
        categories: impl IntoIterator<Item = Uuid>,
        tags: impl IntoIterator<Item = Uuid>,
    ) -> Self {
        Self {
            categories: categories.into_iter().collect(),
            tags: tags.into_iter().collect(),
        }
    }

    pub fn has_category(&self, id: Uuid) -> bool {
        self.categories.contains(&id)
    }

    pub fn has_tag(&self, id: Uuid) -> bool {
        self.tags.contains(&id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolverError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: &'static str, id: Uuid },
    #[error("search query is empty")]
    EmptyQuery,
}

/// Resolve `selector` into the filter storage should apply.
pub fn resolve(selector: &ViewSelector, taxonomy: &Taxonomy) -> Result<PostFilter, ResolverError> {
    let predicate = match selector {
        ViewSelector::All => PostPredicate::Any,
        ViewSelector::ByCategory(id) => {
            if !taxonomy.has_category(*id) {
                return Err(ResolverError::NotFound {
                    entity: "category",
                    id: *id,
                });
            }
            PostPredicate::Category(*id)
        }
        ViewSelector::ByTag(id) => {
            if !taxonomy.has_tag(*id) {
                return Err(ResolverError::NotFound {
                    entity: "tag",
                    id: *id,
                });
            }
            PostPredicate::Tag(*id)
        }
        ViewSelector::ByDateRange { year, month } => {
            let (start, end) = month_bounds(*year, *month)?;
            PostPredicate::CreatedWithin { start, end }
        }
        ViewSelector::BySearch(query) => {
            let needle = query.trim();
            if needle.is_empty() {
                return Err(ResolverError::EmptyQuery);
            }
            PostPredicate::Search(needle.to_lowercase())
        }
    };

    Ok(PostFilter {
        predicate,
        sort: SortOrder::CreatedDesc,
    })
}

/// Last year whose following month still fits the calendar.
pub const MAX_YEAR: i32 = 9998;

/// First instant of `year-month` and of the month after it, in UTC.
pub fn month_bounds(year: i32, month: u32) -> Result<(OffsetDateTime, OffsetDateTime), ResolverError> {
    if !(1..=MAX_YEAR).contains(&year) {
        return Err(ResolverError::InvalidArgument(format!(
            "year must be within 1..={MAX_YEAR}, got {year}"
        )));
    }

    let month = u8::try_from(month)
        .ok()
        .and_then(|value| Month::try_from(value).ok())
        .ok_or_else(|| {
            ResolverError::InvalidArgument(format!("month must be within 1..=12, got {month}"))
        })?;

    let (next_year, next_month) = match month {
        Month::December => (year + 1, Month::January),
        other => (year, other.next()),
    };

    let start = first_instant(year, month)?;
    let end = first_instant(next_year, next_month)?;
    Ok((start, end))
}

fn first_instant(year: i32, month: Month) -> Result<OffsetDateTime, ResolverError> {
    Date::from_calendar_date(year, month, 1)
        .map(|date| date.midnight().assume_utc())
        .map_err(|err| ResolverError::InvalidArgument(format!("year {year} out of range: {err}")))
}
