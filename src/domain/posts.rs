use time::{Date, format_description::FormatItem, macros::format_description};

pub const MONTH_KEY_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month padding:zero]");
pub const MONTH_LABEL_FORMAT: &[FormatItem<'static>] =
    format_description!("[month repr:long] [year]");

/// Number of characters kept when an excerpt is derived from the post body.
pub const EXCERPT_CHARS: usize = 54;

/// Posts per calendar month, newest month first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthCount {
    pub year: i32,
    pub month: u8,
    pub key: String,
    pub label: String,
    pub count: u64,
}

impl MonthCount {
    pub fn new(date: Date, count: u64) -> Self {
        Self {
            year: date.year(),
            month: u8::from(date.month()),
            key: month_key_for(date),
            label: month_label_for(date),
            count,
        }
    }
}

pub fn month_key_for(date: Date) -> String {
    date.format(MONTH_KEY_FORMAT).expect("valid month key")
}

pub fn month_label_for(date: Date) -> String {
    date.format(MONTH_LABEL_FORMAT).expect("valid month label")
}

/// Collapse runs of whitespace and keep the first [`EXCERPT_CHARS`] characters.
pub fn excerpt_from_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(EXCERPT_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use time::{Month, macros::date};

    use super::*;

    #[test]
    fn month_count_carries_key_and_label() {
        let entry = MonthCount::new(date!(2023 - 03 - 14), 4);
        assert_eq!(entry.key, "2023-03");
        assert_eq!(entry.label, "March 2023");
        assert_eq!(entry.year, 2023);
        assert_eq!(entry.month, u8::from(Month::March));
        assert_eq!(entry.count, 4);
    }

    #[test]
    fn excerpt_is_bounded_and_whitespace_collapsed() {
        let text = "first   line\n\nsecond line ".repeat(10);
        let excerpt = excerpt_from_text(&text);
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS);
        assert!(excerpt.starts_with("first line second line first line"));
        assert!(!excerpt.contains('\n'));
    }

    #[test]
    fn excerpt_counts_characters_not_bytes() {
        let text = "中文摘要".repeat(20);
        let excerpt = excerpt_from_text(&text);
        assert_eq!(excerpt.chars().count(), EXCERPT_CHARS);
    }

    #[test]
    fn short_text_is_kept_whole() {
        assert_eq!(excerpt_from_text("  hello world "), "hello world");
    }
}
