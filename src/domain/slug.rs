//! Heading anchors for rendered post bodies.
//!
//! Anchors are ASCII slugs (`slug` crate); Chinese headings are transliterated
//! through `pinyin` first so "深入理解" becomes `shen-ru-li-jie` rather than an
//! empty string.

use std::collections::HashMap;

use pinyin::{Pinyin, ToPinyin};
use slug::slugify;

/// Derive a slug from heading text, or `None` when nothing representable remains.
pub fn derive_slug(input: &str) -> Option<String> {
    if input.trim().is_empty() {
        return None;
    }

    let candidate = slugify(transliterate_to_ascii(input));
    (!candidate.is_empty()).then_some(candidate)
}

/// Hands out unique anchors for the headings of one document, in order.
///
/// Duplicates get monotonic suffixes (`setup`, `setup-2`); headings that do
/// not slugify fall back to their position (`section-3`).
#[derive(Debug, Default)]
pub struct HeadingAnchors {
    occurrences: HashMap<String, usize>,
    issued: usize,
}

impl HeadingAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor_for(&mut self, heading: &str) -> String {
        self.issued += 1;
        let base = derive_slug(heading).unwrap_or_else(|| format!("section-{}", self.issued));
        let count = self.occurrences.entry(base.clone()).or_insert(0);
        *count += 1;

        if *count == 1 {
            base
        } else {
            format!("{base}-{}", *count)
        }
    }
}

fn transliterate_to_ascii(input: &str) -> String {
    let mut output = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch.is_ascii() {
            output.push(ch);
            continue;
        }

        match ch.to_pinyin() {
            Some(py) => append_pinyin(&mut output, py),
            None if ch.is_whitespace() => output.push(' '),
            None => output.push(ch),
        }
    }

    output
}

fn append_pinyin(buffer: &mut String, pinyin: Pinyin) {
    if !buffer.is_empty() && !buffer.ends_with(' ') {
        buffer.push(' ');
    }
    buffer.push_str(pinyin.plain());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_transliterates_chinese() {
        assert_eq!(
            derive_slug("Rust 基础教程").as_deref(),
            Some("rust-ji-chu-jiao-cheng")
        );
    }

    #[test]
    fn derive_slug_rejects_blank_input() {
        assert_eq!(derive_slug("   "), None);
        assert_eq!(derive_slug("!!!"), None);
    }

    #[test]
    fn anchors_are_unique_within_a_document() {
        let mut anchors = HeadingAnchors::new();

        assert_eq!(anchors.anchor_for("Overview"), "overview");
        assert_eq!(anchors.anchor_for("Overview"), "overview-2");
        assert_eq!(anchors.anchor_for("深入理解"), "shen-ru-li-jie");
    }

    #[test]
    fn unrepresentable_headings_fall_back_to_position() {
        let mut anchors = HeadingAnchors::new();

        assert_eq!(anchors.anchor_for("Intro"), "intro");
        assert_eq!(anchors.anchor_for("???"), "section-2");
    }
}
