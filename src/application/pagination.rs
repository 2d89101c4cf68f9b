//! Numbered pagination: page slices and the navigation window shown under a
//! listing.
//!
//! Requests for pages past either end are clamped into range rather than
//! rejected, so `?page=999` on a three-page listing shows page 3. Only a zero
//! page size or a zero page number is an error.

use thiserror::Error;

/// Pages shown on each side of the current page.
pub const WINDOW_RADIUS: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaginationError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// One entry of a navigation control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavToken {
    Page(u32),
    Ellipsis,
}

/// Everything a template needs to draw the page links of a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationWindow {
    /// Empty whenever `is_paginated` is false.
    pub tokens: Vec<NavToken>,
    pub current_page: u32,
    pub total_pages: u32,
    pub has_previous: bool,
    pub has_next: bool,
    pub is_paginated: bool,
}

impl NavigationWindow {
    pub fn previous_page(&self) -> Option<u32> {
        self.has_previous.then(|| self.current_page - 1)
    }

    pub fn next_page(&self) -> Option<u32> {
        self.has_next.then(|| self.current_page + 1)
    }

    /// Offset and limit of the current page, for the storage fetch.
    pub fn page_request(&self, page_size: u32) -> PageRequest {
        PageRequest::for_page(self.current_page, page_size)
    }
}

/// Offset-based fetch window handed to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: u64,
    pub limit: u32,
}

impl PageRequest {
    pub fn new(offset: u64, limit: u32) -> Self {
        Self { offset, limit }
    }

    /// `page_number` is 1-based and expected to be clamped already.
    pub fn for_page(page_number: u32, page_size: u32) -> Self {
        let offset = u64::from(page_number.saturating_sub(1)) * u64::from(page_size);
        Self::new(offset, page_size)
    }
}

/// The items of one page together with the numbers that locate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: u32,
    pub page_size: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page_number: u32, page_size: u32, total_items: u64) -> Self {
        Self {
            items,
            page_number,
            page_size,
            total_items,
        }
    }
}

/// `ceil(total_items / page_size)`, never less than one.
pub fn total_pages(total_items: u64, page_size: u32) -> Result<u32, PaginationError> {
    if page_size == 0 {
        return Err(PaginationError::InvalidArgument(
            "page size must be positive",
        ));
    }

    let pages = total_items.div_ceil(u64::from(page_size)).max(1);
    u32::try_from(pages)
        .map_err(|_| PaginationError::InvalidArgument("page count exceeds supported range"))
}

pub fn clamp_page(requested_page: u32, total_pages: u32) -> u32 {
    requested_page.clamp(1, total_pages.max(1))
}

/// Compute the navigation window for `requested_page` of a listing holding
/// `total_items` items.
pub fn paginate(
    total_items: u64,
    page_size: u32,
    requested_page: u32,
) -> Result<NavigationWindow, PaginationError> {
    ensure_page_number(requested_page)?;
    let total_pages = total_pages(total_items, page_size)?;
    let current_page = clamp_page(requested_page, total_pages);

    let is_paginated = total_pages > 1;
    let tokens = if is_paginated {
        window_tokens(current_page, total_pages)
    } else {
        Vec::new()
    };

    Ok(NavigationWindow {
        tokens,
        current_page,
        total_pages,
        has_previous: current_page > 1,
        has_next: current_page < total_pages,
        is_paginated,
    })
}

/// Cut the requested page out of an already ordered sequence, clamping the
/// page number the same way [`paginate`] does.
pub fn slice<T>(
    items: Vec<T>,
    page_size: u32,
    requested_page: u32,
) -> Result<Page<T>, PaginationError> {
    ensure_page_number(requested_page)?;
    let total_items = items.len() as u64;
    let page_number = clamp_page(requested_page, total_pages(total_items, page_size)?);
    let request = PageRequest::for_page(page_number, page_size);

    let offset = usize::try_from(request.offset).unwrap_or(usize::MAX);
    let page_items = items
        .into_iter()
        .skip(offset)
        .take(page_size as usize)
        .collect();

    Ok(Page::new(page_items, page_number, page_size, total_items))
}

/// Reject page number zero; every other value is clamped later.
pub fn ensure_page_number(requested_page: u32) -> Result<(), PaginationError> {
    if requested_page == 0 {
        return Err(PaginationError::InvalidArgument(
            "page number must be positive",
        ));
    }
    Ok(())
}

fn window_tokens(current_page: u32, total_pages: u32) -> Vec<NavToken> {
    let start = current_page.saturating_sub(WINDOW_RADIUS).max(1);
    let end = current_page.saturating_add(WINDOW_RADIUS).min(total_pages);

    let mut tokens = Vec::with_capacity((end - start) as usize + 5);

    if start > 1 {
        tokens.push(NavToken::Page(1));
        if start >= 3 {
            tokens.push(NavToken::Ellipsis);
        }
    }

    tokens.extend((start..=end).map(NavToken::Page));

    if end < total_pages {
        if end <= total_pages - 2 {
            tokens.push(NavToken::Ellipsis);
        }
        tokens.push(NavToken::Page(total_pages));
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::NavToken::{Ellipsis, Page as P};
    use super::*;

    fn tokens(total_items: u64, page_size: u32, page: u32) -> Vec<NavToken> {
        paginate(total_items, page_size, page)
            .expect("valid arguments")
            .tokens
    }

    #[test]
    fn two_pages_have_no_ellipsis() {
        assert_eq!(tokens(20, 10, 1), vec![P(1), P(2)]);
        assert_eq!(tokens(20, 10, 2), vec![P(1), P(2)]);
    }

    #[test]
    fn first_of_ten_pages_pins_last_page() {
        assert_eq!(tokens(100, 10, 1), vec![P(1), P(2), P(3), Ellipsis, P(10)]);
    }

    #[test]
    fn last_of_ten_pages_pins_first_page() {
        assert_eq!(tokens(100, 10, 10), vec![P(1), Ellipsis, P(8), P(9), P(10)]);
    }

    #[test]
    fn middle_page_has_ellipsis_on_both_sides() {
        assert_eq!(
            tokens(100, 10, 5),
            vec![P(1), Ellipsis, P(3), P(4), P(5), P(6), P(7), Ellipsis, P(10)]
        );
    }

    #[test]
    fn adjacent_window_does_not_insert_ellipsis() {
        // window [2..6]: page 1 is pinned directly against it
        assert_eq!(
            tokens(100, 10, 4),
            vec![P(1), P(2), P(3), P(4), P(5), P(6), Ellipsis, P(10)]
        );
        // window [5..9]: page 10 follows directly
        assert_eq!(
            tokens(100, 10, 7),
            vec![P(1), Ellipsis, P(5), P(6), P(7), P(8), P(9), P(10)]
        );
    }

    #[test]
    fn ninety_five_items_first_page() {
        let window = paginate(95, 10, 1).expect("window");
        assert_eq!(window.total_pages, 10);
        assert_eq!(window.tokens, vec![P(1), P(2), P(3), Ellipsis, P(10)]);
        assert!(!window.has_previous);
        assert!(window.has_next);
        assert!(window.is_paginated);
    }

    #[test]
    fn ninety_five_items_seventh_page() {
        let window = paginate(95, 10, 7).expect("window");
        assert_eq!(
            window.tokens,
            vec![P(1), Ellipsis, P(5), P(6), P(7), P(8), P(9), P(10)]
        );
        assert_eq!(window.previous_page(), Some(6));
        assert_eq!(window.next_page(), Some(8));
    }

    #[test]
    fn single_page_is_not_paginated() {
        let window = paginate(3, 10, 1).expect("window");
        assert_eq!(window.total_pages, 1);
        assert!(!window.is_paginated);
        assert!(window.tokens.is_empty());
        assert!(!window.has_previous);
        assert!(!window.has_next);
    }

    #[test]
    fn empty_listing_has_one_page() {
        let window = paginate(0, 10, 1).expect("window");
        assert_eq!(window.total_pages, 1);
        assert!(!window.is_paginated);
        assert!(window.tokens.is_empty());

        let page = slice(Vec::<u32>::new(), 10, 1).expect("page");
        assert!(page.items.is_empty());
        assert_eq!(page.page_number, 1);
        assert_eq!(page.total_items, 0);
    }

    #[test]
    fn out_of_range_pages_are_clamped() {
        let window = paginate(30, 10, 999).expect("window");
        assert_eq!(window.current_page, 3);
        assert!(!window.has_next);

        let page = slice((1..=30).collect::<Vec<u32>>(), 10, 999).expect("page");
        assert_eq!(page.page_number, 3);
        assert_eq!(page.items, (21..=30).collect::<Vec<u32>>());
    }

    #[test]
    fn zero_arguments_are_rejected() {
        assert!(matches!(
            paginate(10, 0, 1),
            Err(PaginationError::InvalidArgument(_))
        ));
        assert!(matches!(
            paginate(10, 5, 0),
            Err(PaginationError::InvalidArgument(_))
        ));
        assert!(matches!(
            slice(vec![1, 2, 3], 0, 1),
            Err(PaginationError::InvalidArgument(_))
        ));
        assert!(matches!(
            slice(vec![1, 2, 3], 2, 0),
            Err(PaginationError::InvalidArgument(_))
        ));
    }

    #[test]
    fn slice_returns_partial_last_page() {
        let page = slice((1..=25).collect::<Vec<u32>>(), 10, 3).expect("page");
        assert_eq!(page.items, vec![21, 22, 23, 24, 25]);
        assert_eq!(page.total_items, 25);
        assert_eq!(page.page_size, 10);
    }

    #[test]
    fn page_request_offsets() {
        assert_eq!(PageRequest::for_page(1, 10), PageRequest::new(0, 10));
        assert_eq!(PageRequest::for_page(4, 6), PageRequest::new(18, 6));
        let window = paginate(95, 10, 42).expect("window");
        assert_eq!(window.page_request(10), PageRequest::new(90, 10));
    }

    #[test]
    fn total_pages_matches_ceiling_division() {
        for page_size in 1..=12u32 {
            for total_items in 0..=150u64 {
                let expected = if total_items == 0 {
                    1
                } else {
                    (total_items + u64::from(page_size) - 1) / u64::from(page_size)
                };
                assert_eq!(
                    u64::from(total_pages(total_items, page_size).expect("pages")),
                    expected,
                    "items={total_items} size={page_size}"
                );
            }
        }
    }

    #[test]
    fn page_counts_beyond_u32_are_rejected() {
        assert_eq!(total_pages(u64::from(u32::MAX), 1), Ok(u32::MAX));
        assert!(matches!(
            total_pages(2 * u64::from(u32::MAX), 1),
            Err(PaginationError::InvalidArgument(_))
        ));
        assert!(paginate(u64::MAX, 1, 1).is_err());
    }

    #[test]
    fn window_invariants_hold_for_every_page() {
        for total in 1..=40u32 {
            for requested in 1..=total + 3 {
                let window = paginate(u64::from(total), 1, requested).expect("window");
                let current = window.current_page;
                assert!((1..=total).contains(&current));
                assert_eq!(window.is_paginated, total > 1);
                assert_eq!(window.has_previous, current > 1);
                assert_eq!(window.has_next, current < total);

                // clamping is idempotent
                let again = paginate(u64::from(total), 1, current).expect("window");
                assert_eq!(again, window);

                if total == 1 {
                    assert!(window.tokens.is_empty());
                    continue;
                }

                let pages: Vec<u32> = window
                    .tokens
                    .iter()
                    .filter_map(|token| match token {
                        P(n) => Some(*n),
                        Ellipsis => None,
                    })
                    .collect();
                assert!(pages.windows(2).all(|pair| pair[0] < pair[1]));
                assert_eq!(pages.first(), Some(&1));
                assert_eq!(pages.last(), Some(&total));
                assert!(pages.contains(&current));

                let ellipses = window.tokens.len() - pages.len();
                assert!(ellipses <= 2);

                // an ellipsis always stands for at least one omitted page
                for (index, token) in window.tokens.iter().enumerate() {
                    if *token == Ellipsis {
                        let before = match window.tokens[index - 1] {
                            P(n) => n,
                            Ellipsis => panic!("adjacent ellipses"),
                        };
                        let after = match window.tokens[index + 1] {
                            P(n) => n,
                            Ellipsis => panic!("adjacent ellipses"),
                        };
                        assert!(after - before >= 2);
                    }
                }

                // no silent gaps between neighbouring page numbers
                for pair in window.tokens.windows(2) {
                    if let (P(a), P(b)) = (pair[0], pair[1]) {
                        assert_eq!(b, a + 1);
                    }
                }
            }
        }
    }
}
