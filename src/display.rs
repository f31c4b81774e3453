//! Presentation helpers: receipt masking and list pagination
//!
//! Nothing here touches stored data; masking is applied when rendering only.

pub const MASK_CHAR: char = '*';
const VISIBLE_TAIL: usize = 4;

/// Hides all but the last four characters of an unvalidated receipt.
pub fn mask_receipt(receipt_number: &str, validated: bool) -> String {
    if validated {
        return receipt_number.to_string();
    }

    let len = receipt_number.chars().count();
    receipt_number
        .chars()
        .enumerate()
        .map(|(i, c)| if i + VISIBLE_TAIL < len { MASK_CHAR } else { c })
        .collect()
}

/// One-based page cursor over a list of `total_items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pager {
    total_items: usize,
    page_size: usize,
    current: usize,
}

impl Pager {
    /// A zero `page_size` is treated as one item per page.
    pub fn new(total_items: usize, page_size: usize) -> Self {
        Self {
            total_items,
            page_size: page_size.max(1),
            current: 1,
        }
    }
    pub fn current_page(&self) -> usize {
        self.current
    }
    /// Never less than one, so an empty list still renders "page 1 of 1".
    pub fn total_pages(&self) -> usize {
        self.total_items.div_ceil(self.page_size).max(1)
    }
    pub fn has_next(&self) -> bool {
        self.current < self.total_pages()
    }
    pub fn has_previous(&self) -> bool {
        self.current > 1
    }
    /// Moves forward; returns false when already on the last page.
    pub fn next(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.current += 1;
        true
    }
    pub fn previous(&mut self) -> bool {
        if !self.has_previous() {
            return false;
        }
        self.current -= 1;
        true
    }
    /// Index range of the items shown on the current page.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = ((self.current - 1) * self.page_size).min(self.total_items);
        let end = (start + self.page_size).min(self.total_items);
        start..end
    }
    pub fn page_of<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let range = self.range();
        &items[range.start.min(items.len())..range.end.min(items.len())]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_all_but_last_four() {
        assert_eq!(mask_receipt("AB1234567890", false), "********7890");
        assert_eq!(mask_receipt("AB1234567890", true), "AB1234567890");
    }

    #[test]
    fn short_receipts_stay_visible() {
        assert_eq!(mask_receipt("1234", false), "1234");
        assert_eq!(mask_receipt("", false), "");
    }

    #[test]
    fn fifteen_items_three_per_page() {
        let items: Vec<usize> = (1..=15).collect();
        let mut pager = Pager::new(items.len(), 3);

        assert_eq!(pager.page_of(&items), &[1, 2, 3]);
        assert!(!pager.has_previous());

        for _ in 0..4 {
            assert!(pager.next());
        }
        assert_eq!(pager.current_page(), 5);
        assert_eq!(pager.page_of(&items), &[13, 14, 15]);
        assert!(!pager.has_next());
        assert!(pager.has_previous());
        assert!(!pager.next());

        assert!(pager.previous());
        assert_eq!(pager.current_page(), 4);
        assert!(pager.has_next());
    }

    #[test]
    fn empty_list_has_one_page() {
        let pager = Pager::new(0, 3);

        assert_eq!(pager.total_pages(), 1);
        assert!(!pager.has_next());
        assert_eq!(pager.range(), 0..0);
    }
}
