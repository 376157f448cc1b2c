/// Page counter for a paginated stream. Starts at 1 and only moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    page: u32,
    exhausted: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            page: 1,
            exhausted: false,
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Moves to the next page and returns it, or `None` once the stream has
    /// reported its last page.
    pub fn advance(&mut self) -> Option<u32> {
        if self.exhausted {
            return None;
        }
        self.page = self.page.saturating_add(1);
        Some(self.page)
    }

    pub fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_by_one() {
        let mut cursor = Cursor::new();
        assert_eq!(cursor.page(), 1);
        assert_eq!(cursor.advance(), Some(2));
        assert_eq!(cursor.advance(), Some(3));
        assert_eq!(cursor.page(), 3);
    }

    #[test]
    fn exhausted_cursor_stays_put() {
        let mut cursor = Cursor::new();
        cursor.advance();
        cursor.mark_exhausted();
        assert_eq!(cursor.advance(), None);
        assert_eq!(cursor.page(), 2);
    }
}
