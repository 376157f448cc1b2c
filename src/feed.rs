//! Feed, comment and draft state with reducer-style transitions.
//!
//! Operations that need the network return a [`Request`] for the caller to
//! execute; results are folded back in with the `apply_*`/`fail_*` methods,
//! each of which is a single state update.

use std::collections::{HashMap, HashSet};

use crate::cursor::Cursor;
use crate::merge;
use crate::model::{Comment, Meme, Page};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Closed,
    Open(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommentThread {
    pub comments: Vec<Comment>,
    /// Last page merged into `comments`; 0 until the first page arrives.
    pub current_page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Memes { page: u32 },
    Comments { meme_id: String, page: u32 },
    CreateComment { meme_id: String, content: String },
}

#[derive(Debug, Default)]
pub struct FeedState {
    memes: Vec<Meme>,
    cursor: Cursor,
    feed_in_flight: Option<u32>,
    retry_page: bool,
    threads: HashMap<String, CommentThread>,
    comments_in_flight: HashSet<String>,
    drafts: HashMap<String, String>,
    section: Section,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memes(&self) -> &[Meme] {
        &self.memes
    }

    pub fn meme(&self, meme_id: &str) -> Option<&Meme> {
        self.memes.iter().find(|meme| meme.id == meme_id)
    }

    pub fn page(&self) -> u32 {
        self.cursor.page()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor.is_exhausted()
    }

    pub fn is_loading_feed(&self) -> bool {
        self.feed_in_flight.is_some()
    }

    pub fn is_loading_comments(&self, meme_id: &str) -> bool {
        self.comments_in_flight.contains(meme_id)
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn open_meme(&self) -> Option<&str> {
        match &self.section {
            Section::Open(id) => Some(id.as_str()),
            Section::Closed => None,
        }
    }

    pub fn is_open(&self, meme_id: &str) -> bool {
        self.open_meme() == Some(meme_id)
    }

    pub fn thread(&self, meme_id: &str) -> Option<&CommentThread> {
        self.threads.get(meme_id)
    }

    pub fn comments(&self, meme_id: &str) -> &[Comment] {
        self.threads
            .get(meme_id)
            .map(|thread| thread.comments.as_slice())
            .unwrap_or(&[])
    }

    pub fn draft(&self, meme_id: &str) -> &str {
        self.drafts.get(meme_id).map(String::as_str).unwrap_or("")
    }

    /// Requests the page under the cursor if nothing has been loaded yet.
    pub fn start(&mut self) -> Option<Request> {
        if !self.memes.is_empty() || self.feed_in_flight.is_some() {
            return None;
        }
        let page = self.cursor.page();
        self.feed_in_flight = Some(page);
        Some(Request::Memes { page })
    }

    /// Moves the feed to its next page. A page whose fetch failed is asked for
    /// again instead of being skipped.
    pub fn advance_page(&mut self) -> Option<Request> {
        if self.feed_in_flight.is_some() {
            return None;
        }
        let page = if self.retry_page {
            self.retry_page = false;
            self.cursor.page()
        } else {
            self.cursor.advance()?
        };
        self.feed_in_flight = Some(page);
        Some(Request::Memes { page })
    }

    pub fn apply_memes(&mut self, page: u32, batch: Page<Meme>) {
        if self.feed_in_flight == Some(page) {
            self.feed_in_flight = None;
        }
        if page == self.cursor.page() {
            self.retry_page = false;
        }
        if batch.is_last() {
            self.cursor.mark_exhausted();
        }
        let memes = std::mem::take(&mut self.memes);
        self.memes = merge::merge(memes, batch.results);
    }

    pub fn fail_memes(&mut self, page: u32) {
        if self.feed_in_flight == Some(page) {
            self.feed_in_flight = None;
            self.retry_page = page == self.cursor.page();
        }
    }

    /// Opens the section for `meme_id`, or closes it when it is already open.
    /// Opening a meme whose first page was never loaded requests page 1.
    pub fn toggle_section(&mut self, meme_id: &str) -> Option<Request> {
        if self.is_open(meme_id) {
            self.section = Section::Closed;
            return None;
        }
        if self.meme(meme_id).is_none() {
            return None;
        }
        self.section = Section::Open(meme_id.to_string());
        let fetched = self
            .threads
            .get(meme_id)
            .is_some_and(|thread| thread.current_page > 0);
        if fetched || self.comments_in_flight.contains(meme_id) {
            return None;
        }
        self.comments_in_flight.insert(meme_id.to_string());
        Some(Request::Comments {
            meme_id: meme_id.to_string(),
            page: 1,
        })
    }

    /// Requests the page after the last one merged. Only valid while the
    /// meme's section is open.
    pub fn load_more_comments(&mut self, meme_id: &str) -> Option<Request> {
        if !self.is_open(meme_id) || self.comments_in_flight.contains(meme_id) {
            return None;
        }
        let current = self
            .threads
            .get(meme_id)
            .map(|thread| thread.current_page)
            .unwrap_or(0);
        self.comments_in_flight.insert(meme_id.to_string());
        Some(Request::Comments {
            meme_id: meme_id.to_string(),
            page: current.saturating_add(1),
        })
    }

    pub fn apply_comments(&mut self, meme_id: &str, page: u32, comments: Vec<Comment>) {
        self.comments_in_flight.remove(meme_id);
        let thread = self.threads.entry(meme_id.to_string()).or_default();
        let existing = std::mem::take(&mut thread.comments);
        thread.comments = merge::merge(existing, comments);
        thread.current_page = thread.current_page.max(page);
    }

    pub fn fail_comments(&mut self, meme_id: &str) {
        self.comments_in_flight.remove(meme_id);
    }

    pub fn set_draft(&mut self, meme_id: &str, text: impl Into<String>) {
        self.drafts.insert(meme_id.to_string(), text.into());
    }

    /// Turns the meme's draft into a create request; blank drafts are ignored.
    pub fn submit_comment(&self, meme_id: &str) -> Option<Request> {
        let content = self.draft(meme_id).trim();
        if content.is_empty() {
            return None;
        }
        Some(Request::CreateComment {
            meme_id: meme_id.to_string(),
            content: content.to_string(),
        })
    }

    /// Puts a freshly created comment at the top of its thread and clears the
    /// meme's draft.
    pub fn apply_created_comment(&mut self, meme_id: &str, comment: Comment) {
        let thread = self.threads.entry(meme_id.to_string()).or_default();
        let existing = std::mem::take(&mut thread.comments);
        thread.comments = merge::prepend(existing, comment);
        self.drafts.insert(meme_id.to_string(), String::new());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meme(id: &str) -> Meme {
        Meme {
            id: id.into(),
            author_id: "u1".into(),
            author: None,
            picture_url: String::new(),
            texts: Vec::new(),
            description: String::new(),
            created_at: String::new(),
            comments_count: 0,
        }
    }

    fn comment(id: &str) -> Comment {
        Comment {
            id: id.into(),
            author_id: "u1".into(),
            author: None,
            content: String::new(),
            created_at: String::new(),
        }
    }

    fn page<T>(results: Vec<T>, page_size: u64) -> Page<T> {
        Page {
            total: 100,
            page_size,
            results,
        }
    }

    fn loaded(ids: &[&str]) -> FeedState {
        let mut state = FeedState::new();
        assert_eq!(state.start(), Some(Request::Memes { page: 1 }));
        state.apply_memes(1, page(ids.iter().map(|id| meme(id)).collect(), 2));
        state
    }

    fn meme_ids(state: &FeedState) -> Vec<&str> {
        state.memes().iter().map(|m| m.id.as_str()).collect()
    }

    #[test]
    fn overlapping_feed_pages_merge_without_duplicates() {
        let mut state = loaded(&["m1", "m2"]);
        assert_eq!(state.advance_page(), Some(Request::Memes { page: 2 }));
        state.apply_memes(2, page(vec![meme("m2"), meme("m3")], 2));
        assert_eq!(meme_ids(&state), ["m1", "m2", "m3"]);
        assert_eq!(state.page(), 2);
    }

    #[test]
    fn advance_is_ignored_while_a_page_is_loading() {
        let mut state = loaded(&["m1", "m2"]);
        assert!(state.advance_page().is_some());
        assert_eq!(state.advance_page(), None);
        assert_eq!(state.page(), 2);
    }

    #[test]
    fn failed_page_is_requested_again() {
        let mut state = loaded(&["m1", "m2"]);
        assert_eq!(state.advance_page(), Some(Request::Memes { page: 2 }));
        state.fail_memes(2);
        assert_eq!(meme_ids(&state), ["m1", "m2"]);
        assert_eq!(state.advance_page(), Some(Request::Memes { page: 2 }));
        state.apply_memes(2, page(vec![meme("m3"), meme("m4")], 2));
        assert_eq!(state.advance_page(), Some(Request::Memes { page: 3 }));
    }

    #[test]
    fn first_page_can_be_retried_after_failure() {
        let mut state = FeedState::new();
        state.start();
        state.fail_memes(1);
        assert_eq!(state.start(), Some(Request::Memes { page: 1 }));
        state.apply_memes(1, page(vec![meme("m1"), meme("m2")], 2));
        assert_eq!(state.advance_page(), Some(Request::Memes { page: 2 }));
    }

    #[test]
    fn empty_page_stops_advancing() {
        let mut state = loaded(&["m1", "m2"]);
        state.advance_page();
        state.apply_memes(2, page(Vec::new(), 2));
        assert!(state.is_exhausted());
        assert_eq!(state.advance_page(), None);
    }

    #[test]
    fn toggle_opens_one_section_at_a_time() {
        let mut state = loaded(&["m1", "m2"]);
        assert!(state.toggle_section("m1").is_some());
        assert!(state.toggle_section("m2").is_some());
        assert_eq!(state.section(), &Section::Open("m2".into()));
        assert!(!state.is_open("m1"));
        state.toggle_section("m2");
        assert_eq!(state.section(), &Section::Closed);
    }

    #[test]
    fn toggle_ignores_unknown_memes() {
        let mut state = loaded(&["m1"]);
        assert_eq!(state.toggle_section("nope"), None);
        assert_eq!(state.section(), &Section::Closed);
    }

    #[test]
    fn reopening_keeps_comments_without_refetching() {
        let mut state = loaded(&["m1", "m2"]);
        assert_eq!(
            state.toggle_section("m1"),
            Some(Request::Comments {
                meme_id: "m1".into(),
                page: 1
            })
        );
        state.apply_comments("m1", 1, vec![comment("c1")]);
        assert_eq!(state.toggle_section("m1"), None);
        assert_eq!(state.toggle_section("m1"), None);
        assert_eq!(state.comments("m1").len(), 1);
        assert_eq!(state.thread("m1").unwrap().current_page, 1);
    }

    #[test]
    fn pending_first_page_is_not_requested_twice() {
        let mut state = loaded(&["m1"]);
        assert!(state.toggle_section("m1").is_some());
        state.toggle_section("m1");
        assert_eq!(state.toggle_section("m1"), None);
        assert!(state.is_loading_comments("m1"));
    }

    #[test]
    fn load_more_requires_the_open_section() {
        let mut state = loaded(&["m1", "m2"]);
        state.toggle_section("m1");
        state.apply_comments("m1", 1, vec![comment("c1")]);
        assert_eq!(state.load_more_comments("m2"), None);
        assert_eq!(
            state.load_more_comments("m1"),
            Some(Request::Comments {
                meme_id: "m1".into(),
                page: 2
            })
        );
        state.apply_comments("m1", 2, vec![comment("c1"), comment("c2")]);
        let ids: Vec<_> = state.comments("m1").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c1", "c2"]);
        assert_eq!(state.thread("m1").unwrap().current_page, 2);
    }

    #[test]
    fn reopening_after_failed_first_page_retries_it() {
        let mut state = loaded(&["m1"]);
        assert!(state.toggle_section("m1").is_some());
        state.fail_comments("m1");

        state.set_draft("m1", "first!");
        assert!(state.submit_comment("m1").is_some());
        state.apply_created_comment("m1", comment("c9"));
        assert_eq!(state.thread("m1").unwrap().current_page, 0);

        state.toggle_section("m1");
        assert_eq!(
            state.toggle_section("m1"),
            Some(Request::Comments {
                meme_id: "m1".into(),
                page: 1
            })
        );
        state.apply_comments("m1", 1, vec![comment("c1")]);
        let ids: Vec<_> = state.comments("m1").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c9", "c1"]);
        assert_eq!(state.thread("m1").unwrap().current_page, 1);
    }

    #[test]
    fn comment_page_counter_never_goes_back() {
        let mut state = loaded(&["m1"]);
        state.apply_comments("m1", 3, vec![comment("c3")]);
        state.apply_comments("m1", 2, vec![comment("c2")]);
        assert_eq!(state.thread("m1").unwrap().current_page, 3);
    }

    #[test]
    fn blank_drafts_are_not_submitted() {
        let mut state = loaded(&["m1"]);
        assert_eq!(state.submit_comment("m1"), None);
        state.set_draft("m1", "   \t");
        assert_eq!(state.submit_comment("m1"), None);
    }

    #[test]
    fn created_comment_goes_first_and_clears_the_draft() {
        let mut state = loaded(&["m1"]);
        state.apply_comments("m1", 1, vec![comment("c1")]);
        state.set_draft("m1", "Nice!");
        assert_eq!(
            state.submit_comment("m1"),
            Some(Request::CreateComment {
                meme_id: "m1".into(),
                content: "Nice!".into()
            })
        );
        assert_eq!(state.draft("m1"), "Nice!");
        state.apply_created_comment("m1", comment("c2"));
        let ids: Vec<_> = state.comments("m1").iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c2", "c1"]);
        assert_eq!(state.draft("m1"), "");
    }
}
