use std::sync::Arc;
use std::time::Duration;

use meme_feed::controller::{Controller, Options, Services};
use meme_feed::data::MockBackend;
use meme_feed::feed::Section;
use meme_feed::model::{Comment, Meme};

const WAIT: Duration = Duration::from_secs(5);

fn meme(id: &str, author_id: &str) -> Meme {
    Meme {
        id: id.into(),
        author_id: author_id.into(),
        author: None,
        picture_url: format!("https://memes.example/{id}.png"),
        texts: Vec::new(),
        description: format!("meme {id}"),
        created_at: "2024-10-25T13:02:45.52".into(),
        comments_count: 0,
    }
}

fn comment(id: &str, author_id: &str) -> Comment {
    Comment {
        id: id.into(),
        author_id: author_id.into(),
        author: None,
        content: format!("comment {id}"),
        created_at: "2024-10-25T13:02:45.52".into(),
    }
}

fn backend() -> Arc<MockBackend> {
    Arc::new(
        MockBackend::new(2)
            .with_user("u1", "alice")
            .with_user("u2", "bob")
            .with_user("me", "you")
            .with_meme_page(1, vec![meme("m1", "u1"), meme("m2", "u2")])
            .with_meme_page(2, vec![meme("m2", "u2"), meme("m3", "u1")])
            .with_comment_page("m1", 1, vec![comment("c1", "u2")])
            .with_comment_page("m1", 2, vec![comment("c2", "u1")]),
    )
}

fn started(backend: &Arc<MockBackend>) -> Controller {
    let mut controller = Controller::new(Services::from_backend(backend.clone()), Options::default());
    controller.start();
    assert!(controller.wait_idle(WAIT));
    controller
}

fn meme_ids(controller: &Controller) -> Vec<String> {
    controller.memes().iter().map(|m| m.id.clone()).collect()
}

fn comment_ids(controller: &Controller, meme_id: &str) -> Vec<String> {
    controller
        .thread(meme_id)
        .map(|thread| thread.comments.iter().map(|c| c.id.clone()).collect())
        .unwrap_or_default()
}

#[test]
fn scroll_advance_merges_overlapping_pages() {
    let backend = backend();
    let mut controller = started(&backend);
    assert_eq!(meme_ids(&controller), ["m1", "m2"]);

    assert!(controller.advance_page());
    assert!(controller.wait_idle(WAIT));
    assert_eq!(meme_ids(&controller), ["m1", "m2", "m3"]);
    assert_eq!(controller.state().page(), 2);

    let authors: Vec<_> = controller
        .memes()
        .iter()
        .map(|m| m.author.as_ref().map(|a| a.username.clone()))
        .collect();
    assert_eq!(
        authors,
        [
            Some("alice".to_string()),
            Some("bob".to_string()),
            Some("alice".to_string())
        ]
    );
}

#[test]
fn opening_a_section_loads_its_first_page() {
    let backend = backend();
    let mut controller = started(&backend);

    controller.toggle_section("m1");
    assert_eq!(controller.section(), &Section::Open("m1".into()));
    assert!(controller.wait_idle(WAIT));

    let thread = controller.thread("m1").expect("thread stored");
    assert_eq!(comment_ids(&controller, "m1"), ["c1"]);
    assert_eq!(thread.current_page, 1);
    assert_eq!(thread.comments[0].author.as_ref().unwrap().username, "bob");
}

#[test]
fn closing_and_reopening_does_not_refetch() {
    let backend = backend();
    let mut controller = started(&backend);

    controller.toggle_section("m1");
    assert!(controller.wait_idle(WAIT));
    controller.toggle_section("m1");
    assert_eq!(controller.section(), &Section::Closed);
    controller.toggle_section("m1");
    assert!(controller.wait_idle(WAIT));

    assert_eq!(backend.count_calls("comments:m1:"), 1);
    assert_eq!(comment_ids(&controller, "m1"), ["c1"]);
}

#[test]
fn submitted_comment_is_prepended_and_draft_cleared() {
    let backend = backend();
    let mut controller = started(&backend);
    controller.toggle_section("m1");
    assert!(controller.wait_idle(WAIT));

    controller.change_draft("m1", "Nice!");
    controller.submit_comment("m1");
    assert!(controller.wait_idle(WAIT));

    assert_eq!(comment_ids(&controller, "m1"), ["new-1", "c1"]);
    let created = &controller.thread("m1").unwrap().comments[0];
    assert_eq!(created.content, "Nice!");
    assert_eq!(created.author.as_ref().unwrap().username, "you");
    assert_eq!(controller.draft("m1"), "");
}

#[test]
fn failed_submission_keeps_the_draft() {
    let backend = backend();
    backend.set_fail_create_comment(true);
    let mut controller = started(&backend);
    controller.toggle_section("m1");
    assert!(controller.wait_idle(WAIT));

    controller.change_draft("m1", "Nice!");
    controller.submit_comment("m1");
    assert!(controller.wait_idle(WAIT));

    assert_eq!(controller.draft("m1"), "Nice!");
    assert_eq!(comment_ids(&controller, "m1"), ["c1"]);
    assert!(controller.status_message().unwrap().contains("draft was kept"));
}

#[test]
fn blank_draft_is_not_sent() {
    let backend = backend();
    let mut controller = started(&backend);
    controller.change_draft("m1", "   ");
    controller.submit_comment("m1");
    assert!(controller.wait_idle(WAIT));
    assert_eq!(backend.count_calls("create_comment"), 0);
}

#[test]
fn load_more_appends_the_next_page() {
    let backend = backend();
    let mut controller = started(&backend);
    controller.toggle_section("m1");
    assert!(controller.wait_idle(WAIT));

    controller.load_more_comments("m1");
    assert!(controller.wait_idle(WAIT));

    assert_eq!(comment_ids(&controller, "m1"), ["c1", "c2"]);
    assert_eq!(controller.thread("m1").unwrap().current_page, 2);
}

#[test]
fn failed_enrichment_leaves_the_feed_untouched() {
    let backend = backend();
    let mut controller = started(&backend);
    backend.fail_user("u1");

    assert!(controller.advance_page());
    assert!(controller.wait_idle(WAIT));

    assert_eq!(meme_ids(&controller), ["m1", "m2"]);
    assert!(controller
        .status_message()
        .unwrap()
        .contains("author lookup failed for u1"));
}

#[test]
fn failed_feed_page_is_retried_on_next_advance() {
    let backend = backend();
    let mut controller = started(&backend);
    backend.set_fail_memes(true);
    assert!(controller.advance_page());
    assert!(controller.wait_idle(WAIT));
    assert_eq!(meme_ids(&controller), ["m1", "m2"]);

    backend.set_fail_memes(false);
    assert!(controller.advance_page());
    assert!(controller.wait_idle(WAIT));
    assert_eq!(meme_ids(&controller), ["m1", "m2", "m3"]);
    assert_eq!(backend.count_calls("memes:2"), 2);
}

#[test]
fn rejected_token_leaves_state_untouched() {
    let backend = backend();
    let mut controller = started(&backend);
    controller.toggle_section("m1");
    assert!(controller.wait_idle(WAIT));
    backend.set_unauthorized(true);

    assert!(controller.advance_page());
    controller.load_more_comments("m1");
    assert!(controller.wait_idle(WAIT));

    assert!(controller.auth_lost());
    assert_eq!(meme_ids(&controller), ["m1", "m2"]);
    assert_eq!(comment_ids(&controller, "m1"), ["c1"]);
    assert_eq!(controller.thread("m1").unwrap().current_page, 1);
    assert!(controller
        .status_message()
        .unwrap()
        .contains("Session expired"));
}

#[test]
fn successful_comment_load_clears_an_old_status() {
    let backend = backend();
    let mut controller = started(&backend);
    controller.toggle_section("m1");
    assert!(controller.wait_idle(WAIT));

    controller.change_draft("m1", "Nice!");
    controller.submit_comment("m1");
    assert!(controller.wait_idle(WAIT));
    assert_eq!(controller.status_message(), Some("Comment posted."));

    controller.load_more_comments("m1");
    assert!(controller.wait_idle(WAIT));
    assert_eq!(controller.status_message(), None);
}
