use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::api::{self, ApiError, NewMeme};
use crate::model::{Author, Comment, Meme, Page};

pub type ServiceResult<T> = Result<T, ApiError>;

pub trait MemeService: Send + Sync {
    fn load_memes(&self, page: u32) -> ServiceResult<Page<Meme>>;
    fn create_meme(&self, picture: &Path, meme: &NewMeme) -> ServiceResult<()>;
}

pub trait UserService: Send + Sync {
    fn load_user(&self, user_id: &str) -> ServiceResult<Author>;
}

pub trait CommentService: Send + Sync {
    fn load_comments(&self, meme_id: &str, page: u32) -> ServiceResult<Page<Comment>>;
    fn create_comment(&self, meme_id: &str, content: &str) -> ServiceResult<Comment>;
}

pub struct ApiMemeService {
    client: Arc<api::Client>,
}

impl ApiMemeService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl MemeService for ApiMemeService {
    fn load_memes(&self, page: u32) -> ServiceResult<Page<Meme>> {
        self.client.memes(page)
    }

    fn create_meme(&self, picture: &Path, meme: &NewMeme) -> ServiceResult<()> {
        self.client.create_meme(picture, meme)
    }
}

pub struct ApiUserService {
    client: Arc<api::Client>,
}

impl ApiUserService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl UserService for ApiUserService {
    fn load_user(&self, user_id: &str) -> ServiceResult<Author> {
        self.client.user(user_id)
    }
}

pub struct ApiCommentService {
    client: Arc<api::Client>,
}

impl ApiCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for ApiCommentService {
    fn load_comments(&self, meme_id: &str, page: u32) -> ServiceResult<Page<Comment>> {
        self.client.meme_comments(meme_id, page)
    }

    fn create_comment(&self, meme_id: &str, content: &str) -> ServiceResult<Comment> {
        self.client.create_comment(meme_id, content)
    }
}

/// In-memory backend used for offline demos and tests. Pages are served from
/// fixed scripts; every call is recorded.
#[derive(Default)]
pub struct MockBackend {
    inner: Mutex<MockState>,
}

#[derive(Default)]
struct MockState {
    meme_pages: HashMap<u32, Vec<Meme>>,
    comment_pages: HashMap<(String, u32), Vec<Comment>>,
    users: HashMap<String, Author>,
    failing_users: Vec<String>,
    fail_memes: bool,
    fail_create_comment: bool,
    unauthorized: bool,
    page_size: u64,
    next_comment: u64,
    calls: Vec<String>,
}

impl MockBackend {
    pub fn new(page_size: u64) -> Self {
        let backend = Self::default();
        backend.inner.lock().page_size = page_size;
        backend
    }

    pub fn with_meme_page(self, page: u32, memes: Vec<Meme>) -> Self {
        self.inner.lock().meme_pages.insert(page, memes);
        self
    }

    pub fn with_comment_page(self, meme_id: &str, page: u32, comments: Vec<Comment>) -> Self {
        self.inner
            .lock()
            .comment_pages
            .insert((meme_id.to_string(), page), comments);
        self
    }

    pub fn with_user(self, user_id: &str, username: &str) -> Self {
        self.inner.lock().users.insert(
            user_id.to_string(),
            Author {
                username: username.to_string(),
                picture_url: format!("https://avatars.example/{user_id}.png"),
            },
        );
        self
    }

    pub fn fail_user(&self, user_id: &str) {
        self.inner.lock().failing_users.push(user_id.to_string());
    }

    pub fn set_fail_memes(&self, fail: bool) {
        self.inner.lock().fail_memes = fail;
    }

    pub fn set_fail_create_comment(&self, fail: bool) {
        self.inner.lock().fail_create_comment = fail;
    }

    /// Makes every later call answer as if the token had been rejected.
    pub fn set_unauthorized(&self, unauthorized: bool) {
        self.inner.lock().unauthorized = unauthorized;
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().calls.clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }
}

fn unavailable(what: &str) -> ApiError {
    ApiError::Status {
        status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
        body: format!("mock: {what} unavailable"),
    }
}

impl MockState {
    fn record(&mut self, call: String) -> ServiceResult<()> {
        self.calls.push(call);
        if self.unauthorized {
            return Err(ApiError::Unauthorized);
        }
        Ok(())
    }
}

impl MemeService for MockBackend {
    fn load_memes(&self, page: u32) -> ServiceResult<Page<Meme>> {
        let mut state = self.inner.lock();
        state.record(format!("memes:{page}"))?;
        if state.fail_memes {
            return Err(unavailable("memes"));
        }
        let results = state.meme_pages.get(&page).cloned().unwrap_or_default();
        let total = state.meme_pages.values().map(|page| page.len() as u64).sum();
        Ok(Page {
            total,
            page_size: state.page_size,
            results,
        })
    }

    fn create_meme(&self, _picture: &Path, meme: &NewMeme) -> ServiceResult<()> {
        let mut state = self.inner.lock();
        state.record(format!("create_meme:{}", meme.description))?;
        Ok(())
    }
}

impl UserService for MockBackend {
    fn load_user(&self, user_id: &str) -> ServiceResult<Author> {
        let mut state = self.inner.lock();
        state.record(format!("user:{user_id}"))?;
        if state.failing_users.iter().any(|id| id == user_id) {
            return Err(unavailable("user"));
        }
        state
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: reqwest::StatusCode::NOT_FOUND,
                body: format!("user {user_id} not found"),
            })
    }
}

impl CommentService for MockBackend {
    fn load_comments(&self, meme_id: &str, page: u32) -> ServiceResult<Page<Comment>> {
        let mut state = self.inner.lock();
        state.record(format!("comments:{meme_id}:{page}"))?;
        let results = state
            .comment_pages
            .get(&(meme_id.to_string(), page))
            .cloned()
            .unwrap_or_default();
        Ok(Page {
            total: results.len() as u64,
            page_size: state.page_size,
            results,
        })
    }

    fn create_comment(&self, meme_id: &str, content: &str) -> ServiceResult<Comment> {
        let mut state = self.inner.lock();
        state.record(format!("create_comment:{meme_id}"))?;
        if state.fail_create_comment {
            return Err(unavailable("comments"));
        }
        state.next_comment += 1;
        Ok(Comment {
            id: format!("new-{}", state.next_comment),
            author_id: "me".into(),
            author: None,
            content: content.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        })
    }
}
