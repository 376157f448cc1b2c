use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use crate::api::ApiError;
use crate::data::{CommentService, MemeService, UserService};
use crate::enrich::{self, EnrichError};
use crate::feed::{CommentThread, FeedState, Request, Section};
use crate::model::{Comment, Meme, Page};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("authentication required")]
    Auth,
    #[error("network failure: {0}")]
    Network(#[source] ApiError),
    #[error("{0}")]
    Enrichment(#[source] EnrichError),
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        if err.is_unauthorized() {
            FetchError::Auth
        } else {
            FetchError::Network(err)
        }
    }
}

impl From<EnrichError> for FetchError {
    fn from(err: EnrichError) -> Self {
        if err.source.is_unauthorized() {
            FetchError::Auth
        } else {
            FetchError::Enrichment(err)
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub memes: Arc<dyn MemeService>,
    pub users: Arc<dyn UserService>,
    pub comments: Arc<dyn CommentService>,
}

impl Services {
    /// Uses one backend for every service.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: MemeService + UserService + CommentService + 'static,
    {
        Self {
            memes: backend.clone(),
            users: backend.clone(),
            comments: backend,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub enrich_workers: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            enrich_workers: enrich::DEFAULT_WORKERS,
        }
    }
}

enum Response {
    Memes {
        page: u32,
        result: Result<Page<Meme>, FetchError>,
    },
    Comments {
        meme_id: String,
        page: u32,
        result: Result<Vec<Comment>, FetchError>,
    },
    CommentCreated {
        meme_id: String,
        result: Result<Comment, FetchError>,
    },
}

/// Owns the feed state and runs its requests on background threads.
///
/// Results come back over a channel and are applied by [`Controller::poll`]
/// on the caller's thread.
pub struct Controller {
    state: FeedState,
    services: Services,
    options: Options,
    response_tx: Sender<Response>,
    response_rx: Receiver<Response>,
    in_flight: usize,
    status_message: Option<String>,
    auth_lost: bool,
}

impl Controller {
    pub fn new(services: Services, options: Options) -> Self {
        let (response_tx, response_rx) = unbounded();
        Self {
            state: FeedState::new(),
            services,
            options,
            response_tx,
            response_rx,
            in_flight: 0,
            status_message: None,
            auth_lost: false,
        }
    }

    pub fn state(&self) -> &FeedState {
        &self.state
    }

    pub fn memes(&self) -> &[Meme] {
        self.state.memes()
    }

    pub fn thread(&self, meme_id: &str) -> Option<&CommentThread> {
        self.state.thread(meme_id)
    }

    pub fn section(&self) -> &Section {
        self.state.section()
    }

    pub fn draft(&self, meme_id: &str) -> &str {
        self.state.draft(meme_id)
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    /// True once a request was rejected with 401.
    pub fn auth_lost(&self) -> bool {
        self.auth_lost
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight > 0
    }

    pub fn start(&mut self) {
        if let Some(request) = self.state.start() {
            self.dispatch(request);
        }
    }

    pub fn advance_page(&mut self) -> bool {
        match self.state.advance_page() {
            Some(request) => {
                self.dispatch(request);
                true
            }
            None => false,
        }
    }

    pub fn toggle_section(&mut self, meme_id: &str) {
        if let Some(request) = self.state.toggle_section(meme_id) {
            self.dispatch(request);
        }
    }

    pub fn load_more_comments(&mut self, meme_id: &str) {
        if let Some(request) = self.state.load_more_comments(meme_id) {
            self.dispatch(request);
        }
    }

    pub fn change_draft(&mut self, meme_id: &str, text: impl Into<String>) {
        self.state.set_draft(meme_id, text);
    }

    pub fn submit_comment(&mut self, meme_id: &str) {
        if let Some(request) = self.state.submit_comment(meme_id) {
            self.dispatch(request);
        }
    }

    /// Applies every response that has arrived. Returns whether anything
    /// changed.
    pub fn poll(&mut self) -> bool {
        let mut changed = false;
        while let Ok(response) = self.response_rx.try_recv() {
            self.handle_response(response);
            changed = true;
        }
        changed
    }

    /// Blocks until no request is outstanding or `timeout` elapses. Returns
    /// whether the controller went idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.response_rx.recv_timeout(remaining) {
                Ok(response) => self.handle_response(response),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        true
    }

    fn dispatch(&mut self, request: Request) {
        tracing::debug!(?request, "dispatch");
        self.in_flight += 1;
        let tx = self.response_tx.clone();
        let services = self.services.clone();
        let workers = self.options.enrich_workers;

        thread::spawn(move || {
            let response = match request {
                Request::Memes { page } => Response::Memes {
                    page,
                    result: fetch_memes(&services, page, workers),
                },
                Request::Comments { meme_id, page } => {
                    let result = fetch_comments(&services, &meme_id, page, workers);
                    Response::Comments {
                        meme_id,
                        page,
                        result,
                    }
                }
                Request::CreateComment { meme_id, content } => {
                    let result = create_comment(&services, &meme_id, &content);
                    Response::CommentCreated { meme_id, result }
                }
            };
            let _ = tx.send(response);
        });
    }

    fn handle_response(&mut self, response: Response) {
        self.in_flight = self.in_flight.saturating_sub(1);
        match response {
            Response::Memes { page, result } => match result {
                Ok(batch) => {
                    tracing::info!(page, fetched = batch.results.len(), "feed page loaded");
                    self.state.apply_memes(page, batch);
                    self.status_message = None;
                }
                Err(err) => {
                    self.state.fail_memes(page);
                    self.report(format!("Failed to load memes (page {page})"), err);
                }
            },
            Response::Comments {
                meme_id,
                page,
                result,
            } => match result {
                Ok(comments) => {
                    tracing::info!(%meme_id, page, fetched = comments.len(), "comment page loaded");
                    self.state.apply_comments(&meme_id, page, comments);
                    self.status_message = None;
                }
                Err(err) => {
                    self.state.fail_comments(&meme_id);
                    self.report(format!("Failed to load comments (page {page})"), err);
                }
            },
            Response::CommentCreated { meme_id, result } => match result {
                Ok(comment) => {
                    tracing::info!(%meme_id, comment_id = %comment.id, "comment posted");
                    self.state.apply_created_comment(&meme_id, comment);
                    self.status_message = Some("Comment posted.".to_string());
                }
                Err(err) => {
                    self.report("Failed to post comment; your draft was kept".to_string(), err);
                }
            },
        }
    }

    fn report(&mut self, context: String, err: FetchError) {
        match &err {
            FetchError::Auth => {
                tracing::warn!("{context}: session expired");
                self.auth_lost = true;
                self.status_message = Some("Session expired. Sign in again.".to_string());
            }
            FetchError::Network(source) => {
                tracing::error!(error = %source, "{context}");
                self.status_message = Some(format!("{context}: {err}"));
            }
            FetchError::Enrichment(source) => {
                tracing::error!(error = %source, cause = %source.source, "{context}");
                self.status_message = Some(format!("{context}: {err}"));
            }
        }
    }
}

fn fetch_memes(services: &Services, page: u32, workers: usize) -> Result<Page<Meme>, FetchError> {
    let mut batch = services.memes.load_memes(page)?;
    batch.results = enrich::enrich(services.users.as_ref(), batch.results, workers)?;
    Ok(batch)
}

fn fetch_comments(
    services: &Services,
    meme_id: &str,
    page: u32,
    workers: usize,
) -> Result<Vec<Comment>, FetchError> {
    let batch = services.comments.load_comments(meme_id, page)?;
    Ok(enrich::enrich(services.users.as_ref(), batch.results, workers)?)
}

fn create_comment(services: &Services, meme_id: &str, content: &str) -> Result<Comment, FetchError> {
    let comment = services.comments.create_comment(meme_id, content)?;
    let mut enriched = enrich::enrich(services.users.as_ref(), vec![comment], 1)?;
    enriched
        .pop()
        .ok_or_else(|| FetchError::Network(ApiError::Status {
            status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            body: "created comment missing".into(),
        }))
}
