use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::multipart::Form;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::model::{Author, Comment, Meme, Page};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/";

/// Supplies the bearer token for each request and is told when the server
/// rejects it.
pub trait TokenProvider: Send + Sync {
    fn token(&self) -> Result<String, ApiError>;
    fn invalidate(&self);
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not authenticated")]
    Unauthorized,
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("api error {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("unexpected response body: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("picture unreadable: {0}")]
    Picture(#[from] std::io::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub user_agent: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
    pub http_client: Option<HttpClient>,
}

/// Multipart payload for `POST /memes`.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMeme {
    pub description: String,
    pub texts: Vec<(String, i64, i64)>,
}

#[derive(Serialize)]
struct NewComment<'a> {
    content: &'a str,
}

pub struct Client {
    token_provider: Arc<dyn TokenProvider>,
    http: HttpClient,
    user_agent: String,
    base_url: Url,
}

impl Client {
    pub fn new(
        token_provider: Arc<dyn TokenProvider>,
        config: ClientConfig,
    ) -> anyhow::Result<Self> {
        if config.user_agent.trim().is_empty() {
            anyhow::bail!("api client user agent required");
        }
        let mut base = config
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url = Url::parse(&base)?;
        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(config.timeout.unwrap_or(Duration::from_secs(20)))
                .build()?,
        };

        Ok(Client {
            token_provider,
            http,
            user_agent: config.user_agent,
            base_url,
        })
    }

    pub fn memes(&self, page: u32) -> Result<Page<Meme>, ApiError> {
        let params = [("page".to_string(), page.to_string())];
        self.get_json(&["memes"], &params)
    }

    pub fn user(&self, user_id: &str) -> Result<Author, ApiError> {
        self.get_json(&["users", user_id], &[])
    }

    pub fn meme_comments(&self, meme_id: &str, page: u32) -> Result<Page<Comment>, ApiError> {
        let params = [("page".to_string(), page.to_string())];
        self.get_json(&["memes", meme_id, "comments"], &params)
    }

    pub fn create_comment(&self, meme_id: &str, content: &str) -> Result<Comment, ApiError> {
        let url = self.url(&["memes", meme_id, "comments"], &[])?;
        let req = self
            .http
            .request(Method::POST, url)
            .json(&NewComment { content });
        decode(self.send(req)?)
    }

    pub fn create_meme(&self, picture: &Path, meme: &NewMeme) -> Result<(), ApiError> {
        let mut form = Form::new()
            .file("Picture", picture)?
            .text("Description", meme.description.clone());
        for (index, (content, x, y)) in meme.texts.iter().enumerate() {
            form = form
                .text(format!("Texts[{index}][Content]"), content.clone())
                .text(format!("Texts[{index}][X]"), x.to_string())
                .text(format!("Texts[{index}][Y]"), y.to_string());
        }
        let url = self.url(&["memes"], &[])?;
        let req = self.http.request(Method::POST, url).multipart(form);
        self.send(req)?;
        Ok(())
    }

    fn get_json<T>(&self, segments: &[&str], params: &[(String, String)]) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let url = self.url(segments, params)?;
        decode(self.send(self.http.request(Method::GET, url))?)
    }

    /// Appends `segments` to the base path; each one is percent-encoded, so
    /// ids never change the route.
    fn url(&self, segments: &[&str], params: &[(String, String)]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .extend(segments);
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in params {
                pairs.append_pair(k, v);
            }
        }
        Ok(url)
    }

    fn send(&self, req: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.token_provider.token()?;
        let resp = req
            .header(USER_AGENT, self.user_agent.clone())
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("api: token rejected, signing out");
            self.token_provider.invalidate();
            return Err(ApiError::Unauthorized);
        }
        let body = resp.text().unwrap_or_default();
        Err(ApiError::Status { status, body })
    }
}

fn decode<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
    let body = resp.text()?;
    Ok(serde_json::from_str(&body)?)
}
