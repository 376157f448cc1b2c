use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Anything stored in an ordered, id-deduplicated collection.
pub trait Identified {
    fn id(&self) -> &str;
}

/// Entities fetched with an `authorId` that the client resolves before display.
pub trait Authored {
    fn author_id(&self) -> &str;
    fn has_author(&self) -> bool;
    fn attach_author(&mut self, author: Author);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub picture_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Caption {
    pub content: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meme {
    pub id: String,
    pub author_id: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub picture_url: String,
    #[serde(default)]
    pub texts: Vec<Caption>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default, deserialize_with = "de_count")]
    pub comments_count: u64,
}

impl Meme {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}

impl Identified for Meme {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Authored for Meme {
    fn author_id(&self) -> &str {
        &self.author_id
    }

    fn has_author(&self) -> bool {
        self.author.is_some()
    }

    fn attach_author(&mut self, author: Author) {
        self.author = Some(author);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    #[serde(default)]
    pub author: Option<Author>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub created_at: String,
}

impl Comment {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }
}

impl Identified for Comment {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Authored for Comment {
    fn author_id(&self) -> &str {
        &self.author_id
    }

    fn has_author(&self) -> bool {
        self.author.is_some()
    }

    fn attach_author(&mut self, author: Author) {
        self.author = Some(author);
    }
}

/// Envelope returned by every paginated endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page_size: u64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// True when this page cannot be followed by another one.
    pub fn is_last(&self) -> bool {
        self.results.is_empty() || (self.page_size > 0 && (self.results.len() as u64) < self.page_size)
    }
}

// The API emits timestamps both with and without an offset
// ("2024-10-25T13:02:45.52"); naive values are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn de_count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Count {
        Number(u64),
        Text(String),
    }

    match Count::deserialize(deserializer)? {
        Count::Number(value) => Ok(value),
        Count::Text(text) => text.trim().parse().map_err(serde::de::Error::custom),
    }
}
