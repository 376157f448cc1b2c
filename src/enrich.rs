use std::collections::HashMap;
use std::thread;

use crate::api::ApiError;
use crate::data::UserService;
use crate::model::{Author, Authored};

pub const DEFAULT_WORKERS: usize = 4;

#[derive(Debug, thiserror::Error)]
#[error("author lookup failed for {author_id}")]
pub struct EnrichError {
    pub author_id: String,
    #[source]
    pub source: ApiError,
}

/// Attaches author data to every item that does not carry it yet.
///
/// Distinct author ids are resolved once each, spread over up to `workers`
/// scoped threads. Output order matches input order. A single failed lookup
/// fails the whole batch.
pub fn enrich<T, U>(users: &U, items: Vec<T>, workers: usize) -> Result<Vec<T>, EnrichError>
where
    T: Authored,
    U: UserService + ?Sized,
{
    let mut pending: Vec<String> = Vec::new();
    for item in items.iter().filter(|item| !item.has_author()) {
        let id = item.author_id();
        if !pending.iter().any(|known| known == id) {
            pending.push(id.to_string());
        }
    }
    if pending.is_empty() {
        return Ok(items);
    }

    let authors = resolve(users, &pending, workers.max(1))?;

    Ok(items
        .into_iter()
        .map(|mut item| {
            if !item.has_author() {
                if let Some(author) = authors.get(item.author_id()) {
                    item.attach_author(author.clone());
                }
            }
            item
        })
        .collect())
}

fn resolve<U>(
    users: &U,
    ids: &[String],
    workers: usize,
) -> Result<HashMap<String, Author>, EnrichError>
where
    U: UserService + ?Sized,
{
    let workers = workers.min(ids.len());
    let mut lanes: Vec<Vec<(usize, &String)>> = vec![Vec::new(); workers];
    for (index, id) in ids.iter().enumerate() {
        lanes[index % workers].push((index, id));
    }

    let mut outcomes: Vec<(usize, Result<Author, ApiError>)> = thread::scope(|scope| {
        let handles: Vec<_> = lanes
            .into_iter()
            .map(|lane| {
                scope.spawn(move || {
                    lane.into_iter()
                        .map(|(index, id)| (index, users.load_user(id)))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_default())
            .collect()
    });

    if outcomes.len() != ids.len() {
        let missing = (0..ids.len())
            .find(|index| !outcomes.iter().any(|(done, _)| done == index))
            .unwrap_or(0);
        return Err(EnrichError {
            author_id: ids[missing].clone(),
            source: ApiError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                body: "author lookup worker panicked".into(),
            },
        });
    }

    outcomes.sort_by_key(|(index, _)| *index);
    let mut authors = HashMap::with_capacity(ids.len());
    for (index, outcome) in outcomes {
        let id = ids[index].clone();
        match outcome {
            Ok(author) => {
                authors.insert(id, author);
            }
            Err(source) => {
                return Err(EnrichError {
                    author_id: id,
                    source,
                })
            }
        }
    }
    Ok(authors)
}
