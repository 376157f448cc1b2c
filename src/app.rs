use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use crate::api;
use crate::compose::MemeDraft;
use crate::config;
use crate::controller::{self, Controller, Services};
use crate::data;
use crate::logging;
use crate::model::{Caption, Comment, Meme};
use crate::session::Session;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    pub token: Option<String>,
    pub demo: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PostOptions {
    pub picture: PathBuf,
    pub description: String,
    pub captions: Vec<String>,
}

struct Connection {
    cfg: config::Config,
    session: Arc<Session>,
    client: Arc<api::Client>,
}

fn connect(config_file: Option<PathBuf>, token: Option<String>) -> Result<Connection> {
    let cfg = config::load(config::LoadOptions {
        config_file: config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    logging::init(&cfg.log).context("init logging")?;

    if let Some(token) = token.as_deref() {
        let path = config::save_token(config_file, token).context("save token")?;
        tracing::info!(path = %path.display(), "token saved");
    }
    let token = token.unwrap_or_else(|| cfg.auth.token.clone());
    let session = Arc::new(Session::from_token(Some(token.as_str())));

    let client = api::Client::new(
        session.clone(),
        api::ClientConfig {
            user_agent: cfg.api.user_agent.clone(),
            base_url: Some(cfg.api.base_url.clone()),
            timeout: Some(cfg.api.timeout),
            http_client: None,
        },
    )
    .context("build api client")?;

    Ok(Connection {
        cfg,
        session,
        client: Arc::new(client),
    })
}

pub fn run(options: RunOptions) -> Result<()> {
    let (services, cfg, session) = if options.demo {
        let cfg = config::load(config::LoadOptions {
            config_file: options.config_file.clone(),
            env_prefix: None,
        })
        .context("load config")?;
        logging::init(&cfg.log).context("init logging")?;
        let backend = Arc::new(demo_backend());
        (Services::from_backend(backend), cfg, None)
    } else {
        let ctx = connect(options.config_file.clone(), options.token.clone())?;
        if !ctx.session.is_authenticated() {
            bail!("no valid token; pass --token <jwt> or set auth.token in the config file");
        }
        let services = Services {
            memes: Arc::new(data::ApiMemeService::new(ctx.client.clone())),
            users: Arc::new(data::ApiUserService::new(ctx.client.clone())),
            comments: Arc::new(data::ApiCommentService::new(ctx.client.clone())),
        };
        (services, ctx.cfg, Some(ctx.session))
    };

    tracing::info!(version = crate::VERSION, demo = options.demo, "starting");
    let controller = Controller::new(
        services,
        controller::Options {
            enrich_workers: cfg.feed.enrich_workers,
        },
    );
    let mut model = ui::Model::new(ui::Options {
        controller,
        scroll_offset: cfg.feed.scroll_offset,
        session,
    });
    model.run()
}

/// Uploads a meme built from command-line arguments.
pub fn post(config_file: Option<PathBuf>, token: Option<String>, options: PostOptions) -> Result<()> {
    let ctx = connect(config_file, token)?;
    if !ctx.session.is_authenticated() {
        bail!("no valid token; pass --token <jwt> or set auth.token in the config file");
    }
    let mut draft = MemeDraft::new();
    draft.set_picture(options.picture);
    draft.set_description(options.description);
    for content in options.captions {
        let index = draft.add_caption();
        draft.update_caption(index, content);
    }
    let service = data::ApiMemeService::new(ctx.client);
    draft.submit(&service)
}

/// Canned content for browsing without a server.
pub fn demo_backend() -> data::MockBackend {
    let meme = |id: &str, author: &str, description: &str, comments: u64| Meme {
        id: id.to_string(),
        author_id: author.to_string(),
        author: None,
        picture_url: format!("https://memes.example/{id}.png"),
        texts: vec![Caption {
            content: description.to_uppercase(),
            x: 120.0,
            y: 30.0,
        }],
        description: description.to_string(),
        created_at: "2024-10-25T13:02:45.52".to_string(),
        comments_count: comments,
    };
    let comment = |id: &str, author: &str, content: &str| Comment {
        id: id.to_string(),
        author_id: author.to_string(),
        author: None,
        content: content.to_string(),
        created_at: "2024-10-26T09:15:00".to_string(),
    };

    data::MockBackend::new(3)
        .with_user("u1", "grumpy")
        .with_user("u2", "doge")
        .with_user("u3", "distracted_bf")
        .with_user("me", "you")
        .with_meme_page(
            1,
            vec![
                meme("m1", "u1", "monday again", 3),
                meme("m2", "u2", "such wow", 1),
                meme("m3", "u3", "new framework", 0),
            ],
        )
        .with_meme_page(
            2,
            vec![
                meme("m3", "u3", "new framework", 0),
                meme("m4", "u1", "it works on my machine", 2),
                meme("m5", "u2", "much deploy", 0),
            ],
        )
        .with_meme_page(3, vec![meme("m6", "u3", "tabs vs spaces", 0)])
        .with_comment_page(
            "m1",
            1,
            vec![
                comment("c1", "u2", "relatable"),
                comment("c2", "u3", "every week"),
            ],
        )
        .with_comment_page("m1", 2, vec![comment("c3", "u1", "no.")])
        .with_comment_page("m2", 1, vec![comment("c4", "u1", "wow")])
        .with_comment_page("m4", 1, vec![comment("c5", "u3", "ship your machine")])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{CommentService, MemeService};

    #[test]
    fn demo_backend_serves_overlapping_pages() {
        let backend = demo_backend();
        let page = backend.load_memes(2).unwrap();
        assert_eq!(page.results[0].id, "m3");
        assert!(page.results.len() as u64 == page.page_size);
        let comments = backend.load_comments("m1", 2).unwrap();
        assert_eq!(comments.results.len(), 1);
    }
}
