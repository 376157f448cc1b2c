use std::path::{Path, PathBuf};

use anyhow::{ensure, Result};
use rand::Rng;

use crate::api::NewMeme;
use crate::data::MemeService;
use crate::model::Caption;

pub const CANVAS_WIDTH: f64 = 400.0;
pub const CANVAS_HEIGHT: f64 = 225.0;

/// A meme being put together before upload.
#[derive(Debug, Clone, Default)]
pub struct MemeDraft {
    picture: Option<PathBuf>,
    description: String,
    captions: Vec<Caption>,
}

impl MemeDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn picture(&self) -> Option<&Path> {
        self.picture.as_deref()
    }

    pub fn set_picture(&mut self, path: impl Into<PathBuf>) {
        self.picture = Some(path.into());
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    pub fn captions(&self) -> &[Caption] {
        &self.captions
    }

    /// Adds a placeholder caption at a random spot on the canvas.
    pub fn add_caption(&mut self) -> usize {
        let mut rng = rand::thread_rng();
        let caption = Caption {
            content: format!("New caption {}", self.captions.len() + 1),
            x: rng.gen_range(0.0..CANVAS_WIDTH),
            y: rng.gen_range(0.0..CANVAS_HEIGHT),
        };
        self.captions.push(caption);
        self.captions.len() - 1
    }

    pub fn delete_caption(&mut self, index: usize) {
        if index < self.captions.len() {
            self.captions.remove(index);
        }
    }

    pub fn update_caption(&mut self, index: usize, content: impl Into<String>) {
        if let Some(caption) = self.captions.get_mut(index) {
            caption.content = content.into();
        }
    }

    pub fn can_submit(&self) -> bool {
        self.picture.is_some() && !self.description.trim().is_empty() && !self.captions.is_empty()
    }

    /// Form fields for upload: trimmed description, rounded coordinates.
    pub fn to_new_meme(&self) -> NewMeme {
        NewMeme {
            description: self.description.trim().to_string(),
            texts: self
                .captions
                .iter()
                .map(|caption| {
                    (
                        caption.content.clone(),
                        caption.x.round() as i64,
                        caption.y.round() as i64,
                    )
                })
                .collect(),
        }
    }

    pub fn submit(&self, service: &dyn MemeService) -> Result<()> {
        ensure!(
            self.can_submit(),
            "a meme needs a picture, a description and at least one caption"
        );
        let picture = self
            .picture
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("picture missing"))?;
        service.create_meme(picture, &self.to_new_meme())?;
        tracing::info!(captions = self.captions.len(), "meme submitted");
        Ok(())
    }
}
