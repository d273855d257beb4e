//! Word → media files
//!
//! [`ImageGenerator`] renders each character of a validated word, runs the
//! compositing operations and writes the results under the images
//! directory using the deterministic name `<Kind>_<word>[_<font>].<ext>`.
//! Any collaborator can rebuild a file name from (kind, word, font) with
//! [`MediaKind::file_name`] without asking the generator.
//!
//! Rendering and encoding are CPU-bound or blocking, so the async entry
//! points run them on the blocking thread pool.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::compositing::{
    intersection_image, pair_diff_image, step_sequence, union_image, GlyphBitmap, ToneMap,
};
use crate::error::{FontError, KasaneResult, RenderError};
use crate::fonts::{FontRegistry, GlyphRenderer};
use crate::identity::{FontKey, Word, DEFAULT_FONT_KEY};
use crate::video::VideoEncoder;

// ============================================================================
// File naming
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Question,
    Answer,
    Union,
    Video,
    Preview,
}

impl MediaKind {
    pub const ALL: [MediaKind; 5] = [
        MediaKind::Question,
        MediaKind::Answer,
        MediaKind::Union,
        MediaKind::Video,
        MediaKind::Preview,
    ];

    /// File name prefix
    pub fn prefix(self) -> &'static str {
        match self {
            MediaKind::Question => "Q",
            MediaKind::Answer => "A",
            MediaKind::Union => "U",
            MediaKind::Video => "V",
            MediaKind::Preview => "P",
        }
    }

    /// Lowercase route segment (`/q/<word>`)
    pub fn route(self) -> &'static str {
        match self {
            MediaKind::Question => "q",
            MediaKind::Answer => "a",
            MediaKind::Union => "u",
            MediaKind::Video => "v",
            MediaKind::Preview => "p",
        }
    }

    pub fn from_route(segment: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.route() == segment)
    }

    pub fn extension(self) -> &'static str {
        match self {
            MediaKind::Video => "mp4",
            _ => "png",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            MediaKind::Video => "video/mp4",
            _ => "image/png",
        }
    }

    pub fn file_name(self, word: &Word, font: &FontKey) -> String {
        format!(
            "{}_{}{}.{}",
            self.prefix(),
            word,
            font.file_suffix(),
            self.extension()
        )
    }
}

/// Paths of one image set; `answer` only exists for two-character words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImages {
    pub question: PathBuf,
    pub answer: Option<PathBuf>,
    pub union: PathBuf,
}

impl GeneratedImages {
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths = vec![self.question.clone(), self.union.clone()];
        paths.extend(self.answer.clone());
        paths
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedVideo {
    pub video: PathBuf,
    pub preview: PathBuf,
}

impl GeneratedVideo {
    pub fn paths(&self) -> Vec<PathBuf> {
        vec![self.video.clone(), self.preview.clone()]
    }
}

// ============================================================================
// Composer seam
// ============================================================================

#[async_trait]
pub trait ImageComposer: Send + Sync {
    /// Validate a user-supplied font identifier; empty means `default`
    fn normalize_font(&self, raw: Option<&str>) -> Result<FontKey, FontError>;

    /// `default` followed by every available named font
    fn font_keys(&self) -> Vec<String>;

    /// Where a media file for (kind, word, font) lives
    fn media_path(&self, kind: MediaKind, word: &Word, font: &FontKey) -> PathBuf;

    /// Question + union images, plus the answer image for two-character words
    async fn generate_images(&self, word: &Word, font: &FontKey) -> KasaneResult<GeneratedImages>;

    /// Step-reveal video and its first-frame preview
    async fn generate_video(
        &self,
        word: &Word,
        font: &FontKey,
        fps: u32,
    ) -> KasaneResult<GeneratedVideo>;
}

#[derive(Clone)]
pub struct ImageGenerator {
    images_dir: PathBuf,
    registry: Arc<FontRegistry>,
    renderer: Arc<dyn GlyphRenderer>,
    encoder: Arc<dyn VideoEncoder>,
}

impl ImageGenerator {
    pub fn new(
        images_dir: impl Into<PathBuf>,
        registry: Arc<FontRegistry>,
        renderer: Arc<dyn GlyphRenderer>,
        encoder: Arc<dyn VideoEncoder>,
    ) -> Self {
        Self {
            images_dir: images_dir.into(),
            registry,
            renderer,
            encoder,
        }
    }

    pub fn images_dir(&self) -> &Path {
        &self.images_dir
    }

    fn render_word(&self, word: &Word, font: &FontKey) -> KasaneResult<Vec<GlyphBitmap>> {
        let handle = self.registry.resolve(font)?;
        Ok(word.chars().map(|ch| self.renderer.render(ch, &handle)).collect())
    }

    fn save_png(&self, tones: &ToneMap, path: &Path) -> Result<(), RenderError> {
        tones.to_rgb_image().save(path).map_err(|e| RenderError::Image {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    fn prepare_dir(&self) -> Result<(), RenderError> {
        std::fs::create_dir_all(&self.images_dir)?;
        Ok(())
    }

    /// Blocking body of [`ImageComposer::generate_images`]
    ///
    /// On failure any file already written for this set is removed again.
    pub fn compose_images(&self, word: &Word, font: &FontKey) -> KasaneResult<GeneratedImages> {
        info!("Generating images: {}, font: {}", word, font);
        let glyphs = self.render_word(word, font)?;
        self.prepare_dir()?;

        let mut written = Vec::new();
        let result = self.write_images(&glyphs, word, font, &mut written);
        if result.is_err() {
            remove_partial(&written);
        }
        result
    }

    fn write_images(
        &self,
        glyphs: &[GlyphBitmap],
        word: &Word,
        font: &FontKey,
        written: &mut Vec<PathBuf>,
    ) -> KasaneResult<GeneratedImages> {
        let question = self.media_path(MediaKind::Question, word, font);
        let union = self.media_path(MediaKind::Union, word, font);
        let answer = if let [a, b] = glyphs {
            let diff = pair_diff_image(a, b)?;
            let answer = self.media_path(MediaKind::Answer, word, font);
            self.save_png(&diff.question.to_silhouette(), &question)?;
            written.push(question.clone());
            self.save_png(&diff.answer, &answer)?;
            written.push(answer.clone());
            Some(answer)
        } else {
            self.save_png(&intersection_image(glyphs)?.to_silhouette(), &question)?;
            written.push(question.clone());
            None
        };
        self.save_png(&union_image(glyphs)?.to_silhouette(), &union)?;

        Ok(GeneratedImages {
            question,
            answer,
            union,
        })
    }

    /// Blocking body of [`ImageComposer::generate_video`]
    pub fn compose_video(
        &self,
        word: &Word,
        font: &FontKey,
        fps: u32,
    ) -> KasaneResult<GeneratedVideo> {
        info!("Generating reveal video: {}, font: {}", word, font);
        let glyphs = self.render_word(word, font)?;
        let frames = step_sequence(&glyphs)?;
        self.prepare_dir()?;

        let video = self.media_path(MediaKind::Video, word, font);
        let preview = self.media_path(MediaKind::Preview, word, font);
        // step_sequence always yields at least two frames for a valid word
        if let Some(first) = frames.first() {
            self.save_png(first, &preview)?;
        }
        if let Err(e) = self.encoder.encode(&frames, fps, &video) {
            remove_partial(&[preview, video]);
            return Err(e.into());
        }

        Ok(GeneratedVideo { video, preview })
    }
}

fn remove_partial(paths: &[PathBuf]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => debug!("Removed partial output {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}

async fn run_blocking<T, F>(f: F) -> KasaneResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> KasaneResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| RenderError::Task(e.to_string()))?
}

#[async_trait]
impl ImageComposer for ImageGenerator {
    fn normalize_font(&self, raw: Option<&str>) -> Result<FontKey, FontError> {
        self.registry.normalize(raw)
    }

    fn font_keys(&self) -> Vec<String> {
        std::iter::once(DEFAULT_FONT_KEY.to_string())
            .chain(self.registry.available_keys())
            .collect()
    }

    fn media_path(&self, kind: MediaKind, word: &Word, font: &FontKey) -> PathBuf {
        self.images_dir.join(kind.file_name(word, font))
    }

    async fn generate_images(&self, word: &Word, font: &FontKey) -> KasaneResult<GeneratedImages> {
        let (this, word, font) = (self.clone(), word.clone(), font.clone());
        run_blocking(move || this.compose_images(&word, &font)).await
    }

    async fn generate_video(
        &self,
        word: &Word,
        font: &FontKey,
        fps: u32,
    ) -> KasaneResult<GeneratedVideo> {
        let (this, word, font) = (self.clone(), word.clone(), font.clone());
        run_blocking(move || this.compose_video(&word, &font, fps)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        let word = Word::parse("森林").unwrap();
        assert_eq!(
            MediaKind::Question.file_name(&word, &FontKey::default_key()),
            "Q_森林.png"
        );
        assert_eq!(
            MediaKind::Video.file_name(&word, &FontKey::from_registered("mincho")),
            "V_森林_mincho.mp4"
        );
    }

    #[test]
    fn test_route_segments() {
        for kind in MediaKind::ALL {
            assert_eq!(MediaKind::from_route(kind.route()), Some(kind));
        }
        assert_eq!(MediaKind::from_route("x"), None);
    }

    #[test]
    fn test_generated_paths_include_answer_only_when_present() {
        let images = GeneratedImages {
            question: "Q.png".into(),
            answer: None,
            union: "U.png".into(),
        };
        assert_eq!(images.paths().len(), 2);
    }
}
