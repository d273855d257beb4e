//! Image Generator Integration Tests
//!
//! Uses synthetic glyphs so pixel colors are known in advance:
//! 森 inks the left half, 林 the top half, 木 the top-left quadrant.
//!
//! Run with: cargo test --test generator

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use kasane::compositing::{GlyphBitmap, Tone, ToneMap};
use kasane::error::RenderError;
use kasane::fonts::{FontHandle, FontRegistry, GlyphRenderer};
use kasane::generator::{ImageComposer, ImageGenerator, MediaKind};
use kasane::identity::{FontKey, Word};
use kasane::video::VideoEncoder;
use tempfile::TempDir;

const SIZE: u32 = 32;
const HALF: u32 = SIZE / 2;

struct HalfPlaneRenderer;

impl GlyphRenderer for HalfPlaneRenderer {
    fn render(&self, ch: char, _font: &FontHandle) -> GlyphBitmap {
        GlyphBitmap::from_fn(SIZE, SIZE, |x, y| match ch {
            '森' => x < HALF,
            '林' => y < HALF,
            '木' => x < HALF && y < HALF,
            _ => false,
        })
    }

    fn size(&self) -> u32 {
        SIZE
    }
}

/// Records frame counts and writes an empty output file
#[derive(Default)]
struct RecordingEncoder {
    frames: Mutex<Vec<usize>>,
}

impl VideoEncoder for RecordingEncoder {
    fn encode(&self, frames: &[ToneMap], _fps: u32, output: &Path) -> Result<(), RenderError> {
        self.frames.lock().unwrap().push(frames.len());
        std::fs::write(output, b"")?;
        Ok(())
    }
}

struct FailingEncoder;

impl VideoEncoder for FailingEncoder {
    fn encode(&self, _frames: &[ToneMap], _fps: u32, output: &Path) -> Result<(), RenderError> {
        std::fs::write(output, b"partial")?;
        Err(RenderError::Encoder("encoder exited with 1".to_string()))
    }
}

fn generator(dir: &TempDir) -> (ImageGenerator, Arc<RecordingEncoder>) {
    let encoder = Arc::new(RecordingEncoder::default());
    let generator = ImageGenerator::new(
        dir.path().join("images"),
        Arc::new(FontRegistry::builtin()),
        Arc::new(HalfPlaneRenderer),
        encoder.clone(),
    );
    (generator, encoder)
}

fn pixel(path: &PathBuf, x: u32, y: u32) -> [u8; 3] {
    image::open(path).unwrap().to_rgb8().get_pixel(x, y).0
}

#[test]
fn test_two_char_word_produces_three_images() {
    let dir = TempDir::new().unwrap();
    let (generator, _) = generator(&dir);
    let word = Word::parse("森林").unwrap();

    let images = generator
        .compose_images(&word, &FontKey::default_key())
        .unwrap();
    let answer = images.answer.clone().expect("two characters yield an answer image");
    for path in images.paths() {
        assert!(path.exists(), "{} missing", path.display());
    }
    assert_eq!(images.question.file_name().unwrap(), "Q_森林.png");

    // both ink, 森 only, 林 only, neither
    assert_eq!(pixel(&answer, 2, 2), Tone::Purple.rgb());
    assert_eq!(pixel(&answer, 2, HALF + 2), Tone::Blue.rgb());
    assert_eq!(pixel(&answer, HALF + 2, 2), Tone::Red.rgb());
    assert_eq!(pixel(&answer, HALF + 2, HALF + 2), Tone::White.rgb());

    assert_eq!(pixel(&images.question, 2, 2), Tone::Black.rgb());
    assert_eq!(pixel(&images.question, 2, HALF + 2), Tone::White.rgb());
    assert_eq!(pixel(&images.union, 2, HALF + 2), Tone::Black.rgb());
    assert_eq!(pixel(&images.union, HALF + 2, HALF + 2), Tone::White.rgb());
}

#[test]
fn test_longer_word_has_no_answer_image() {
    let dir = TempDir::new().unwrap();
    let (generator, _) = generator(&dir);
    let word = Word::parse("森林木").unwrap();

    let images = generator
        .compose_images(&word, &FontKey::default_key())
        .unwrap();
    assert!(images.answer.is_none());
    assert!(!generator
        .media_path(MediaKind::Answer, &word, &FontKey::default_key())
        .exists());
    assert_eq!(pixel(&images.question, 2, 2), Tone::Black.rgb());
    assert_eq!(pixel(&images.question, 2, HALF + 2), Tone::White.rgb());
}

#[tokio::test]
async fn test_reveal_video_frames_and_preview() {
    let dir = TempDir::new().unwrap();
    let (generator, encoder) = generator(&dir);
    let word = Word::parse("森林木").unwrap();

    let video = generator
        .generate_video(&word, &FontKey::default_key(), 1)
        .await
        .unwrap();
    assert!(video.video.ends_with("V_森林木.mp4"));
    assert!(video.preview.exists());
    // two step frames plus the final intersection
    assert_eq!(*encoder.frames.lock().unwrap(), [3]);

    // first frame is the plain pair rule between 森 and 林
    assert_eq!(pixel(&video.preview, 2, 2), Tone::Purple.rgb());
    assert_eq!(pixel(&video.preview, 2, HALF + 2), Tone::Red.rgb());
    assert_eq!(pixel(&video.preview, HALF + 2, 2), Tone::Blue.rgb());
}

#[tokio::test]
async fn test_unknown_font_is_rejected_before_rendering() {
    let dir = TempDir::new().unwrap();
    let (generator, _) = generator(&dir);
    assert!(generator.normalize_font(Some("mincho")).is_err());
    assert!(generator.normalize_font(Some("!")).is_err());
    assert_eq!(generator.font_keys(), ["default"]);
}

#[test]
fn test_failed_image_set_leaves_no_partial_files() {
    let dir = TempDir::new().unwrap();
    let (generator, _) = generator(&dir);
    let word = Word::parse("森林").unwrap();
    let font = FontKey::default_key();

    // a directory where the union PNG should go makes the last write fail
    let union = generator.media_path(MediaKind::Union, &word, &font);
    std::fs::create_dir_all(&union).unwrap();

    assert!(generator.compose_images(&word, &font).is_err());
    assert!(!generator.media_path(MediaKind::Question, &word, &font).exists());
    assert!(!generator.media_path(MediaKind::Answer, &word, &font).exists());
}

#[tokio::test]
async fn test_failed_encode_removes_preview() {
    let dir = TempDir::new().unwrap();
    let generator = ImageGenerator::new(
        dir.path().join("images"),
        Arc::new(FontRegistry::builtin()),
        Arc::new(HalfPlaneRenderer),
        Arc::new(FailingEncoder),
    );
    let word = Word::parse("森林木").unwrap();
    let font = FontKey::default_key();

    assert!(generator.generate_video(&word, &font, 1).await.is_err());
    assert!(!generator.media_path(MediaKind::Preview, &word, &font).exists());
    assert!(!generator.media_path(MediaKind::Video, &word, &font).exists());
}
