//! kasane - glyph compositing quiz bot
//!
//! Renders the characters of a short word in one font and overlays them:
//! the *common part* (pixels every glyph inks), the *union*, a colored
//! two-glyph diff, and a step-by-step reveal video. A LINE bot front end
//! lets users generate images, register quiz words in ten slots and play
//! them in group chats.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use kasane::fonts::{FontRegistry, FontdueRenderer};
//! use kasane::generator::ImageGenerator;
//! use kasane::identity::{FontKey, Word};
//! use kasane::video::FfmpegEncoder;
//!
//! let generator = ImageGenerator::new(
//!     "images",
//!     Arc::new(FontRegistry::builtin()),
//!     Arc::new(FontdueRenderer::new()),
//!     Arc::new(FfmpegEncoder::default()),
//! );
//! let word = Word::parse("森林").unwrap();
//! let images = generator.compose_images(&word, &FontKey::default_key()).unwrap();
//! println!("{}", images.question.display());
//! ```

// Core error handling
pub mod error;

// Validated domain values
pub mod identity;

// Environment + YAML configuration
pub mod config;

// Pure bitmap operations
pub mod compositing;

// Font lookup and glyph rasterization
pub mod fonts;

// Word -> media files
pub mod generator;
pub mod video;

// Chat text -> commands
pub mod command;

// Settings and quiz persistence
pub mod store;

// LINE channel and conversation state machine
pub mod line;

// HTTP server (when enabled)
#[cfg(feature = "server")]
pub mod api;

pub use error::{KasaneError, KasaneResult};
pub use generator::{ImageComposer, ImageGenerator, MediaKind};
pub use identity::{FontKey, Identity, QuizSlot, Word};
pub use line::LineHandler;
