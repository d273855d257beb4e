//! Error handling for the kasane quiz bot
//!
//! One `thiserror` enum per concern, aggregated into [`KasaneError`].
//! Validation errors are turned into user-facing replies by the LINE
//! handler; storage and rendering errors are logged and surfaced as a
//! generic failure text.

use thiserror::Error;

/// Main error type for the quiz bot
#[derive(Error, Debug)]
pub enum KasaneError {
    #[error("Word error: {0}")]
    Word(#[from] WordError),

    #[error("Font error: {0}")]
    Font(#[from] FontError),

    #[error("Slot error: {0}")]
    Slot(#[from] SlotRangeError),

    #[error("Composite error: {0}")]
    Composite(#[from] CompositeError),

    #[error("Rendering backend error: {0}")]
    Render(#[from] RenderError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Word validation failures (compositing input and quiz words)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WordError {
    #[error("word must be 2-8 characters, got {len}")]
    Length { len: usize },

    #[error("character '{ch}' is not allowed")]
    Character { ch: char },
}

/// Font identifier / font file failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FontError {
    #[error("font identifier must be 2-10 alphanumeric characters: '{0}'")]
    Pattern(String),

    #[error("font '{0}' is not available")]
    Unavailable(String),
}

/// Quiz slot outside 1..=10
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("quiz slot must be between 1 and 10, got {0}")]
pub struct SlotRangeError(pub i64);

/// Programming errors from the compositing engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositeError {
    #[error("operation needs at least {required} glyphs, got {given}")]
    NotEnoughGlyphs { required: usize, given: usize },

    #[error("glyph dimensions differ: {expected:?} vs {found:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("step index {step} out of range for {glyphs} glyphs")]
    StepOutOfRange { step: usize, glyphs: usize },
}

/// External rendering/encoding dependency failures
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("image encode failed for {path}: {message}")]
    Image { path: String, message: String },

    #[error("video encoder failed: {0}")]
    Encoder(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("background task failed: {0}")]
    Task(String),
}

/// Settings / quiz persistence failures
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),
}

/// Inbound webhook rejection reasons
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("signature verification failed")]
    Signature,

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Outbound reply / media URL failures
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("channel access token is missing")]
    MissingToken,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API rejected request: status={status} body={body}")]
    Rejected { status: u16, body: String },

    #[error("media URL unavailable: {0}")]
    MediaUrl(String),
}

/// Result type aliases for convenience
pub type KasaneResult<T> = Result<T, KasaneError>;
pub type StoreResult<T> = Result<T, StoreError>;
