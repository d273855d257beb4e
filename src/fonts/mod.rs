//! Font resolution and glyph rendering

pub mod fallback;
pub mod registry;
pub mod renderer;

pub use registry::{FontHandle, FontRegistry};
pub use renderer::{FontdueRenderer, GlyphRenderer, INK_COVERAGE};
