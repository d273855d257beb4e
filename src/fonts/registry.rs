//! Font registry
//!
//! Probes the configured font files once at construction. The first
//! loadable default path becomes the `default` face (or the built-in block
//! face when none load); named keys whose file fails to load are logged
//! and left out of `available_keys`.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{info, warn};

use crate::config::FontConfig;
use crate::error::FontError;
use crate::identity::{FontKey, DEFAULT_FONT_KEY};

static FONT_KEY_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{2,10}$").expect("font key pattern is valid"));

/// A loaded face ready for rasterization
#[derive(Clone)]
pub enum FontHandle {
    Face(Arc<fontdue::Font>),
    Builtin,
}

impl fmt::Debug for FontHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontHandle::Face(_) => write!(f, "FontHandle::Face"),
            FontHandle::Builtin => write!(f, "FontHandle::Builtin"),
        }
    }
}

pub struct FontRegistry {
    default: FontHandle,
    named: Vec<(String, FontHandle)>,
    case_insensitive: bool,
}

impl FontRegistry {
    pub fn probe(config: &FontConfig) -> Self {
        let mut loaded: HashMap<PathBuf, Option<FontHandle>> = HashMap::new();
        let mut load = |path: &Path| -> Option<FontHandle> {
            loaded
                .entry(path.to_path_buf())
                .or_insert_with(|| load_face(path))
                .clone()
        };

        let default = config
            .default_paths
            .iter()
            .find_map(|path| {
                let handle = load(path)?;
                info!("Using default font: {}", path.display());
                Some(handle)
            })
            .unwrap_or_else(|| {
                warn!("No default font could be loaded, using built-in face");
                FontHandle::Builtin
            });

        let named = config
            .named
            .iter()
            .filter_map(|entry| load(&entry.path).map(|handle| (entry.key.clone(), handle)))
            .collect();

        Self {
            default,
            named,
            case_insensitive: config.case_insensitive,
        }
    }

    /// Registry with only the built-in default face
    pub fn builtin() -> Self {
        Self {
            default: FontHandle::Builtin,
            named: Vec::new(),
            case_insensitive: true,
        }
    }

    /// Register an already-loaded face (tests and embedding)
    pub fn with_face(mut self, key: &str, handle: FontHandle) -> Self {
        self.named.push((key.to_string(), handle));
        self
    }

    /// Map empty/absent to `default`; otherwise validate pattern and availability
    pub fn normalize(&self, raw: Option<&str>) -> Result<FontKey, FontError> {
        let raw = raw.map(str::trim).unwrap_or_default();
        if raw.is_empty() {
            return Ok(FontKey::default_key());
        }
        let key = if self.case_insensitive {
            raw.to_ascii_lowercase()
        } else {
            raw.to_string()
        };
        if !FONT_KEY_PATTERN.is_match(&key) {
            return Err(FontError::Pattern(raw.to_string()));
        }
        if key == DEFAULT_FONT_KEY {
            return Ok(FontKey::default_key());
        }
        if self.named.iter().any(|(k, _)| *k == key) {
            Ok(FontKey::from_registered(&key))
        } else {
            Err(FontError::Unavailable(raw.to_string()))
        }
    }

    pub fn resolve(&self, key: &FontKey) -> Result<FontHandle, FontError> {
        if key.is_default() {
            return Ok(self.default.clone());
        }
        self.named
            .iter()
            .find(|(k, _)| k == key.as_str())
            .map(|(_, handle)| handle.clone())
            .ok_or_else(|| FontError::Unavailable(key.to_string()))
    }

    /// Named keys whose file loaded at startup, in configured order
    pub fn available_keys(&self) -> Vec<String> {
        self.named.iter().map(|(k, _)| k.clone()).collect()
    }
}

fn load_face(path: &Path) -> Option<FontHandle> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("Font not readable: {} - {}", path.display(), e);
            return None;
        }
    };
    match fontdue::Font::from_bytes(bytes, fontdue::FontSettings::default()) {
        Ok(font) => Some(FontHandle::Face(Arc::new(font))),
        Err(e) => {
            warn!("Font load failed: {} - {}", path.display(), e);
            None
        }
    }
}
