//! Font registry for watermark text.
//!
//! Fonts are loaded from `.ttf`/`.otf` files and named after their file
//! stem. Lookups ignore case, spaces, dashes, underscores and a trailing
//! `Regular`, so `"DejaVu Sans"` finds `DejaVuSans.ttf` and `"Liberation
//! Sans"` finds `LiberationSans-Regular.ttf`.

use ab_glyph::FontVec;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::backend::{BackendError, FontCatalog};

const FONT_EXTENSIONS: &[&str] = &["ttf", "otf"];

/// Directories scanned by [`FontRegistry::system`].
fn system_font_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![
        PathBuf::from("/usr/share/fonts"),
        PathBuf::from("/usr/local/share/fonts"),
        PathBuf::from("/Library/Fonts"),
        PathBuf::from("/System/Library/Fonts"),
        PathBuf::from(r"C:\Windows\Fonts"),
    ];
    if let Some(home) = std::env::var_os("HOME") {
        let home = PathBuf::from(home);
        dirs.push(home.join(".fonts"));
        dirs.push(home.join(".local/share/fonts"));
    }
    dirs
}

/// Lookup key for a family name.
pub fn normalize_family(name: &str) -> String {
    let key: String = name
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .flat_map(char::to_lowercase)
        .collect();
    match key.strip_suffix("regular") {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => key,
    }
}

struct Entry {
    family: String,
    font: Arc<FontVec>,
}

/// Loaded fonts keyed by normalized family name.
#[derive(Default)]
pub struct FontRegistry {
    fonts: BTreeMap<String, Entry>,
}

impl std::fmt::Debug for FontRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FontRegistry")
            .field("families", &self.families())
            .finish()
    }
}

impl FontRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `font` as `family`, replacing any font with the same key.
    pub fn insert(&mut self, family: impl Into<String>, font: FontVec) {
        let family = family.into();
        self.fonts.insert(
            normalize_family(&family),
            Entry {
                family,
                font: Arc::new(font),
            },
        );
    }

    /// Parse raw font bytes and register them.
    pub fn insert_bytes(&mut self, family: impl Into<String>, data: Vec<u8>) -> Result<(), BackendError> {
        let family = family.into();
        let font = FontVec::try_from_vec(data)
            .map_err(|e| BackendError::ProcessingFailed(format!("Invalid font {family}: {e}")))?;
        self.insert(family, font);
        Ok(())
    }

    /// Load every font file under `dir`, recursively. Unreadable or
    /// malformed files are skipped with a warning.
    pub fn load_dir(dir: &Path) -> Result<Self, BackendError> {
        let mut registry = Self::new();
        registry.add_dir(dir)?;
        Ok(registry)
    }

    /// Fonts from the usual platform font directories. Missing directories
    /// are ignored, so the result may be empty.
    pub fn system() -> Self {
        let mut registry = Self::new();
        for dir in system_font_dirs().iter().filter(|d| d.is_dir()) {
            if let Err(e) = registry.add_dir(dir) {
                warn!(dir = %dir.display(), error = %e, "skipping font directory");
            }
        }
        debug!(count = registry.len(), "loaded system fonts");
        registry
    }

    pub fn add_dir(&mut self, dir: &Path) -> Result<(), BackendError> {
        if !dir.is_dir() {
            return Err(BackendError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("font directory not found: {}", dir.display()),
            )));
        }

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && is_font_file(e.path()))
        {
            let path = entry.path();
            let Some(family) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let loaded = std::fs::read(path)
                .map_err(BackendError::from)
                .and_then(|data| self.insert_bytes(family, data));
            if let Err(e) = loaded {
                warn!(path = %path.display(), error = %e, "skipping font file");
            }
        }
        Ok(())
    }

    pub fn get(&self, family: &str) -> Option<Arc<FontVec>> {
        self.fonts
            .get(&normalize_family(family))
            .map(|entry| Arc::clone(&entry.font))
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl FontCatalog for FontRegistry {
    fn contains(&self, family: &str) -> bool {
        self.fonts.contains_key(&normalize_family(family))
    }

    fn families(&self) -> Vec<String> {
        self.fonts.values().map(|e| e.family.clone()).collect()
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| FONT_EXTENSIONS.iter().any(|f| e.eq_ignore_ascii_case(f)))
}
