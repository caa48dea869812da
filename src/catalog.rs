//! Line codes and the line catalog.
//!
//! A line code (`letreiro`) looks like `"8000-10"`: a numeric part, which may
//! carry a letter suffix (`"917H"`), and a numeric variant. The catalog is a
//! CSV file mapping line ids and codes to terminal names.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::Path;
use tracing::{debug, info, warn};

/// Variant assumed when a code has no `-<variant>` suffix.
pub const DEFAULT_VARIANT: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineCode {
    pub numeric: String,
    pub variant: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineCodeError {
    #[error("empty line code")]
    Empty,
    #[error("invalid variant `{variant}` in line code `{code}`")]
    InvalidVariant { code: String, variant: String },
}

impl LineCode {
    pub fn parse(code: &str) -> Result<Self, LineCodeError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(LineCodeError::Empty);
        }

        match code.split_once('-') {
            None => Ok(Self {
                numeric: code.to_string(),
                variant: DEFAULT_VARIANT,
            }),
            Some((numeric, variant)) => {
                let variant = variant.trim().parse::<u32>().map_err(|_| {
                    LineCodeError::InvalidVariant {
                        code: code.to_string(),
                        variant: variant.to_string(),
                    }
                })?;
                if numeric.trim().is_empty() {
                    return Err(LineCodeError::Empty);
                }
                Ok(Self {
                    numeric: numeric.trim().to_string(),
                    variant,
                })
            }
        }
    }
}

impl fmt::Display for LineCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.numeric, self.variant)
    }
}

/// One row of the catalog CSV.
///
/// Terminal columns are accepted under both the `terminal_*` and the
/// `sentido_*` names found in published exports.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub id_linha: i64,
    pub letreiro_numerico: String,
    pub tipo_letreiro: u32,
    #[serde(alias = "sentido_ida")]
    pub terminal_principal: String,
    #[serde(alias = "sentido_volta")]
    pub terminal_secundario: String,
}

impl CatalogEntry {
    pub fn line_code(&self) -> LineCode {
        LineCode {
            numeric: self.letreiro_numerico.trim().to_string(),
            variant: self.tipo_letreiro,
        }
    }

    pub fn description(&self) -> String {
        format!(
            "{} / {}",
            self.terminal_principal.trim(),
            self.terminal_secundario.trim()
        )
    }
}

/// Read-only lookup from line ids and codes to catalog entries.
#[derive(Debug, Default)]
pub struct LineCatalog {
    by_code: HashMap<LineCode, CatalogEntry>,
    by_id: HashMap<i64, LineCode>,
}

impl LineCatalog {
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut catalog = Self::default();
        for entry in entries {
            let code = entry.line_code();
            catalog.by_id.insert(entry.id_linha, code.clone());
            catalog.by_code.insert(code, entry);
        }
        catalog
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut entries = Vec::new();
        for result in rdr.deserialize() {
            let entry: CatalogEntry = result?;
            entries.push(entry);
        }
        Ok(Self::from_entries(entries))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Line catalog not found at {}", path.display()))?;
        let catalog = Self::from_reader(file)
            .with_context(|| format!("Failed to read line catalog {}", path.display()))?;
        info!(path = %path.display(), lines = catalog.len(), "Line catalog loaded");
        Ok(catalog)
    }

    /// Like [`LineCatalog::load`], but a missing or unreadable catalog only
    /// costs the human-readable names.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Continuing without line names");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }

    /// Line codes (`"8000-10"`) of the given catalog ids. Unknown ids are skipped.
    pub fn target_line_codes(&self, line_ids: &[i64]) -> BTreeSet<String> {
        line_ids
            .iter()
            .filter_map(|id| {
                let code = self.by_id.get(id);
                if code.is_none() {
                    warn!(line_id = id, "Target line id not found in catalog");
                }
                code.map(LineCode::to_string)
            })
            .collect()
    }

    /// Terminal-to-terminal description of a raw line code, or the raw code
    /// itself when it cannot be parsed or is not in the catalog.
    pub fn describe(&self, raw_code: &str) -> String {
        match LineCode::parse(raw_code) {
            Ok(code) => match self.by_code.get(&code) {
                Some(entry) => entry.description(),
                None => raw_code.to_string(),
            },
            Err(e) => {
                debug!(line_code = raw_code, error = %e, "Unparseable line code");
                raw_code.to_string()
            }
        }
    }
}
