//! Symbol library lookup
//!
//! Symbol libraries belong to the host editor. Tools consume them through
//! [`SymbolLibrary`], which answers two questions: what does a library symbol
//! look like (body and pin geometry) and which symbols match a search.
//! [`MemoryLibrary`] is backed by TOML tables and ships a small built-in set.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::document::{Point, Rect};

const BUILTIN_LIBRARY: &str = include_str!("builtin.toml");

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("invalid library id `{0}`: expected `Library:Symbol`")]
    InvalidLibId(String),
    #[error("failed to read symbol library {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse symbol library: {0}")]
    Parse(#[from] toml::de::Error),
}

/// `Library:Symbol` identifier, e.g. `Device:R`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LibId {
    pub library: String,
    pub symbol: String,
}

impl FromStr for LibId {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((library, symbol))
                if !library.is_empty() && !symbol.is_empty() && !symbol.contains(':') =>
            {
                Ok(Self {
                    library: library.to_string(),
                    symbol: symbol.to_string(),
                })
            }
            _ => Err(LibraryError::InvalidLibId(s.to_string())),
        }
    }
}

impl fmt::Display for LibId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.library, self.symbol)
    }
}

/// Pin of a library symbol, relative to the symbol anchor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PinDef {
    pub number: String,
    #[serde(default)]
    pub name: String,
    pub x: f64,
    pub y: f64,
}

impl PinDef {
    pub fn offset(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

fn default_units() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibSymbol {
    pub lib_id: String,
    #[serde(default)]
    pub description: String,
    /// Reference designator prefix, e.g. `R` or `#PWR`
    #[serde(rename = "reference")]
    pub reference_prefix: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub datasheet: Option<String>,
    #[serde(default = "default_units")]
    pub units: u32,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Body outline relative to the anchor
    pub body: Rect,
    #[serde(default, rename = "pin")]
    pub pins: Vec<PinDef>,
}

impl LibSymbol {
    fn matches(&self, needle: &str) -> bool {
        self.lib_id.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
            || self.keywords.iter().any(|k| k.to_lowercase().contains(needle))
    }
}

pub trait SymbolLibrary: Send + Sync {
    fn lookup(&self, lib_id: &LibId) -> Option<&LibSymbol>;

    /// Case-insensitive search over ids, descriptions and keywords
    fn search(&self, query: &str, limit: usize) -> Vec<&LibSymbol>;
}

#[derive(Debug, Deserialize)]
struct LibraryFile {
    #[serde(default)]
    symbol: Vec<LibSymbol>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLibrary {
    symbols: BTreeMap<String, LibSymbol>,
}

impl MemoryLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Symbols shipped with the crate
    pub fn builtin() -> Result<Self, LibraryError> {
        Self::from_toml_str(BUILTIN_LIBRARY)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, LibraryError> {
        let file: LibraryFile = toml::from_str(content)?;
        let mut library = Self::new();
        for symbol in file.symbol {
            library.insert(symbol)?;
        }
        Ok(library)
    }

    pub fn load(path: &Path) -> Result<Self, LibraryError> {
        let content = std::fs::read_to_string(path).map_err(|source| LibraryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn insert(&mut self, symbol: LibSymbol) -> Result<(), LibraryError> {
        let id: LibId = symbol.lib_id.parse()?;
        self.symbols.insert(id.to_string(), symbol);
        Ok(())
    }

    /// Merge `other` over this library; later definitions win
    pub fn merge(&mut self, other: MemoryLibrary) {
        for (id, symbol) in other.symbols {
            if self.symbols.insert(id.clone(), symbol).is_some() {
                tracing::debug!("Symbol {} overridden by a later library", id);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl SymbolLibrary for MemoryLibrary {
    fn lookup(&self, lib_id: &LibId) -> Option<&LibSymbol> {
        self.symbols.get(&lib_id.to_string())
    }

    fn search(&self, query: &str, limit: usize) -> Vec<&LibSymbol> {
        let needle = query.trim().to_lowercase();
        self.symbols
            .values()
            .filter(|symbol| needle.is_empty() || symbol.matches(&needle))
            .take(limit)
            .collect()
    }
}
