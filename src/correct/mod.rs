// src/correct/mod.rs
//! Source-specific exception tables.
//!
//! Each source (gazetteer, census) carries an explicit list of renames per
//! administrative level plus renames anchored on an external identifier.
//! Tables are compiled once, before any stage runs, and a key mapped to two
//! different values rejects the whole file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};
use tracing::{debug, warn};

use crate::error::ReconcileError;
use crate::names::AdminLevel;

static BUILTIN_CORRECTIONS: &str = include_str!("../../data/corrections.yaml");

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IdOverride {
    pub id: String,
    pub to: String,
}

/// Raw exception lists for one source, as authored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceExceptions {
    #[serde(default)]
    pub city: Vec<Rename>,
    #[serde(default)]
    pub district: Vec<Rename>,
    #[serde(default)]
    pub ward: Vec<Rename>,
    #[serde(default)]
    pub by_id: Vec<IdOverride>,
}

impl SourceExceptions {
    fn renames(&self, level: AdminLevel) -> &[Rename] {
        match level {
            AdminLevel::City => &self.city,
            AdminLevel::District => &self.district,
            AdminLevel::Ward => &self.ward,
        }
    }
}

/// Top-level layout of the corrections document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExceptionFile {
    #[serde(default)]
    pub gazetteer: SourceExceptions,
    #[serde(default)]
    pub census: SourceExceptions,
}

/// Compiled, validated exception table for one source.
#[derive(Debug, Clone, Default)]
pub struct Corrector {
    source: String,
    renames: HashMap<AdminLevel, HashMap<String, String>>,
    by_id: HashMap<String, String>,
}

impl Corrector {
    pub fn compile(source: &str, exceptions: &SourceExceptions) -> Result<Self, ReconcileError> {
        let mut renames = HashMap::new();
        for level in [AdminLevel::City, AdminLevel::District, AdminLevel::Ward] {
            let table = format!("{}.{}", source, level);
            let mut map = HashMap::new();
            for r in exceptions.renames(level) {
                insert_unique(&table, &mut map, &r.from, &r.to)?;
            }
            if !map.is_empty() {
                renames.insert(level, map);
            }
        }

        let table = format!("{}.by_id", source);
        let mut by_id = HashMap::new();
        for o in &exceptions.by_id {
            insert_unique(&table, &mut by_id, &o.id, &o.to)?;
        }

        Ok(Self {
            source: source.to_string(),
            renames,
            by_id,
        })
    }

    /// Exact-match rename; unmatched names come back unchanged.
    pub fn correct<'a>(&'a self, level: AdminLevel, name: &'a str) -> &'a str {
        match self.renames.get(&level).and_then(|m| m.get(name)) {
            Some(fixed) => {
                debug!(source = %self.source, %level, from = name, to = %fixed, "corrected name");
                fixed
            }
            None => name,
        }
    }

    /// Replacement name for the unit carrying external identifier `id`.
    pub fn for_id(&self, id: &str) -> Option<&str> {
        self.by_id.get(id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.renames.values().map(HashMap::len).sum::<usize>() + self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn insert_unique(
    table: &str,
    map: &mut HashMap<String, String>,
    from: &str,
    to: &str,
) -> Result<(), ReconcileError> {
    match map.get(from) {
        Some(existing) if existing == to => {
            warn!(table, key = from, "exception listed twice with the same value");
            Ok(())
        }
        Some(existing) => Err(ReconcileError::ConflictingException {
            table: table.to_string(),
            key: from.to_string(),
            first: existing.clone(),
            second: to.to_string(),
        }),
        None => {
            map.insert(from.to_string(), to.to_string());
            Ok(())
        }
    }
}

/// Both sources' compiled tables.
#[derive(Debug, Clone, Default)]
pub struct Corrections {
    pub gazetteer: Corrector,
    pub census: Corrector,
}

impl Corrections {
    /// Tables shipped in `data/corrections.yaml`.
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CORRECTIONS).context("compiling built-in corrections")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading corrections {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("compiling corrections {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let file: ExceptionFile = serde_yaml::from_str(text).context("parsing corrections YAML")?;
        let gazetteer = Corrector::compile("gazetteer", &file.gazetteer)?;
        let census = Corrector::compile("census", &file.census)?;
        debug!(
            gazetteer = gazetteer.len(),
            census = census.len(),
            "compiled exception tables"
        );
        Ok(Self { gazetteer, census })
    }
}
