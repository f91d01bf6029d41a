//! Rule file loading
//!
//! Rule files are TOML documents with `[[rules]]` tables or YAML documents
//! with a `rules:` list. A rule directory is loaded file by file in file-name
//! order so that declared rule order is reproducible.

use super::{RuleDefinition, RuleSet};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_RULES: &str = include_str!("../../assets/default-rules.toml");

#[derive(Debug, Default, Deserialize)]
struct RuleFile {
    #[serde(default)]
    rules: Vec<RuleDefinition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleFormat {
    Toml,
    Yaml,
}

impl RuleFormat {
    fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        match extension.as_str() {
            "toml" => Some(RuleFormat::Toml),
            "yaml" | "yml" => Some(RuleFormat::Yaml),
            _ => None,
        }
    }
}

fn parse_definitions(text: &str, format: RuleFormat, origin: &str) -> Result<Vec<RuleDefinition>> {
    let file: RuleFile = match format {
        RuleFormat::Toml => toml::from_str(text)
            .with_context(|| format!("Failed to parse TOML rules from {origin}"))?,
        RuleFormat::Yaml => serde_yml::from_str(text)
            .with_context(|| format!("Failed to parse YAML rules from {origin}"))?,
    };
    Ok(file.rules)
}

impl RuleSet {
    /// Load rules from `rule_dir`, or the embedded default rules when none is given
    pub fn load(rule_dir: Option<&Path>) -> Result<Self> {
        match rule_dir {
            Some(dir) => Self::from_dir(dir),
            None => Self::embedded(),
        }
    }

    pub fn embedded() -> Result<Self> {
        Self::from_toml_str(DEFAULT_RULES).context("Embedded default rules are invalid")
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Self::from_definitions(parse_definitions(text, RuleFormat::Toml, "string")?)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Self::from_definitions(parse_definitions(text, RuleFormat::Yaml, "string")?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_definitions(read_rule_file(path)?)
    }

    /// Load every `.toml`, `.yaml` and `.yml` file in `dir`, sorted by file name
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .with_context(|| format!("Failed to read rule directory {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.is_file() && RuleFormat::from_path(path).is_some())
            .collect();
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        if files.is_empty() {
            bail!("No rule files found in {}", dir.display());
        }

        let mut definitions = Vec::new();
        for path in &files {
            definitions.extend(read_rule_file(path)?);
        }

        tracing::debug!(
            "Loaded {} rule definitions from {} files in {}",
            definitions.len(),
            files.len(),
            dir.display()
        );
        Self::from_definitions(definitions)
            .with_context(|| format!("Invalid rules in {}", dir.display()))
    }
}

fn read_rule_file(path: &Path) -> Result<Vec<RuleDefinition>> {
    let format = RuleFormat::from_path(path)
        .with_context(|| format!("Unsupported rule file type: {}", path.display()))?;
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read rule file {}", path.display()))?;
    parse_definitions(&text, format, &path.display().to_string())
}
