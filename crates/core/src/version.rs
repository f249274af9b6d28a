//! Source units and their compiler version requirements

use crate::error::ConfigError;
use eyre::{Context, Result};
use semver::{Version, VersionReq};
use std::{
    collections::BTreeMap,
    fmt,
    path::{Path, PathBuf},
};
use walkdir::WalkDir;

/// A compiler version range as written in a `pragma solidity` directive.
///
/// Supports `||` alternatives, whitespace-separated comparator sets, hyphen
/// ranges (`0.7.0 - 0.8.0`, inclusive) and bare versions, which mean
/// "exactly this version".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    expression: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidVersionRequirement {
            expression: expression.to_string(),
            reason,
        };

        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(invalid("expression is empty".to_string()));
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let normalized = normalize_comparators(alternative).map_err(invalid)?;
            let req = VersionReq::parse(&normalized).map_err(|e| invalid(e.to_string()))?;
            alternatives.push(req);
        }

        Ok(Self {
            expression: trimmed.to_string(),
            alternatives,
        })
    }

    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}

impl std::str::FromStr for VersionRange {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Rewrites one pragma comparator set into `semver` syntax
fn normalize_comparators(alternative: &str) -> Result<String, String> {
    let tokens: Vec<&str> = alternative.split_whitespace().collect();
    if tokens.contains(&"-") {
        return match tokens.as_slice() {
            [lower, "-", upper] => Ok(format!(">={lower}, <={upper}")),
            _ => Err("hyphen range must be `<lower> - <upper>`".to_string()),
        };
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in tokens {
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '^' | '~')) {
            if pending_op.is_some() {
                return Err(format!("dangling operator before `{token}`"));
            }
            pending_op = Some(token);
            continue;
        }

        let comparator = match pending_op.take() {
            Some(op) => format!("{op}{token}"),
            // Solidity treats a bare version as an exact pin; semver treats it as a caret.
            None if Version::parse(token).is_ok() => format!("={token}"),
            None => token.to_string(),
        };
        comparators.push(comparator);
    }

    if let Some(op) = pending_op {
        return Err(format!("operator `{op}` has no version"));
    }
    if comparators.is_empty() {
        return Err("empty alternative".to_string());
    }

    Ok(comparators.join(", "))
}

/// Maps every input source unit to the version range it requires.
#[derive(Debug, Clone, Default)]
pub struct SourceVersionMap {
    requirements: BTreeMap<String, VersionRange>,
}

impl SourceVersionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the requirement for a source unit
    pub fn insert(&mut self, unit: impl Into<String>, range: VersionRange) -> Option<VersionRange> {
        self.requirements.insert(unit.into(), range)
    }

    /// Parses `expression` and adds it for `unit`
    pub fn require(
        &mut self,
        unit: impl Into<String>,
        expression: &str,
    ) -> Result<(), ConfigError> {
        let range = VersionRange::parse(expression)?;
        self.insert(unit, range);
        Ok(())
    }

    pub fn get(&self, unit: &str) -> Option<&VersionRange> {
        self.requirements.get(unit)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &VersionRange)> {
        self.requirements.iter().map(|(unit, range)| (unit.as_str(), range))
    }

    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.requirements.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Discovers `.sol` files under `dir` and reads their `pragma solidity` ranges.
    ///
    /// Unit identifiers are paths relative to `project_root` with `/` separators.
    /// Files without a pragma are skipped.
    pub fn scan(project_root: &Path, dir: &Path) -> Result<Self> {
        let scan_root = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            project_root.join(dir)
        };

        if !scan_root.is_dir() {
            return Err(eyre::eyre!(
                "Source directory does not exist: {}",
                scan_root.display()
            ));
        }

        let mut map = Self::new();
        let mut files: Vec<PathBuf> = WalkDir::new(&scan_root)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "sol"))
            .collect();
        files.sort();

        for path in files {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let unit = unit_id(project_root, &path);

            match extract_pragma(&content) {
                Some(expression) => {
                    let range = VersionRange::parse(&expression)
                        .wrap_err_with(|| format!("Invalid pragma in {}", path.display()))?;
                    tracing::debug!("Discovered {} requiring {}", unit, range);
                    map.insert(unit, range);
                }
                None => {
                    tracing::warn!("Skipping {}: no `pragma solidity` directive", unit);
                }
            }
        }

        Ok(map)
    }
}

impl Extend<(String, VersionRange)> for SourceVersionMap {
    fn extend<T: IntoIterator<Item = (String, VersionRange)>>(&mut self, iter: T) {
        self.requirements.extend(iter);
    }
}

fn unit_id(project_root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(project_root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Extracts the expression of the first `pragma solidity ...;` outside comments
fn extract_pragma(source: &str) -> Option<String> {
    for line in strip_comments(source).lines() {
        let code = line.trim();
        if let Some(rest) = code.strip_prefix("pragma solidity") {
            let expression = rest.split(';').next().unwrap_or_default().trim();
            if !expression.is_empty() {
                return Some(expression.to_string());
            }
        }
    }
    None
}

/// Blanks out `//` and `/* */` comments, keeping line breaks
fn strip_comments(source: &str) -> String {
    let mut code = String::with_capacity(source.len());
    let mut chars = source.chars().peekable();
    let mut in_block = false;

    while let Some(c) = chars.next() {
        if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
            } else if c == '\n' {
                code.push(c);
            }
            continue;
        }
        match (c, chars.peek()) {
            ('/', Some('*')) => {
                chars.next();
                in_block = true;
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        code.push(skipped);
                        break;
                    }
                }
            }
            _ => code.push(c),
        }
    }
    code
}
