//! Category label map loaded once at startup.
//!
//! The persisted map is a `{label: index}` object (JSON or YAML). Indices must
//! cover `0..N` exactly once so that every logit position has a label and the
//! inverse mapping is total.

use doclass_core::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Index → label mapping for the classifier's logits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelMap {
    labels: Vec<String>,
}

impl LabelMap {
    /// Build from `(label, index)` pairs, rejecting gaps and duplicates
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let pairs: Vec<(String, usize)> = pairs.into_iter().map(|(l, i)| (l.into(), i)).collect();

        if pairs.is_empty() {
            return Err(Error::model_load("label map is empty"));
        }

        let count = pairs.len();
        let mut slots: Vec<Option<String>> = vec![None; count];
        let mut seen = HashSet::with_capacity(count);

        for (label, idx) in pairs {
            let slot = slots.get_mut(idx).ok_or_else(|| {
                Error::model_load(format!(
                    "label '{}' has index {} outside 0..{}",
                    label, idx, count
                ))
            })?;
            if let Some(existing) = slot {
                return Err(Error::model_load(format!(
                    "labels '{}' and '{}' share index {}",
                    existing, label, idx
                )));
            }
            if !seen.insert(label.clone()) {
                return Err(Error::model_load(format!("duplicate label '{}'", label)));
            }
            *slot = Some(label);
        }

        let labels = slots
            .into_iter()
            .enumerate()
            .map(|(idx, slot)| {
                slot.ok_or_else(|| Error::model_load(format!("no label for index {}", idx)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { labels })
    }

    /// Build from labels listed in index order
    pub fn from_labels<I, S>(labels: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_pairs(labels.into_iter().enumerate().map(|(idx, l)| (l, idx)))
    }

    /// Parse a JSON object `{label: index}`
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: HashMap<String, usize> = serde_json::from_str(json)?;
        Self::from_pairs(raw)
    }

    /// Parse a YAML mapping `label: index`
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: HashMap<String, usize> = serde_yaml::from_str(yaml)?;
        Self::from_pairs(raw)
    }

    /// Load from file; `.yaml`/`.yml` are parsed as YAML, anything else as JSON
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::model_load(format!(
                "Label map file not found: {}",
                path.display()
            )));
        }

        let content = std::fs::read_to_string(path)?;
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(false, |ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

        let map = if is_yaml {
            Self::from_yaml(&content)
        } else {
            Self::from_json(&content)
        };

        map.map_err(|e| {
            Error::model_load(format!("Failed to parse label map {}: {}", path.display(), e))
        })
    }

    /// Label for a logit index
    pub fn label(&self, idx: usize) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    /// Number of categories
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a successfully built map
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Labels in index order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// `(index, label)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.labels.iter().enumerate().map(|(idx, l)| (idx, l.as_str()))
    }
}
