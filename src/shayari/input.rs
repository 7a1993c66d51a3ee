use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::error::PipelineError;
use super::model::Item;

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    id: Option<RawId>,
    #[serde(default)]
    shayari: String,
}

/// Ids may be written as strings or whole numbers.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_id(self) -> String {
        match self {
            RawId::Text(text) => text.trim().to_string(),
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// The parsed contents of one input JSON file.
#[derive(Debug, Clone)]
pub struct InputBatch {
    pub source: PathBuf,
    /// File name without extension; names the output subfolder.
    pub stem: String,
    pub items: Vec<Item>,
}

impl InputBatch {
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Input(format!("cannot read {}: {}", path.display(), e))
        })?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                PipelineError::Input(format!("{} has no usable file name", path.display()))
            })?
            .to_string();
        let items = parse_items(&contents)?;
        Ok(Self {
            source: path.to_path_buf(),
            stem,
            items,
        })
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items to run: the one at `index`, or all of them in file order.
    pub fn select(&self, index: Option<usize>) -> Result<Vec<Item>, PipelineError> {
        match index {
            Some(i) if i >= self.items.len() => Err(PipelineError::Input(format!(
                "index {} out of range (batch has {} items)",
                i,
                self.items.len()
            ))),
            Some(i) => Ok(vec![self.items[i].clone()]),
            None => Ok(self.items.clone()),
        }
    }
}

pub fn default_item_id(index: usize) -> String {
    format!("shayari_{:04}", index)
}

/// Parse the JSON array of `{id?, shayari}` objects.
///
/// Duplicate or unsafe ids reject the whole file. Empty verse text is kept
/// and fails later as a per-item input error.
pub fn parse_items(contents: &str) -> Result<Vec<Item>, PipelineError> {
    let raw: Vec<RawEntry> = serde_json::from_str(contents)
        .map_err(|e| PipelineError::Input(format!("malformed input JSON: {}", e)))?;

    let mut seen = HashSet::new();
    let mut items = Vec::with_capacity(raw.len());

    for (index, entry) in raw.into_iter().enumerate() {
        let id = match entry.id {
            Some(id) => id.into_id(),
            None => default_item_id(index),
        };
        validate_id(&id).map_err(|reason| {
            PipelineError::Input(format!("entry {} has invalid id {:?}: {}", index, id, reason))
        })?;
        if !seen.insert(id.clone()) {
            return Err(PipelineError::Input(format!(
                "duplicate id {:?} at entry {}",
                id, index
            )));
        }
        items.push(Item {
            id,
            text: entry.shayari.trim().to_string(),
        });
    }

    Ok(items)
}

fn validate_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("id is empty");
    }
    if id == "." || id == ".." {
        return Err("id is a relative path component");
    }
    if id.chars().any(|c| c == '/' || c == '\\' || c.is_control()) {
        return Err("id contains a path separator or control character");
    }
    if id.len() > 200 {
        return Err("id is longer than 200 bytes");
    }
    Ok(())
}
