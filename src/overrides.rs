use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::warn;

use crate::error::Result;

/// Parameter keys to leave out of the sweep, one per line.
pub fn load_excluded(path: Option<&Path>) -> Result<HashSet<String>> {
    match read_optional(path)? {
        Some(contents) => Ok(parse_excluded(&contents)),
        None => Ok(HashSet::new()),
    }
}

/// Fixed values for non-swept parameters, `key:value` per line.
pub fn load_predefined(path: Option<&Path>) -> Result<BTreeMap<String, String>> {
    match read_optional(path)? {
        Some(contents) => Ok(parse_predefined(&contents)),
        None => Ok(BTreeMap::new()),
    }
}

pub fn parse_excluded(contents: &str) -> HashSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn parse_predefined(contents: &str) -> BTreeMap<String, String> {
    let mut predefined = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((key, value)) => {
                predefined.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => warn!(line, "predefined parameter line has no ':' separator, skipped"),
        }
    }
    predefined
}

fn read_optional(path: Option<&Path>) -> Result<Option<String>> {
    match path {
        Some(path) if !path.as_os_str().is_empty() => Ok(Some(std::fs::read_to_string(path)?)),
        _ => Ok(None),
    }
}
