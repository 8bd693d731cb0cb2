use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, SweepError};

pub const META_FILE: &str = "info.meta";

/// Reads the `datasetType=` entry of a dataset's `info.meta`.
pub fn dataset_type(samples_dir: &Path, dataset_key: &str) -> Result<String> {
    let meta_path = samples_dir.join(dataset_key).join(META_FILE);
    let contents = fs::read_to_string(&meta_path)?;
    contents
        .lines()
        .find(|line| line.contains("datasetType"))
        .map(|line| line.replace("datasetType=", "").trim().to_string())
        .ok_or_else(|| {
            SweepError::Config(format!("{} has no datasetType entry", meta_path.display()))
        })
}

/// Lists the sample ids of a dataset in the form the service expects,
/// sorted so that job payloads are reproducible.
pub fn load_samples(samples_dir: &Path, dataset_key: &str) -> Result<Vec<String>> {
    let kind = dataset_type(samples_dir, dataset_key)?;
    let dataset_dir = samples_dir.join(dataset_key);

    let mut samples = Vec::new();
    if kind.contains("voxforge") {
        for speaker_dir in sorted_entries(&dataset_dir)? {
            let wav_dir = speaker_dir.join("wav");
            if !wav_dir.is_dir() {
                continue;
            }
            for file in sorted_entries(&wav_dir)? {
                samples.push(voxforge_id(&relative_id(samples_dir, &file)));
            }
        }
    } else {
        for entry in sorted_entries(&dataset_dir)? {
            samples.push(relative_id(samples_dir, &entry));
        }
    }
    samples.sort();
    Ok(samples)
}

/// `speaker/wav/a01.wav` becomes `speaker-a01`.
pub fn voxforge_id(relative: &str) -> String {
    relative.replace("wav", "").replace("//", "-").replace('.', "")
}

fn relative_id(samples_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(samples_dir).unwrap_or(path);
    relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_meta = path
            .file_name()
            .map(|name| name.to_string_lossy().contains(".meta"))
            .unwrap_or(false);
        if is_meta {
            continue;
        }
        entries.push(path);
    }
    entries.sort();
    Ok(entries)
}
