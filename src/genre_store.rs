use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::constants::{default_genres, GENRE_COUNT};

#[derive(Debug, Error)]
pub enum GenreStoreError {
    #[error("failed to create parent dir {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("failed to serialize config for {path}: {source}")]
    Serialize {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Genre zone labels backed by a JSON config file shared with other
/// settings. Only the `genres` key is ever written.
pub struct GenreStore {
    file_path: PathBuf,
    genres: Vec<String>,
}

impl GenreStore {
    pub fn new(file_path: PathBuf) -> Self {
        let genres = load_genres(&file_path);
        Self { file_path, genres }
    }

    pub fn genres(&self) -> &[String] {
        &self.genres
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Replaces the labels in memory, then persists them. The in-memory
    /// labels stay updated even when the write fails.
    pub fn replace(&mut self, genres: Vec<String>) -> Result<(), GenreStoreError> {
        self.genres = genres;
        self.save()
    }

    fn save(&self) -> Result<(), GenreStoreError> {
        let mut config = read_config_object(&self.file_path);
        config.insert(
            "genres".to_string(),
            Value::Array(self.genres.iter().cloned().map(Value::String).collect()),
        );

        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| GenreStoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let text = serde_json::to_string_pretty(&Value::Object(config)).map_err(|source| {
            GenreStoreError::Serialize {
                path: self.file_path.clone(),
                source,
            }
        })?;
        fs::write(&self.file_path, text).map_err(|source| GenreStoreError::Write {
            path: self.file_path.clone(),
            source,
        })?;
        info!(path = %self.file_path.display(), "genres saved, other settings preserved");
        Ok(())
    }
}

/// Trims and uppercases submitted labels. Anything but exactly eight
/// labels is rejected.
pub fn normalize_genres(raw: &[String]) -> Option<Vec<String>> {
    if raw.len() != GENRE_COUNT {
        return None;
    }
    Some(raw.iter().map(|genre| genre.trim().to_uppercase()).collect())
}

fn load_genres(path: &Path) -> Vec<String> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() == io::ErrorKind::NotFound {
                debug!(path = %path.display(), "no genre config, using defaults");
            } else {
                warn!(path = %path.display(), %error, "failed to read genre config, using defaults");
            }
            return default_genres();
        }
    };

    let parsed: Value = match serde_json::from_str(&text) {
        Ok(value) => value,
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to parse genre config, using defaults");
            return default_genres();
        }
    };

    let Some(genres) = parsed.get("genres").and_then(parse_genre_list) else {
        warn!(path = %path.display(), "genre config has no valid 8-entry genres list, using defaults");
        return default_genres();
    };
    info!(path = %path.display(), "loaded genres from config");
    genres
}

fn parse_genre_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    if items.len() != GENRE_COUNT {
        return None;
    }
    items
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn read_config_object(path: &Path) -> Map<String, Value> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != io::ErrorKind::NotFound {
                warn!(path = %path.display(), %error, "could not read existing config, creating new");
            }
            return Map::new();
        }
    };
    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!(path = %path.display(), "existing config is not an object, creating new");
            Map::new()
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "could not parse existing config, creating new");
            Map::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_GENRES;

    fn temp_file(name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            name,
            std::process::id(),
            rand::random::<u64>()
        );
        std::env::temp_dir().join(unique).join("config.json")
    }

    fn cleanup(path: &Path) {
        let _ = fs::remove_file(path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    fn labels(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|label| label.to_string()).collect()
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let path = temp_file("genre-store-missing");
        let store = GenreStore::new(path);
        assert_eq!(store.genres(), DEFAULT_GENRES);
    }

    #[test]
    fn invalid_json_falls_back_to_defaults() {
        let path = temp_file("genre-store-invalid");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(&path, "{ not json").expect("write file");
        let store = GenreStore::new(path.clone());
        assert_eq!(store.genres(), DEFAULT_GENRES);
        cleanup(&path);
    }

    #[test]
    fn wrong_length_list_falls_back_to_defaults() {
        let path = temp_file("genre-store-short");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(&path, r#"{"genres":["A","B"]}"#).expect("write file");
        let store = GenreStore::new(path.clone());
        assert_eq!(store.genres(), DEFAULT_GENRES);
        cleanup(&path);
    }

    #[test]
    fn replace_round_trips_and_preserves_other_settings() {
        let path = temp_file("genre-store-merge");
        fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
        fs::write(
            &path,
            r#"{"volume":0.4,"theme":{"dark":true},"genres":["X","X","X","X","X","X","X","X"]}"#,
        )
        .expect("write file");

        let mut store = GenreStore::new(path.clone());
        let submitted = labels(&["FUNK", "SOUL", "DISCO", "GARAGE", "DUB", "TRANCE", "FOLK", "OPERA"]);
        store.replace(submitted.clone()).expect("save succeeds");

        let saved: Value =
            serde_json::from_str(&fs::read_to_string(&path).expect("read back")).expect("json");
        assert_eq!(saved["genres"], serde_json::json!(submitted));
        assert_eq!(saved["volume"], 0.4);
        assert_eq!(saved["theme"]["dark"], true);

        let reloaded = GenreStore::new(path.clone());
        assert_eq!(reloaded.genres(), submitted.as_slice());
        cleanup(&path);
    }

    #[test]
    fn replace_keeps_memory_when_write_fails() {
        let dir = temp_file("genre-store-unwritable");
        fs::create_dir_all(&dir).expect("create dir");
        // The target path is a directory, so the write must fail.
        let mut store = GenreStore::new(dir.clone());
        let submitted = labels(&["A", "B", "C", "D", "E", "F", "G", "H"]);
        assert!(store.replace(submitted.clone()).is_err());
        assert_eq!(store.genres(), submitted.as_slice());
        let _ = fs::remove_dir_all(dir.parent().expect("parent"));
    }

    #[test]
    fn normalize_trims_uppercases_and_requires_eight() {
        let raw = labels(&[" techno ", "electro", "jazz", "hip hop", "classical", "house", "ambient", "dnb"]);
        let normalized = normalize_genres(&raw).expect("eight labels");
        assert_eq!(normalized[0], "TECHNO");
        assert_eq!(normalized[3], "HIP HOP");
        assert!(normalize_genres(&raw[..7]).is_none());
    }
}
