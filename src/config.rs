use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_GENRE_CONFIG_PATH: &str = "config.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    pub genre_config_path: PathBuf,
    /// Directory holding the browser clients. `None` disables static serving.
    pub static_dir: Option<PathBuf>,
    /// When set, `?viewer=true` connections must also present this token.
    pub viewer_token: Option<String>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("PORT")
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_PORT);

        let genre_config_path = lookup("GENRE_CONFIG_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_GENRE_CONFIG_PATH));

        let viewer_token = lookup("VIEWER_TOKEN").filter(|value| !value.is_empty());

        Self {
            port,
            genre_config_path,
            static_dir: resolve_static_dir(lookup("STATIC_DIR")),
            viewer_token,
        }
    }
}

fn resolve_static_dir(configured: Option<String>) -> Option<PathBuf> {
    if let Some(raw) = configured {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }

    let candidates = [PathBuf::from("public"), PathBuf::from("../public")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.genre_config_path, PathBuf::from("config.json"));
        assert_eq!(config.viewer_token, None);
    }

    #[test]
    fn invalid_port_falls_back_to_default() {
        let config = ServerConfig::from_lookup(lookup_from(&[("PORT", "not-a-port")]));
        assert_eq!(config.port, DEFAULT_PORT);
        let config = ServerConfig::from_lookup(lookup_from(&[("PORT", "70000")]));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn explicit_values_are_used() {
        let config = ServerConfig::from_lookup(lookup_from(&[
            ("PORT", "8081"),
            ("GENRE_CONFIG_PATH", "/tmp/arena/config.json"),
            ("VIEWER_TOKEN", "s3cret"),
        ]));
        assert_eq!(config.port, 8081);
        assert_eq!(
            config.genre_config_path,
            PathBuf::from("/tmp/arena/config.json")
        );
        assert_eq!(config.viewer_token.as_deref(), Some("s3cret"));
    }

    #[test]
    fn empty_viewer_token_means_unset() {
        let config = ServerConfig::from_lookup(lookup_from(&[("VIEWER_TOKEN", "")]));
        assert_eq!(config.viewer_token, None);
    }

    #[test]
    fn static_dir_requires_index_html() {
        let dir = std::env::temp_dir().join(format!(
            "static-dir-{}-{}",
            std::process::id(),
            rand::random::<u64>()
        ));
        std::fs::create_dir_all(&dir).expect("create dir");
        let raw = dir.to_string_lossy().to_string();
        assert_ne!(resolve_static_dir(Some(raw.clone())), Some(dir.clone()));

        std::fs::write(dir.join("index.html"), "<html></html>").expect("write index");
        assert_eq!(resolve_static_dir(Some(raw)), Some(dir.clone()));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
