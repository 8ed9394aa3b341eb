use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Daemon configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 0.0.0.0:8000).
    pub bind: SocketAddr,
    /// Path to the JSON people database.
    pub db_path: PathBuf,
    /// Directory where registration photos are kept.
    pub known_faces_dir: PathBuf,
    /// HTML page served at `/`.
    pub index_path: PathBuf,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Maximum Euclidean distance for a positive match.
    pub match_tolerance: f32,
    /// Automation webhook receiving recognition results. `None` disables relay.
    pub webhook_url: Option<String>,
    pub webhook_timeout: Duration,
    /// Upper bound for a multipart request body.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from `VIGIA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let webhook_url = env_non_blank("VIGIA_WEBHOOK_URL").or_else(|| env_non_blank("N8N_WEBHOOK_URL"));

        Self {
            bind: env_parse("VIGIA_BIND", SocketAddr::from(([0, 0, 0, 0], 8000))),
            db_path: env_path("VIGIA_DB_PATH", "db/database.json"),
            known_faces_dir: env_path("VIGIA_KNOWN_FACES_DIR", "known_faces"),
            index_path: env_path("VIGIA_INDEX_PATH", "index.html"),
            model_dir: vigia_core::default_model_dir(),
            match_tolerance: env_parse("VIGIA_MATCH_TOLERANCE", 1.10),
            webhook_url,
            webhook_timeout: Duration::from_secs(env_parse("VIGIA_WEBHOOK_TIMEOUT_SECS", 5)),
            max_upload_bytes: env_parse("VIGIA_MAX_UPLOAD_BYTES", 20 * 1024 * 1024),
        }
    }

    /// Path to the SCRFD detection model.
    pub fn scrfd_model_path(&self) -> String {
        self.model_dir
            .join("det_10g.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the ArcFace recognition model.
    pub fn arcface_model_path(&self) -> String {
        self.model_dir
            .join("w600k_r50.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_path(key: &str, default: &str) -> PathBuf {
    std::env::var(key)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(default))
}

/// Trimmed value of `key`, `None` when unset or blank.
fn env_non_blank(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_parse_falls_back_on_garbage() {
        std::env::set_var("VIGIA_TEST_GARBAGE_TOLERANCE", "not-a-number");
        assert_eq!(env_parse("VIGIA_TEST_GARBAGE_TOLERANCE", 0.6f32), 0.6);
        std::env::remove_var("VIGIA_TEST_GARBAGE_TOLERANCE");
    }

    #[test]
    fn test_env_parse_reads_value() {
        std::env::set_var("VIGIA_TEST_TIMEOUT", " 12 ");
        assert_eq!(env_parse("VIGIA_TEST_TIMEOUT", 5u64), 12);
        std::env::remove_var("VIGIA_TEST_TIMEOUT");
    }

    #[test]
    fn test_blank_webhook_url_falls_back() {
        std::env::set_var("VIGIA_WEBHOOK_URL", "  ");
        std::env::set_var("N8N_WEBHOOK_URL", "http://n8n.local/hook");
        let config = Config::from_env();
        std::env::remove_var("VIGIA_WEBHOOK_URL");
        std::env::remove_var("N8N_WEBHOOK_URL");
        assert_eq!(config.webhook_url.as_deref(), Some("http://n8n.local/hook"));
    }

    #[test]
    fn test_env_non_blank() {
        std::env::set_var("VIGIA_TEST_BLANK", " \t");
        assert_eq!(env_non_blank("VIGIA_TEST_BLANK"), None);
        std::env::set_var("VIGIA_TEST_BLANK", " http://x ");
        assert_eq!(env_non_blank("VIGIA_TEST_BLANK").as_deref(), Some("http://x"));
        std::env::remove_var("VIGIA_TEST_BLANK");
        assert_eq!(env_non_blank("VIGIA_TEST_BLANK"), None);
    }

    #[test]
    fn test_model_paths() {
        let mut config = Config::from_env();
        config.model_dir = PathBuf::from("/models");
        assert_eq!(config.scrfd_model_path(), "/models/det_10g.onnx");
        assert_eq!(config.arcface_model_path(), "/models/w600k_r50.onnx");
    }
}
