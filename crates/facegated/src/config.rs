use std::net::SocketAddr;
use std::path::PathBuf;

const DEFAULT_BIND: &str = "127.0.0.1:5001";

/// Daemon configuration, loaded once from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:5001).
    pub bind_addr: SocketAddr,
    /// Directory containing the ONNX model files.
    pub model_dir: PathBuf,
    /// Upper bound on a request body, uploads included.
    pub max_upload_bytes: usize,
    /// Requests that may wait for the engine before senders block.
    pub engine_queue: usize,
    /// ONNX Runtime intra-op threads per session.
    pub intra_threads: usize,
}

impl Config {
    /// Load configuration from `FACEGATE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Self {
        let bind_addr = match var("FACEGATE_BIND") {
            Some(raw) => raw.parse().unwrap_or_else(|err| {
                tracing::warn!(value = %raw, error = %err, "invalid FACEGATE_BIND; using {DEFAULT_BIND}");
                default_bind()
            }),
            None => default_bind(),
        };

        Self {
            bind_addr,
            model_dir: var("FACEGATE_MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(facegate_core::default_model_dir),
            max_upload_bytes: parsed(&var, "FACEGATE_MAX_UPLOAD_BYTES", 16 * 1024 * 1024),
            engine_queue: parsed(&var, "FACEGATE_ENGINE_QUEUE", 8).max(1),
            intra_threads: parsed(&var, "FACEGATE_INTRA_THREADS", 2).max(1),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 5001))
}

fn parsed(var: &impl Fn(&str) -> Option<String>, key: &str, default: usize) -> usize {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
