use std::path::PathBuf;
use std::sync::Mutex;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("ENCORE_DEPLOY_ID is not set")]
    MissingDeployId,
    #[error("ENCORE_RUNTIME_CONFIG is not set and ENCORE_RUNTIME_CONFIG_PATH is not set")]
    MissingConfig,
    #[error("failed to read runtime config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to base64url-decode ENCORE_RUNTIME_CONFIG: {0}")]
    Base64(base64::DecodeError),
    #[error("failed to parse runtime config as JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Process-level configuration (spec.md §6), loaded once at process
/// start from `ENCORE_RUNTIME_CONFIG`/`ENCORE_RUNTIME_CONFIG_PATH` plus
/// the sibling environment variables the runtime exposes alongside it.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub deploy_id: String,
    pub document: serde_json::Value,
    pub infra_config_path: Option<PathBuf>,
    pub process_config: Option<String>,
}

impl RuntimeConfig {
    /// `ENCORE_DEPLOY_ID` is required; the document prefers
    /// `ENCORE_RUNTIME_CONFIG_PATH` (a JSON file on disk) over
    /// `ENCORE_RUNTIME_CONFIG` (a base64url-encoded JSON blob, the same
    /// encoding C11 uses for `ENCORE_CFG_<SERVICE>`); `ENCORE_INFRA_CONFIG_PATH`
    /// and `ENCORE_PROCESS_CONFIG` are carried through unparsed.
    pub fn from_env() -> Result<Self, RuntimeConfigError> {
        let deploy_id = std::env::var("ENCORE_DEPLOY_ID").map_err(|_| RuntimeConfigError::MissingDeployId)?;
        let document = load_document()?;
        let infra_config_path = std::env::var("ENCORE_INFRA_CONFIG_PATH").ok().map(PathBuf::from);
        let process_config = std::env::var("ENCORE_PROCESS_CONFIG").ok();
        Ok(RuntimeConfig { deploy_id, document, infra_config_path, process_config })
    }
}

fn load_document() -> Result<serde_json::Value, RuntimeConfigError> {
    if let Ok(path) = std::env::var("ENCORE_RUNTIME_CONFIG_PATH") {
        let path = PathBuf::from(path);
        let bytes = std::fs::read(&path).map_err(|source| RuntimeConfigError::ReadFile { path: path.clone(), source })?;
        return Ok(serde_json::from_slice(&bytes)?);
    }
    let encoded = std::env::var("ENCORE_RUNTIME_CONFIG").map_err(|_| RuntimeConfigError::MissingConfig)?;
    let decoded = URL_SAFE_NO_PAD.decode(encoded).map_err(RuntimeConfigError::Base64)?;
    Ok(serde_json::from_slice(&decoded)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    // `RuntimeConfig::from_env` reads process-wide environment variables;
    // serialize the tests that touch them so they don't race each other.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for var in ["ENCORE_DEPLOY_ID", "ENCORE_RUNTIME_CONFIG", "ENCORE_RUNTIME_CONFIG_PATH", "ENCORE_INFRA_CONFIG_PATH", "ENCORE_PROCESS_CONFIG"] {
            // SAFETY: serialized under ENV_LOCK; no other thread in this
            // process reads/writes these variables concurrently.
            unsafe { std::env::remove_var(var) };
        }
    }

    fn set_env(key: &str, value: impl AsRef<std::ffi::OsStr>) {
        // SAFETY: serialized under ENV_LOCK; no other thread in this
        // process reads/writes these variables concurrently.
        unsafe { std::env::set_var(key, value) };
    }

    #[test]
    fn missing_deploy_id_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        assert!(matches!(RuntimeConfig::from_env(), Err(RuntimeConfigError::MissingDeployId)));
    }

    #[test]
    fn loads_a_base64url_encoded_document_from_the_env_var() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_env("ENCORE_DEPLOY_ID", "deploy-123");
        let encoded = URL_SAFE_NO_PAD.encode(br#"{"app_id":"my-app"}"#);
        set_env("ENCORE_RUNTIME_CONFIG", encoded);

        let cfg = RuntimeConfig::from_env().unwrap();
        assert_eq!(cfg.deploy_id, "deploy-123");
        assert_eq!(cfg.document["app_id"], "my-app");
        clear_env();
    }

    #[test]
    fn prefers_the_path_variant_over_the_inline_one() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let tmp = tempfile_doc(br#"{"app_id":"from-file"}"#);
        set_env("ENCORE_DEPLOY_ID", "deploy-456");
        set_env("ENCORE_RUNTIME_CONFIG_PATH", tmp.path());
        set_env("ENCORE_RUNTIME_CONFIG", URL_SAFE_NO_PAD.encode(br#"{"app_id":"from-inline"}"#));

        let cfg = RuntimeConfig::from_env().unwrap();
        assert_eq!(cfg.document["app_id"], "from-file");
        clear_env();
    }

    #[test]
    fn carries_through_the_optional_sibling_vars() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        set_env("ENCORE_DEPLOY_ID", "deploy-789");
        set_env("ENCORE_RUNTIME_CONFIG", URL_SAFE_NO_PAD.encode(b"{}"));
        set_env("ENCORE_INFRA_CONFIG_PATH", "/etc/encore/infra.json");
        set_env("ENCORE_PROCESS_CONFIG", "some-opaque-value");

        let cfg = RuntimeConfig::from_env().unwrap();
        assert_eq!(cfg.infra_config_path, Some(PathBuf::from("/etc/encore/infra.json")));
        assert_eq!(cfg.process_config, Some("some-opaque-value".to_string()));
        clear_env();
    }

    fn tempfile_doc(contents: &[u8]) -> tempfile::NamedTempFile {
        use std::io::Write;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file
    }
}
