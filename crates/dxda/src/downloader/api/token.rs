//! API token discovery
//!
//! The token is taken from `DX_API_TOKEN` when set (a `.env` file in the
//! working directory is honoured). Otherwise it is read from the platform
//! CLI's `~/.dnanexus_config/environment.json`, whose `DX_SECURITY_CONTEXT`
//! field is itself a JSON-encoded string holding `auth_token`.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::downloader::core::{DownloadError, FileOperation, Result};

/// Environment variable checked first
pub const TOKEN_ENV_VAR: &str = "DX_API_TOKEN";

/// Config file location relative to the user's home directory
pub const CONFIG_FILE: &str = ".dnanexus_config/environment.json";

/// Where a token was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOrigin {
    Environment,
    ConfigFile(PathBuf),
}

impl fmt::Display for TokenOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenOrigin::Environment => write!(f, "{}", TOKEN_ENV_VAR),
            TokenOrigin::ConfigFile(path) => write!(f, "{}", path.display()),
        }
    }
}

/// A discovered API token
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSource {
    pub token: String,
    pub origin: TokenOrigin,
}

impl fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSource")
            .field("token", &"<redacted>")
            .field("origin", &self.origin)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct EnvironmentConfig {
    #[serde(rename = "DX_SECURITY_CONTEXT")]
    security_context: String,
}

#[derive(Debug, Deserialize)]
struct SecurityContext {
    auth_token: String,
}

/// Find a token in the environment or the platform config file
pub fn get_token() -> Option<TokenSource> {
    dotenv::dotenv().ok(); // Ignore error if .env not present

    if let Some(source) = token_from_env_value(std::env::var(TOKEN_ENV_VAR).ok()) {
        debug!("Using API token from {}", TOKEN_ENV_VAR);
        return Some(source);
    }

    let path = dirs::home_dir()?.join(CONFIG_FILE);
    match read_config_token(&path) {
        Ok(token) => {
            debug!("Using API token from {}", path.display());
            Some(TokenSource { token, origin: TokenOrigin::ConfigFile(path) })
        }
        Err(e) => {
            debug!("No usable token in {}: {}", path.display(), e);
            None
        }
    }
}

fn token_from_env_value(value: Option<String>) -> Option<TokenSource> {
    value
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .map(|token| TokenSource { token, origin: TokenOrigin::Environment })
}

/// Read `auth_token` out of an environment.json file
pub fn read_config_token(path: &Path) -> Result<String> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| DownloadError::file_system(path, FileOperation::Read, e))?;
    parse_environment_json(&contents).map_err(|reason| DownloadError::Configuration {
        message: format!("{}: {}", path.display(), reason),
        field: Some("DX_SECURITY_CONTEXT".to_string()),
        suggestion: Some(format!("Log in with the platform CLI or set {}", TOKEN_ENV_VAR)),
    })
}

fn parse_environment_json(contents: &str) -> std::result::Result<String, String> {
    let config: EnvironmentConfig = serde_json::from_str(contents)
        .map_err(|e| format!("invalid environment file: {}", e))?;
    let context: SecurityContext = serde_json::from_str(&config.security_context)
        .map_err(|e| format!("invalid DX_SECURITY_CONTEXT: {}", e))?;

    let token = context.auth_token.trim();
    if token.is_empty() {
        return Err("auth_token is empty".to_string());
    }
    Ok(token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ENVIRONMENT_JSON: &str = r#"{
        "DX_APISERVER_HOST": "api.dnanexus.com",
        "DX_APISERVER_PORT": "443",
        "DX_APISERVER_PROTOCOL": "https",
        "DX_SECURITY_CONTEXT": "{\"auth_token_type\": \"Bearer\", \"auth_token\": \"abc123\"}",
        "DX_USERNAME": "alice"
    }"#;

    #[test]
    fn security_context_is_decoded_twice() {
        assert_eq!(parse_environment_json(ENVIRONMENT_JSON).unwrap(), "abc123");
    }

    #[test]
    fn missing_auth_token_is_rejected() {
        let contents = r#"{"DX_SECURITY_CONTEXT": "{\"auth_token_type\": \"Bearer\"}"}"#;
        assert!(parse_environment_json(contents).is_err());

        let contents = r#"{"DX_SECURITY_CONTEXT": "{\"auth_token\": \"  \"}"}"#;
        assert!(parse_environment_json(contents).is_err());
    }

    #[test]
    fn read_config_token_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("environment.json");
        std::fs::write(&path, ENVIRONMENT_JSON).unwrap();

        assert_eq!(read_config_token(&path).unwrap(), "abc123");
    }

    #[test]
    fn unreadable_config_reports_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("environment.json");
        std::fs::write(&path, "not json").unwrap();

        match read_config_token(&path) {
            Err(DownloadError::Configuration { message, .. }) => assert!(message.contains("environment.json")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
        assert!(matches!(
            read_config_token(&dir.path().join("absent.json")),
            Err(DownloadError::FileSystem { .. })
        ));
    }

    #[test]
    fn blank_environment_value_is_ignored() {
        assert_eq!(token_from_env_value(None), None);
        assert_eq!(token_from_env_value(Some("   ".to_string())), None);
        assert_eq!(
            token_from_env_value(Some(" tok \n".to_string())),
            Some(TokenSource { token: "tok".to_string(), origin: TokenOrigin::Environment })
        );
    }

    #[test]
    fn debug_output_hides_token() {
        let source = TokenSource { token: "secret".to_string(), origin: TokenOrigin::Environment };
        assert!(!format!("{:?}", source).contains("secret"));
    }
}
