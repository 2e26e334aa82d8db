//! Platform API access and credential discovery

pub mod dx_api;
pub mod token;

// Re-export common API types
pub use dx_api::{DownloadUrl, DxApi, WhoAmI};
pub use token::{get_token, read_config_token, TokenOrigin, TokenSource, TOKEN_ENV_VAR};
