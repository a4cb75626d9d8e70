pub mod env;

use secrecy::Secret;
use serde::Deserialize;
use service_core::config::ServerConfig;
use service_core::error::AppError;

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    /// Mounts `/api/debug/*`. Off unless explicitly enabled.
    #[serde(default)]
    pub debug_routes: bool,
    #[serde(default)]
    pub backend: BackendSettings,
    #[serde(default)]
    pub email: EmailSettings,
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct BackendSettings {
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Storage bucket holding portfolio before/after images.
    #[serde(default = "default_storage_bucket")]
    pub storage_bucket: String,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            storage_bucket: default_storage_bucket(),
        }
    }
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_storage_bucket() -> String {
    "portfolio".to_string()
}

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmailProviderKind {
    /// Logs instead of sending.
    #[default]
    Mock,
    /// JSON HTTP API authenticated with `EMAIL_API_KEY`.
    Http,
    Smtp,
}

#[derive(Deserialize, Clone, Debug)]
pub struct EmailSettings {
    #[serde(default)]
    pub provider: EmailProviderKind,
    #[serde(default = "default_email_api_base_url")]
    pub api_base_url: String,
    #[serde(default = "default_from_address")]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Where new enquiry notifications go.
    #[serde(default = "default_from_address")]
    pub notify_address: String,
}

impl Default for EmailSettings {
    fn default() -> Self {
        Self {
            provider: EmailProviderKind::default(),
            api_base_url: default_email_api_base_url(),
            from_address: default_from_address(),
            from_name: default_from_name(),
            notify_address: default_from_address(),
        }
    }
}

fn default_email_api_base_url() -> String {
    "https://api.resend.com".to_string()
}

fn default_from_address() -> String {
    "studio@example.com".to_string()
}

fn default_from_name() -> String {
    "Atelier Furniture Painting".to_string()
}

#[derive(Deserialize, Clone, Debug)]
pub struct SmtpSettings {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub user: String,
    pub password: Secret<String>,
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Deserialize, Clone, Debug)]
pub struct RateLimitSettings {
    pub signin_attempts: u32,
    pub signin_window_seconds: u64,
    pub contact_attempts: u32,
    pub contact_window_seconds: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            signin_attempts: 5,
            signin_window_seconds: 300,
            contact_attempts: 3,
            contact_window_seconds: 600,
        }
    }
}

pub fn get_configuration() -> Result<Settings, AppError> {
    let base_path = std::env::current_dir()?;

    // Works from the workspace root and from inside the crate directory.
    let configuration_directory = if base_path.ends_with("atelier-web") {
        base_path.join("configuration")
    } else {
        base_path.join("atelier-web").join("configuration")
    };

    service_core::config::load(&configuration_directory)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_settings_use_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(!settings.debug_routes);
        assert_eq!(settings.backend.timeout_seconds, 10);
        assert_eq!(settings.backend.storage_bucket, "portfolio");
        assert_eq!(settings.email.provider, EmailProviderKind::Mock);
        assert!(settings.smtp.is_none());
        assert_eq!(settings.rate_limit.signin_attempts, 5);
    }

    #[test]
    fn provider_kind_is_lowercase() {
        let email: EmailSettings = serde_json::from_str(r#"{"provider": "http"}"#).unwrap();
        assert_eq!(email.provider, EmailProviderKind::Http);
    }
}
