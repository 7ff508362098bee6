/// Runtime configuration, read from the environment (a local `.env` is
/// loaded by `main` before this runs). Every field has a development
/// default except the credentials, which default to empty and simply
/// fail upstream when unset.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub dropbox_app_key: String,
    pub dropbox_app_secret: String,
    pub dropbox_redirect_uri: String,
    pub anthropic_api_key: String,
    pub anthropic_model: String,
    pub frontend_url: String,
    pub port: u16,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

impl AppConfig {
    pub fn from_env() -> Self {
        AppConfig {
            dropbox_app_key: env_or("DROPBOX_APP_KEY", ""),
            dropbox_app_secret: env_or("DROPBOX_APP_SECRET", ""),
            dropbox_redirect_uri: env_or(
                "DROPBOX_REDIRECT_URI",
                "http://localhost:5173/auth/callback",
            ),
            anthropic_api_key: env_or("ANTHROPIC_API_KEY", ""),
            anthropic_model: env_or("ANTHROPIC_MODEL", "claude-sonnet-4-20250514"),
            frontend_url: env_or("FRONTEND_URL", "http://localhost:5173"),
            port: env_or("PORT", "8000").parse().unwrap_or(8000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_local_development() {
        let config = AppConfig::from_env();
        assert!(config.frontend_url.starts_with("http://"));
        assert!(!config.anthropic_model.is_empty());
        assert!(config.port > 0);
    }
}
