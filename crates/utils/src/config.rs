//! Runtime configuration loaded from environment variables.

use std::{env, fmt::Display, str::FromStr};

use secrecy::SecretString;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    Invalid { key: &'static str, message: String },
    #[error("{present} is set but {missing} is missing")]
    Incomplete {
        present: &'static str,
        missing: &'static str,
    },
}

#[derive(Debug, Clone)]
pub struct GoogleSearchConfig {
    pub api_key: SecretString,
    pub engine_id: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: SecretString,
}

#[derive(Debug, Clone)]
pub struct SendGridConfig {
    pub api_key: SecretString,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub session_secure: bool,
    pub cors_origin: Option<String>,
    pub app_base_url: String,
    pub admin_emails: Vec<String>,
    pub openai_api_key: Option<SecretString>,
    pub openai_model: String,
    pub google_search: Option<GoogleSearchConfig>,
    pub unsplash_access_key: Option<SecretString>,
    pub amazon_associate_tag: Option<String>,
    pub cloudinary: Option<CloudinaryConfig>,
    pub sendgrid: Option<SendGridConfig>,
    /// Zero disables the reminder sweep.
    pub reminder_poll_seconds: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            database_url: None,
            session_secure: false,
            cors_origin: None,
            app_base_url: "http://localhost:5000".to_string(),
            admin_emails: Vec::new(),
            openai_api_key: None,
            openai_model: "gpt-4o-mini".to_string(),
            google_search: None,
            unsplash_access_key: None,
            amazon_associate_tag: None,
            cloudinary: None,
            sendgrid: None,
            reminder_poll_seconds: 3600,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let google_search = google_search(optional("GOOGLE_API_KEY"), optional("GOOGLE_CSE_ID"))?;
        let cloudinary = cloudinary(
            optional("CLOUDINARY_CLOUD_NAME"),
            optional("CLOUDINARY_API_KEY"),
            optional("CLOUDINARY_API_SECRET"),
        )?;
        let sendgrid = sendgrid(optional("SENDGRID_API_KEY"), optional("EMAIL_FROM"))?;

        Ok(Self {
            host: optional("HOST").unwrap_or(defaults.host),
            port: parse_or("PORT", defaults.port)?,
            database_url: optional("DATABASE_URL"),
            session_secure: parse_or("SESSION_SECURE", defaults.session_secure)?,
            cors_origin: optional("CORS_ORIGIN"),
            app_base_url: optional("APP_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.app_base_url),
            admin_emails: optional("ADMIN_EMAILS")
                .map(|list| parse_email_list(&list))
                .unwrap_or_default(),
            openai_api_key: optional("OPENAI_API_KEY").map(SecretString::from),
            openai_model: optional("OPENAI_MODEL").unwrap_or(defaults.openai_model),
            google_search,
            unsplash_access_key: optional("UNSPLASH_ACCESS_KEY").map(SecretString::from),
            amazon_associate_tag: optional("AMAZON_ASSOCIATE_TAG"),
            cloudinary,
            sendgrid,
            reminder_poll_seconds: parse_or("REMINDER_POLL_SECONDS", defaults.reminder_poll_seconds)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn is_admin_email(&self, email: &str) -> bool {
        let email = email.trim().to_lowercase();
        self.admin_emails.iter().any(|admin| *admin == email)
    }
}

fn optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => {
            info!("{key} not set");
            None
        }
    }
}

fn parse_or<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Display,
    T::Err: Display,
{
    match optional(key) {
        Some(raw) => raw.parse().map_err(|e: T::Err| {
            warn!("Invalid {key} value: {e}");
            ConfigError::Invalid {
                key,
                message: e.to_string(),
            }
        }),
        None => {
            info!("{key} using default: {default}");
            Ok(default)
        }
    }
}

fn google_search(
    api_key: Option<String>,
    engine_id: Option<String>,
) -> Result<Option<GoogleSearchConfig>, ConfigError> {
    let config = match (api_key, engine_id) {
        (Some(api_key), Some(engine_id)) => Some(GoogleSearchConfig {
            api_key: SecretString::from(api_key),
            engine_id,
        }),
        (Some(_), None) => {
            return Err(ConfigError::Incomplete {
                present: "GOOGLE_API_KEY",
                missing: "GOOGLE_CSE_ID",
            });
        }
        (None, Some(_)) => {
            warn!("GOOGLE_CSE_ID is set without GOOGLE_API_KEY; web search disabled");
            None
        }
        (None, None) => None,
    };
    Ok(config)
}

fn cloudinary(
    cloud_name: Option<String>,
    api_key: Option<String>,
    api_secret: Option<String>,
) -> Result<Option<CloudinaryConfig>, ConfigError> {
    let config = match (cloud_name, api_key, api_secret) {
        (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
            cloud_name,
            api_key,
            api_secret: SecretString::from(api_secret),
        }),
        (Some(_), None, _) => {
            return Err(ConfigError::Incomplete {
                present: "CLOUDINARY_CLOUD_NAME",
                missing: "CLOUDINARY_API_KEY",
            });
        }
        (Some(_), _, None) => {
            return Err(ConfigError::Incomplete {
                present: "CLOUDINARY_CLOUD_NAME",
                missing: "CLOUDINARY_API_SECRET",
            });
        }
        (None, api_key, api_secret) => {
            if api_key.is_some() || api_secret.is_some() {
                warn!("Cloudinary credentials are set without CLOUDINARY_CLOUD_NAME; uploads disabled");
            }
            None
        }
    };
    Ok(config)
}

fn sendgrid(
    api_key: Option<String>,
    from: Option<String>,
) -> Result<Option<SendGridConfig>, ConfigError> {
    let config = match (api_key, from) {
        (Some(api_key), Some(from)) => Some(SendGridConfig {
            api_key: SecretString::from(api_key),
            from,
        }),
        (Some(_), None) => {
            return Err(ConfigError::Incomplete {
                present: "SENDGRID_API_KEY",
                missing: "EMAIL_FROM",
            });
        }
        (None, Some(_)) => {
            warn!("EMAIL_FROM is set without SENDGRID_API_KEY; reminder emails disabled");
            None
        }
        (None, None) => None,
    };
    Ok(config)
}

fn parse_email_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_emails_are_normalised() {
        let config = AppConfig {
            admin_emails: parse_email_list(" Admin@Example.com, ,ops@example.com"),
            ..AppConfig::default()
        };
        assert_eq!(config.admin_emails, vec!["admin@example.com", "ops@example.com"]);
        assert!(config.is_admin_email("ADMIN@example.com "));
        assert!(!config.is_admin_email("someone@example.com"));
    }

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn half_configured_integrations_stay_disabled() {
        assert!(google_search(None, some("cse")).unwrap().is_none());
        assert!(cloudinary(None, some("key"), some("secret")).unwrap().is_none());
        assert!(cloudinary(None, None, some("secret")).unwrap().is_none());
        assert!(sendgrid(None, some("hi@giftgenie.app")).unwrap().is_none());
        assert!(sendgrid(None, None).unwrap().is_none());
    }

    #[test]
    fn missing_companion_settings_are_errors() {
        assert!(matches!(
            google_search(some("key"), None),
            Err(ConfigError::Incomplete { missing: "GOOGLE_CSE_ID", .. })
        ));
        assert!(matches!(
            cloudinary(some("demo"), some("key"), None),
            Err(ConfigError::Incomplete { missing: "CLOUDINARY_API_SECRET", .. })
        ));
        assert!(matches!(
            sendgrid(some("key"), None),
            Err(ConfigError::Incomplete { missing: "EMAIL_FROM", .. })
        ));
        let cloudinary = cloudinary(some("demo"), some("key"), some("secret")).unwrap().unwrap();
        assert_eq!(cloudinary.cloud_name, "demo");
    }

    #[test]
    fn bind_address_joins_host_and_port() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:5000");
    }
}
