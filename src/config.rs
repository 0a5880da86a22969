use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: &str) -> Self {
        match value {
            "production" | "prod" => AppEnv::Production,
            _ => AppEnv::Development,
        }
    }
}

/// Base64-encoded RSA PEM key pair plus its time-to-live.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    pub private_key: String,
    pub public_key: String,
    pub max_age_minutes: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpEncryption {
    Tls,
    StartTls,
    None,
}

impl SmtpEncryption {
    fn parse(value: &str) -> anyhow::Result<Self> {
        match value.to_lowercase().as_str() {
            "tls" => Ok(SmtpEncryption::Tls),
            "starttls" => Ok(SmtpEncryption::StartTls),
            "none" => Ok(SmtpEncryption::None),
            other => anyhow::bail!(
                "invalid SMTP_ENCRYPTION value: {other}. Use 'tls', 'starttls', or 'none'"
            ),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub pass: String,
    pub encryption: SmtpEncryption,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    /// None disables SMTP; outbound mail is logged instead of sent.
    pub smtp: Option<SmtpConfig>,
    pub from_name: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub app_name: String,
    pub app_env: AppEnv,
    pub debug: bool,
    pub client_url: String,
    pub cors_allowed_origins: Vec<String>,
    pub database_url: String,
    pub redis_url: String,
    pub access_token: TokenConfig,
    pub refresh_token: TokenConfig,
    pub mail: MailConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let app_name = std::env::var("APP_NAME").unwrap_or_else(|_| "gatekit".into());
        let app_env = AppEnv::parse(
            &std::env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
        );
        let debug = std::env::var("APP_DEBUG")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);
        let client_url = std::env::var("CLIENT_URL")
            .unwrap_or_else(|_| "http://localhost:3000".into());
        let cors_allowed_origins = parse_origins(
            &std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default(),
        );

        let database_url = required("DATABASE_URL")?;
        let redis_url = required("REDIS_URL")?;

        let access_token = TokenConfig {
            private_key: required("ACCESS_TOKEN_PRIVATE_KEY")?,
            public_key: required("ACCESS_TOKEN_PUBLIC_KEY")?,
            max_age_minutes: minutes("ACCESS_TOKEN_MAX_AGE", 15),
        };
        let refresh_token = TokenConfig {
            private_key: required("REFRESH_TOKEN_PRIVATE_KEY")?,
            public_key: required("REFRESH_TOKEN_PUBLIC_KEY")?,
            max_age_minutes: minutes("REFRESH_TOKEN_MAX_AGE", 60),
        };

        let smtp = match std::env::var("SMTP_HOST") {
            Ok(host) => Some(SmtpConfig {
                host,
                port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|v| v.parse::<u16>().ok())
                    .unwrap_or(587),
                user: std::env::var("SMTP_USER").unwrap_or_default(),
                pass: std::env::var("SMTP_PASS").unwrap_or_default(),
                encryption: SmtpEncryption::parse(
                    &std::env::var("SMTP_ENCRYPTION").unwrap_or_else(|_| "starttls".into()),
                )?,
            }),
            Err(_) => None,
        };
        let mail = MailConfig {
            smtp,
            from_name: std::env::var("MAIL_FROM_NAME").unwrap_or_else(|_| app_name.clone()),
            from_address: std::env::var("MAIL_FROM_ADDRESS")
                .unwrap_or_else(|_| "no-reply@localhost".into()),
        };

        Ok(Self {
            app_name,
            app_env,
            debug,
            client_url,
            cors_allowed_origins,
            database_url,
            redis_url,
            access_token,
            refresh_token,
            mail,
        })
    }
}

fn required(name: &str) -> anyhow::Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{name} must be set"))
}

fn minutes(name: &str, default: i64) -> i64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(default)
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_env_parses_known_values() {
        assert_eq!(AppEnv::parse("production"), AppEnv::Production);
        assert_eq!(AppEnv::parse("prod"), AppEnv::Production);
        assert_eq!(AppEnv::parse("development"), AppEnv::Development);
        assert_eq!(AppEnv::parse("anything-else"), AppEnv::Development);
    }

    #[test]
    fn smtp_encryption_parses_case_insensitively() {
        assert_eq!(SmtpEncryption::parse("TLS").unwrap(), SmtpEncryption::Tls);
        assert_eq!(
            SmtpEncryption::parse("starttls").unwrap(),
            SmtpEncryption::StartTls
        );
        assert_eq!(SmtpEncryption::parse("none").unwrap(), SmtpEncryption::None);
        assert!(SmtpEncryption::parse("ssl3").is_err());
    }

    #[test]
    fn parse_origins_splits_and_trims() {
        let origins = parse_origins("http://a.test, http://b.test ,");
        assert_eq!(origins, vec!["http://a.test", "http://b.test"]);
        assert!(parse_origins("").is_empty());
    }
}
