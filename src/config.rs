use std::env;

/// SMTP settings for the notification sink. Present only when `SMTP_HOST`
/// is configured; otherwise notifications are a silent no-op.
#[derive(Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub server_port: u16,
    pub server_host: String,
    pub jwt_secret: String,
    pub token_ttl_minutes: i64,
    pub smtp: Option<SmtpConfig>,
}

const INSECURE_SECRET: &str = "change-me-in-production";

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            log::warn!("JWT_SECRET not set, using an insecure placeholder secret");
            INSECURE_SECRET.to_string()
        });

        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            redis_url: env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            jwt_secret,
            token_ttl_minutes: env::var("TOKEN_TTL_MINUTES")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .expect("TOKEN_TTL_MINUTES must be a number"),
            smtp: Self::smtp_from_env(),
        }
    }

    fn smtp_from_env() -> Option<SmtpConfig> {
        let host = env::var("SMTP_HOST").ok().filter(|h| !h.is_empty())?;
        Some(SmtpConfig {
            host,
            port: env::var("SMTP_PORT")
                .unwrap_or_else(|_| "587".to_string())
                .parse()
                .expect("SMTP_PORT must be a number"),
            username: env::var("SMTP_USER").ok().filter(|u| !u.is_empty()),
            password: env::var("SMTP_PASS").ok(),
            from: env::var("SMTP_FROM").unwrap_or_else(|_| "no-reply@example.com".to_string()),
        })
    }

    pub fn server_url(&self) -> String {
        format!("http://{}:{}", self.server_host, self.server_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required environment variables
        env::set_var("DATABASE_URL", "postgres://test");
        env::remove_var("SMTP_HOST");

        let config = Config::from_env();

        assert_eq!(config.database_url, "postgres://test");
        assert_eq!(config.server_port, 8080);
        assert_eq!(config.server_host, "127.0.0.1");
        assert_eq!(config.token_ttl_minutes, 30);
        assert!(config.smtp.is_none());

        // Test custom values
        env::set_var("SERVER_PORT", "3000");
        env::set_var("SERVER_HOST", "0.0.0.0");
        env::set_var("TOKEN_TTL_MINUTES", "5");
        env::set_var("SMTP_HOST", "mail.example.com");

        let config = Config::from_env();

        assert_eq!(config.server_port, 3000);
        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.token_ttl_minutes, 5);
        let smtp = config.smtp.expect("smtp block should be present");
        assert_eq!(smtp.host, "mail.example.com");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.from, "no-reply@example.com");

        env::remove_var("SERVER_PORT");
        env::remove_var("SERVER_HOST");
        env::remove_var("TOKEN_TTL_MINUTES");
        env::remove_var("SMTP_HOST");
    }
}
