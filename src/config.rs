use std::env;

/// Placeholder shipped in `.env.example`. Accepted outside production only.
pub const DEFAULT_SUPER_ADMIN_KEY: &str = "change_this_super_admin_key";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_refresh_secret: String,
    pub jwt_expiry_seconds: u64,
    pub jwt_refresh_expiry_days: u64,
    pub host: String,
    pub port: u16,
    pub super_admin_key: String,
    pub app_base_url: String,
    /// `production` hides internal error messages from API responses.
    pub app_env: String,
    pub slot_interval_minutes: u32,
    pub trial_days: i64,
    // SMTP (optional)
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let slot_interval_minutes: u32 = env::var("SLOT_INTERVAL_MINUTES")
            .unwrap_or_else(|_| "30".into())
            .parse()?;
        if slot_interval_minutes == 0 || slot_interval_minutes > 240 {
            anyhow::bail!("SLOT_INTERVAL_MINUTES must be between 1 and 240");
        }

        let config = Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: required("JWT_SECRET")?,
            jwt_refresh_secret: required("JWT_REFRESH_SECRET")?,
            jwt_expiry_seconds: env::var("JWT_EXPIRY_SECONDS")
                .unwrap_or_else(|_| "900".into())
                .parse()?,
            jwt_refresh_expiry_days: env::var("JWT_REFRESH_EXPIRY_DAYS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            super_admin_key: env::var("SUPER_ADMIN_KEY")
                .unwrap_or_else(|_| DEFAULT_SUPER_ADMIN_KEY.into()),
            app_base_url: env::var("APP_BASE_URL")
                .unwrap_or_else(|_| "http://localhost".into()),
            app_env: env::var("APP_ENV").unwrap_or_else(|_| "development".into()),
            slot_interval_minutes,
            trial_days: env::var("TRIAL_DAYS")
                .unwrap_or_else(|_| "30".into())
                .parse()?,
            smtp_host: env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_username: env::var("SMTP_USERNAME").ok().filter(|s| !s.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
            smtp_from: env::var("SMTP_FROM").ok().filter(|s| !s.is_empty()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Startup checks that depend on more than one variable.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.is_production() && !self.super_admin_key_is_set() {
            anyhow::bail!("SUPER_ADMIN_KEY must be set to a non-default value in production");
        }
        Ok(())
    }

    /// False for an empty key, and for the placeholder in production.
    pub fn super_admin_key_is_set(&self) -> bool {
        let key = self.super_admin_key.trim();
        !key.is_empty() && !(self.is_production() && key == DEFAULT_SUPER_ADMIN_KEY)
    }

    pub fn is_production(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("production")
    }

    /// Builds `https://{slug}.{domain}{path}` from `app_base_url`.
    pub fn tenant_url(&self, slug: &str, path: &str) -> String {
        let base = &self.app_base_url;
        if let Some(idx) = base.find("://") {
            let scheme = &base[..idx + 3];
            let rest = &base[idx + 3..];
            let domain = rest.split('/').next().unwrap_or(rest);
            format!("{scheme}{slug}.{domain}{path}")
        } else {
            format!("https://{slug}.{base}{path}")
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database_url: "postgres://localhost/barbershop_test".into(),
        redis_url: "redis://127.0.0.1:6379".into(),
        jwt_secret: "test-secret".into(),
        jwt_refresh_secret: "test-refresh-secret".into(),
        jwt_expiry_seconds: 900,
        jwt_refresh_expiry_days: 30,
        host: "127.0.0.1".into(),
        port: 0,
        super_admin_key: "super".into(),
        app_base_url: "https://barbers.example".into(),
        app_env: "development".into(),
        slot_interval_minutes: 30,
        trial_days: 30,
        smtp_host: None,
        smtp_port: None,
        smtp_username: None,
        smtp_password: None,
        smtp_from: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_url_keeps_scheme_and_port() {
        let mut config = test_config();
        assert_eq!(
            config.tenant_url("fade-club", "/login"),
            "https://fade-club.barbers.example/login"
        );

        config.app_base_url = "http://localhost:3000".into();
        assert_eq!(config.tenant_url("a1", "/"), "http://a1.localhost:3000/");
    }

    #[test]
    fn placeholder_super_admin_key_refused_in_production() {
        let mut config = test_config();
        config.super_admin_key = DEFAULT_SUPER_ADMIN_KEY.into();
        assert!(config.validate().is_ok());
        assert!(config.super_admin_key_is_set());

        config.app_env = "production".into();
        assert!(config.validate().is_err());
        assert!(!config.super_admin_key_is_set());

        config.super_admin_key = "   ".into();
        assert!(config.validate().is_err());

        config.super_admin_key = "k7Qp2vX9rTz4Lm8w".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn production_flag_is_case_insensitive() {
        let mut config = test_config();
        assert!(!config.is_production());
        config.app_env = "Production".into();
        assert!(config.is_production());
    }
}
