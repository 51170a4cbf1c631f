use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub pass: Option<String>,
    pub from_email: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FoodApiConfig {
    pub search_url: String,
    pub product_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    /// Public base URL used when building verification / reset links.
    pub base_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub food_api: FoodApiConfig,
    pub email_verification_ttl_hours: i64,
    pub password_reset_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let base_url =
            std::env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".into());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "nutrilog".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "nutrilog-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "localhost".into()),
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            user: std::env::var("SMTP_USER").ok(),
            pass: std::env::var("SMTP_PASS").ok(),
            from_email: std::env::var("SMTP_FROM_EMAIL")
                .unwrap_or_else(|_| "noreply@nutrilog.local".into()),
            from_name: std::env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Nutrilog".into()),
        };
        let food_api = FoodApiConfig {
            search_url: std::env::var("FOOD_API_SEARCH_URL")
                .unwrap_or_else(|_| "https://world.openfoodfacts.org/cgi/search.pl".into()),
            product_url: std::env::var("FOOD_API_PRODUCT_URL")
                .unwrap_or_else(|_| "https://world.openfoodfacts.org/api/v0/product".into()),
            timeout_secs: std::env::var("FOOD_API_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(10),
        };
        Ok(Self {
            database_url,
            base_url,
            jwt,
            smtp,
            food_api,
            email_verification_ttl_hours: std::env::var("EMAIL_VERIFICATION_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(48),
            password_reset_ttl_hours: std::env::var("PASSWORD_RESET_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
        })
    }
}
