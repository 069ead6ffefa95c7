use clap::{Args, ValueEnum};

/// Outbound email transport
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum EmailProvider {
    Resend,
    Smtp,
    None,
}

/// Runtime settings shared by every request handler
#[derive(Args, Clone, Debug)]
pub struct AppConfig {
    #[arg(long, env = "EMAIL_PROVIDER", value_enum, default_value_t = EmailProvider::None)]
    pub email_provider: EmailProvider,
    #[arg(long, env = "EMAIL_FROM", default_value = "Sourcetrack <noreply@sourcetrack.local>")]
    pub email_from: String,
    #[arg(long, env = "RESEND_API_KEY", hide_env_values = true)]
    pub resend_api_key: Option<String>,
    #[arg(long, env = "SESSION_TTL_HOURS", default_value_t = 168)]
    pub session_ttl_hours: i64,
    #[arg(long, env = "SECURE_COOKIES", default_value_t = false)]
    pub secure_cookies: bool,
    #[arg(long, env = "BCRYPT_COST", default_value_t = bcrypt::DEFAULT_COST)]
    pub bcrypt_cost: u32,
    #[arg(long, env = "LOGIN_MAX_ATTEMPTS", default_value_t = 5)]
    pub login_max_attempts: u32,
    #[arg(long, env = "LOGIN_WINDOW_SECS", default_value_t = 900)]
    pub login_window_secs: u64,
    #[arg(long, env = "LOGIN_LOCKOUT_SECS", default_value_t = 900)]
    pub login_lockout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            email_provider: EmailProvider::None,
            email_from: "Sourcetrack <noreply@sourcetrack.local>".to_string(),
            resend_api_key: None,
            session_ttl_hours: 168,
            secure_cookies: false,
            bcrypt_cost: bcrypt::DEFAULT_COST,
            login_max_attempts: 5,
            login_window_secs: 900,
            login_lockout_secs: 900,
        }
    }
}
