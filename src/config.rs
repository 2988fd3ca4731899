use tracing::info;

/// The break-glass admin identity: a configured credential/token triple
/// that resolves independently of either store, so an operator can always
/// reach the admin surface while both stores are down or empty. Override
/// every field in any real deployment.
#[derive(Debug, Clone)]
pub struct BreakGlass {
    pub admin_id: String,
    pub secret: String,
    pub token: String,
    pub name: String,
}

pub const BREAK_GLASS_ID_VAR: &str = "CAMPUSD_BREAK_GLASS_ID";
pub const BREAK_GLASS_SECRET_VAR: &str = "CAMPUSD_BREAK_GLASS_SECRET";
pub const BREAK_GLASS_TOKEN_VAR: &str = "CAMPUSD_BREAK_GLASS_TOKEN";
pub const BREAK_GLASS_NAME_VAR: &str = "CAMPUSD_BREAK_GLASS_NAME";

const DEFAULT_BREAK_GLASS_ID: &str = "campus-root";
const DEFAULT_BREAK_GLASS_SECRET: &str = "campus-root-secret";
const DEFAULT_BREAK_GLASS_TOKEN: &str = "campus-root-token";
const DEFAULT_BREAK_GLASS_NAME: &str = "Portal Administrator";

/// Synthetic account id reported for the break-glass identity.
pub const BREAK_GLASS_ACCOUNT_ID: &str = "break-glass-admin";

#[derive(Debug, Clone)]
pub struct Config {
    pub break_glass: BreakGlass,
}

impl Config {
    /// Read once at startup; handlers receive the resulting value.
    pub fn from_env() -> Config {
        let break_glass = BreakGlass {
            admin_id: env_or(BREAK_GLASS_ID_VAR, DEFAULT_BREAK_GLASS_ID),
            secret: env_or(BREAK_GLASS_SECRET_VAR, DEFAULT_BREAK_GLASS_SECRET),
            token: env_or(BREAK_GLASS_TOKEN_VAR, DEFAULT_BREAK_GLASS_TOKEN),
            name: env_or(BREAK_GLASS_NAME_VAR, DEFAULT_BREAK_GLASS_NAME),
        };
        if break_glass.secret == DEFAULT_BREAK_GLASS_SECRET {
            info!("break-glass credential is running on its default value");
        }
        Config { break_glass }
    }
}

fn env_or(var: &str, fallback: &str) -> String {
    match std::env::var(var) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => fallback.to_string(),
    }
}
