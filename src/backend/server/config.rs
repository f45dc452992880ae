/**
 * Server Configuration
 *
 * Configuration is loaded once from environment variables with development
 * defaults. The database is optional: when `DATABASE_URL` is absent or the
 * connection fails, the server runs on in-memory stores instead of
 * refusing to start.
 */
use sqlx::PgPool;
use std::path::PathBuf;
use std::time::Duration;

/// Typed server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// TCP port for the HTTP listener
    pub port: u16,
    /// PostgreSQL connection string, if persistence is configured
    pub database_url: Option<String>,
    /// History page size for `page` and `load` pushes
    pub chunk_size: u32,
    /// Directory holding attachment blobs
    pub upload_dir: PathBuf,
    /// Inactivity threshold for cookie-backed auth sessions
    pub auth_session_ttl: Duration,
    /// How often the auth-session reaper sweeps
    pub reaper_interval: Duration,
}

impl ServerConfig {
    /// Read the configuration from the environment
    pub fn from_env() -> Self {
        Self {
            port: env_parsed("SERVER_PORT", 3000),
            database_url: std::env::var("DATABASE_URL").ok(),
            chunk_size: env_parsed("LOADING_MESSAGES_CHUNK_SIZE", 20),
            upload_dir: PathBuf::from(
                std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string()),
            ),
            auth_session_ttl: Duration::from_secs(env_parsed("AUTH_SESSION_TTL_SECS", 3600)),
            reaper_interval: Duration::from_secs(env_parsed("SESSION_REAPER_INTERVAL_SECS", 3600)),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            database_url: None,
            chunk_size: 20,
            upload_dir: PathBuf::from("uploads"),
            auth_session_ttl: Duration::from_secs(3600),
            reaper_interval: Duration::from_secs(3600),
        }
    }
}

fn env_parsed<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

/// Connect the database pool and run migrations
///
/// Errors are logged but never prevent startup; the caller falls back to
/// in-memory stores on `None`.
pub async fn load_database(config: &ServerConfig) -> Option<PgPool> {
    let database_url = match &config.database_url {
        Some(url) => url,
        None => {
            tracing::warn!("DATABASE_URL not set, running on in-memory stores");
            return None;
        }
    };

    tracing::info!("Connecting to database...");
    let pool = match PgPool::connect(database_url).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to create database connection pool: {:?}", e);
            tracing::warn!("Falling back to in-memory stores");
            return None;
        }
    };

    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("Database migrations completed"),
        Err(e) => {
            // Migrations may already be applied by an operator
            tracing::error!("Failed to run database migrations: {:?}", e);
            tracing::warn!("Continuing without migrations");
        }
    }

    Some(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.port, 3000);
        assert_eq!(config.chunk_size, 20);
        assert!(config.database_url.is_none());
    }
}
