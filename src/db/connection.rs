use anyhow::{Context, Result};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use tracing::{debug, info};

/// Mask password in database URL for display
pub fn mask_url_password(url: &str) -> String {
    let Some((protocol, rest)) = url.split_once("://") else {
        return url.to_string();
    };

    // Check if there's user info (user:pass@host or user@host)
    if let Some(at_pos) = rest.find('@') {
        let user_info = &rest[..at_pos];
        let host_and_path = &rest[at_pos + 1..];

        if let Some((username, _)) = user_info.split_once(':') {
            return format!("{}://{}:***@{}", protocol, username, host_and_path);
        }
    }

    url.to_string()
}

/// Database connection configuration
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Maximum number of retries for database connections
    pub max_retries: u32,
    /// Delay between connection retries
    pub retry_delay: Duration,
    /// Upper bound on pooled connections per database
    pub max_connections: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retry_delay: Duration::from_millis(200),
            max_connections: 4,
        }
    }
}

/// Create a pool without connecting; the first query opens the connection.
///
/// Commands that may fail before touching the database (unknown module, cyclic
/// dependencies) use this so they never need a reachable server.
pub fn connect_lazy(url: &str, config: &ConnectionConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(url)
        .with_context(|| format!("Invalid database URL {}", mask_url_password(url)))
}

/// Connect to database with retry logic
///
/// Handles transient connection problems such as a tenant database that is
/// still starting up.
pub async fn connect_with_retry(url: &str, label: &str, config: &ConnectionConfig) -> Result<PgPool> {
    let mut last_error = None;

    for attempt in 0..=config.max_retries {
        match PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(url)
            .await
        {
            Ok(pool) => {
                if attempt > 0 {
                    info!(
                        "Connected to {} (after {} retry{})",
                        label,
                        attempt,
                        if attempt == 1 { "" } else { "ies" }
                    );
                } else {
                    debug!("Connected to {}", label);
                }
                return Ok(pool);
            }
            Err(e) => {
                last_error = Some(e);
                if attempt < config.max_retries {
                    debug!("{} not ready, retrying...", label);
                    tokio::time::sleep(config.retry_delay).await;
                }
            }
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "unknown error".to_string());
    Err(anyhow::anyhow!(
        "Failed to connect to {} at {} after {} attempts: {}",
        label,
        mask_url_password(url),
        config.max_retries + 1,
        reason
    ))
}
