use tokio_postgres::{Client, Config as PgConfig, NoTls};

use crate::error::SqlMapperError;

/// Parse a connection string (`postgresql://…` URL or `key=value` form; a leading `jdbc:` is
/// tolerated), applying `user`/`password` when they are non-empty.
///
/// # Errors
/// Returns `SqlMapperError::ConfigError` when the string does not parse.
pub fn pg_config(url: &str, user: &str, password: &str) -> Result<PgConfig, SqlMapperError> {
    let url = url.strip_prefix("jdbc:").unwrap_or(url);
    let mut cfg: PgConfig = url
        .parse()
        .map_err(|e| SqlMapperError::ConfigError(format!("invalid postgres url: {e}")))?;
    if !user.is_empty() {
        cfg.user(user);
    }
    if !password.is_empty() {
        cfg.password(password);
    }
    if cfg.get_user().is_none() {
        return Err(SqlMapperError::ConfigError("user is required".to_string()));
    }
    Ok(cfg)
}

/// Open one physical Postgres connection.
///
/// The connection future is driven on its own task for as long as the client lives.
///
/// # Errors
/// Returns `SqlMapperError::ConfigError` for a bad connection string and
/// `SqlMapperError::ConnectionError` when the server cannot be reached.
pub async fn open_connection(
    url: &str,
    user: &str,
    password: &str,
) -> Result<Client, SqlMapperError> {
    let cfg = pg_config(url, user, password)?;
    tracing::debug!(
        hosts = ?cfg.get_hosts(),
        db = ?cfg.get_dbname(),
        user = ?cfg.get_user(),
        "postgres connect start"
    );
    let (client, connection) = cfg.connect(NoTls).await.map_err(|e| {
        SqlMapperError::ConnectionError(format!("Failed to connect to Postgres: {e}"))
    })?;
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "postgres connection terminated");
        }
    });
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_credentials_over_url() {
        let cfg = pg_config("jdbc:postgresql://localhost:5432/atm", "bank", "secret").unwrap();
        assert_eq!(cfg.get_user(), Some("bank"));
        assert_eq!(cfg.get_password(), Some(&b"secret"[..]));
        assert_eq!(cfg.get_dbname(), Some("atm"));
    }

    #[test]
    fn keeps_url_user_when_none_configured() {
        let cfg = pg_config("host=localhost user=teller dbname=atm", "", "").unwrap();
        assert_eq!(cfg.get_user(), Some("teller"));
    }

    #[test]
    fn rejects_garbage_and_missing_user() {
        assert!(matches!(
            pg_config("host=localhost port=not-a-port", "bank", ""),
            Err(SqlMapperError::ConfigError(_))
        ));
        assert!(matches!(
            pg_config("postgresql://localhost/atm", "", ""),
            Err(SqlMapperError::ConfigError(_))
        ));
    }
}
