//! PostgreSQL connection implementation

use async_trait::async_trait;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use sqlbatch_core::{Connection, Result, SqlBatchError, StatementResult, Transaction};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};
use tokio_postgres::{Client, NoTls, Socket};

type SharedClient = Arc<Mutex<Option<Client>>>;

/// TLS negotiation mode, following libpq's `sslmode` names
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    /// Encrypt, but accept any certificate
    Require,
    /// Verify the certificate chain, but not the host name
    VerifyCa,
    /// Verify the certificate chain and the host name
    VerifyFull,
}

impl FromStr for SslMode {
    type Err = SqlBatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "disable" => Ok(Self::Disable),
            "allow" | "prefer" => Ok(Self::Prefer),
            "require" => Ok(Self::Require),
            "verify-ca" | "verify_ca" => Ok(Self::VerifyCa),
            "verify-full" | "verify_full" => Ok(Self::VerifyFull),
            other => Err(SqlBatchError::Configuration(format!(
                "unknown sslmode '{}'",
                other
            ))),
        }
    }
}

impl SslMode {
    fn as_pg(self) -> tokio_postgres::config::SslMode {
        match self {
            Self::Disable => tokio_postgres::config::SslMode::Disable,
            Self::Prefer => tokio_postgres::config::SslMode::Prefer,
            Self::Require | Self::VerifyCa | Self::VerifyFull => {
                tokio_postgres::config::SslMode::Require
            }
        }
    }

    /// Whether the TLS connector accepts invalid certificates and invalid host names
    fn tls_relaxations(self) -> (bool, bool) {
        match self {
            Self::Require => (true, true),
            Self::VerifyCa => (false, true),
            Self::Disable | Self::Prefer | Self::VerifyFull => (false, false),
        }
    }
}

/// Session settings taken from the connection URL
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    pub application_name: Option<String>,
    pub connect_timeout: Option<Duration>,
}

pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let code = db_error.code();
    let mut message = db_error.message().to_string();

    if let Some(detail) = db_error.detail() {
        if !detail.trim().is_empty() {
            message.push_str(&format!(" (detail: {})", detail));
        }
    }

    if let Some(hint) = db_error.hint() {
        if !hint.trim().is_empty() {
            message.push_str(&format!(" (hint: {})", hint));
        }
    }

    match code.code() {
        "23505" => format!("duplicate value violates unique constraint: {}", message),
        "23503" => format!("foreign key violation: {}", message),
        "23502" => format!("null value violates not-null constraint: {}", message),
        "42601" => format!("syntax error: {}", message),
        "42P01" => format!("undefined table: {}", message),
        "28P01" => format!("password authentication failed: {}", message),
        _ => format!("{} (code: {})", message, code.code()),
    }
}

/// Connect with the given TLS connector and drive the connection on a background task
async fn spawn_connection<T>(
    config: &tokio_postgres::Config,
    tls: T,
) -> Result<(Client, JoinHandle<()>)>
where
    T: MakeTlsConnect<Socket> + Send,
    T::Stream: Send + 'static,
    T::TlsConnect: Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let (client, connection) = config.connect(tls).await.map_err(|e| {
        SqlBatchError::Connection(format!(
            "Failed to connect to PostgreSQL: {}",
            format_postgres_error(&e)
        ))
    })?;

    let task = tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!(error = %e, "PostgreSQL connection error");
        }
    });

    Ok((client, task))
}

fn tls_connector(ssl_mode: SslMode) -> Result<MakeTlsConnector> {
    let mut tls_builder = TlsConnector::builder();
    let (accept_invalid_certs, accept_invalid_hostnames) = ssl_mode.tls_relaxations();
    tls_builder.danger_accept_invalid_certs(accept_invalid_certs);
    tls_builder.danger_accept_invalid_hostnames(accept_invalid_hostnames);
    let connector = tls_builder
        .build()
        .map_err(|e| SqlBatchError::Connection(format!("Failed to build TLS connector: {}", e)))?;
    Ok(MakeTlsConnector::new(connector))
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: SharedClient,
    connection_task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl PostgresConnection {
    /// Connect to a PostgreSQL database
    pub async fn connect(
        host: &str,
        port: u16,
        database: &str,
        user: Option<&str>,
        password: Option<&str>,
        ssl_mode: SslMode,
        options: &SessionOptions,
    ) -> Result<Self> {
        tracing::info!(
            host = %host,
            port = %port,
            database = %database,
            ssl_mode = ?ssl_mode,
            application_name = ?options.application_name,
            "connecting to PostgreSQL database"
        );

        let mut config = tokio_postgres::Config::new();
        config
            .host(host)
            .port(port)
            .dbname(database)
            .ssl_mode(ssl_mode.as_pg());
        if let Some(u) = user {
            config.user(u);
        }
        if let Some(p) = password {
            config.password(p);
        }
        if let Some(name) = &options.application_name {
            config.application_name(name);
        }
        if let Some(timeout) = options.connect_timeout {
            config.connect_timeout(timeout);
        }

        let (client, task) = match ssl_mode {
            SslMode::Disable => spawn_connection(&config, NoTls).await?,
            SslMode::Prefer | SslMode::Require | SslMode::VerifyCa | SslMode::VerifyFull => {
                spawn_connection(&config, tls_connector(ssl_mode)?).await?
            }
        };

        tracing::info!(host = %host, port = %port, database = %database, "PostgreSQL connection established");
        Ok(Self {
            client: Arc::new(Mutex::new(Some(client))),
            connection_task: parking_lot::Mutex::new(Some(task)),
        })
    }
}

async fn execute_statement(client: &SharedClient, sql: &str) -> Result<StatementResult> {
    let guard = client.lock().await;
    let client = guard
        .as_ref()
        .ok_or_else(|| SqlBatchError::Connection("PostgreSQL connection is closed".into()))?;

    let rows_affected = client.execute(sql, &[]).await.map_err(|e| {
        SqlBatchError::Query(format!(
            "Failed to execute statement: {}",
            format_postgres_error(&e)
        ))
    })?;
    Ok(StatementResult::new(rows_affected))
}

async fn run_control(client: &SharedClient, command: &str) -> Result<()> {
    let guard = client.lock().await;
    let client = guard
        .as_ref()
        .ok_or_else(|| SqlBatchError::Connection("PostgreSQL connection is closed".into()))?;

    client.batch_execute(command).await.map_err(|e| {
        SqlBatchError::Transaction(format!(
            "Failed to {} transaction: {}",
            command.to_lowercase(),
            format_postgres_error(&e)
        ))
    })
}

#[async_trait]
impl Connection for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgres"
    }

    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        let result = execute_statement(&self.client, sql).await?;
        tracing::debug!(affected_rows = result.affected_rows, "statement executed");
        Ok(result)
    }

    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning PostgreSQL transaction");
        run_control(&self.client, "BEGIN").await?;
        tracing::debug!("PostgreSQL transaction begun successfully");
        Ok(Box::new(PostgresTransaction {
            client: Arc::clone(&self.client),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        let client = self.client.lock().await.take();
        if client.is_none() {
            tracing::debug!("PostgreSQL connection already closed");
            return Ok(());
        }
        tracing::info!("closing PostgreSQL connection");
        // Dropping the last client ends the connection future
        drop(client);

        let task = self.connection_task.lock().take();
        if let Some(task) = task {
            task.await.map_err(|e| {
                SqlBatchError::Connection(format!("PostgreSQL connection task failed: {}", e))
            })?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        match self.client.try_lock() {
            Ok(guard) => guard.is_none(),
            // Somebody is using the client right now, so it is still open
            Err(_) => false,
        }
    }
}

/// PostgreSQL transaction wrapper
pub struct PostgresTransaction {
    client: SharedClient,
    committed: bool,
    rolled_back: bool,
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if self.committed || self.rolled_back {
            return;
        }
        tracing::warn!("PostgreSQL transaction dropped without commit or rollback, auto-rolling back");
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = Arc::clone(&self.client);
        runtime.spawn(async move {
            if let Err(e) = run_control(&client, "ROLLBACK").await {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        });
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn execute(&self, sql: &str) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in PostgreSQL transaction");
        if self.committed || self.rolled_back {
            return Err(SqlBatchError::Transaction("Transaction is no longer active".into()));
        }
        execute_statement(&self.client, sql).await
    }

    async fn commit(&mut self) -> Result<()> {
        tracing::debug!("committing PostgreSQL transaction");

        if self.rolled_back {
            return Err(SqlBatchError::Transaction("Transaction already rolled back".into()));
        }
        if self.committed {
            return Err(SqlBatchError::Transaction("Transaction already committed".into()));
        }

        run_control(&self.client, "COMMIT").await?;

        self.committed = true;
        tracing::debug!("PostgreSQL transaction committed successfully");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        tracing::debug!("rolling back PostgreSQL transaction");

        if self.committed {
            return Err(SqlBatchError::Transaction("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        // Marked before the round trip so a failed rollback is not retried on drop
        self.rolled_back = true;
        run_control(&self.client, "ROLLBACK").await?;

        tracing::debug!("PostgreSQL transaction rolled back successfully");
        Ok(())
    }
}
