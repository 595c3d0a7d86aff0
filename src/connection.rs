use crate::config::ClientConfig;
use crate::error::{ClientError, CloseErrors, Result, Warning};
use crate::metadata::SystemCatalog;
use crate::prepared::PreparedStatement;
use crate::protocol::{HttpQueryService, QueryService, SubmitOptions};
use crate::statement::{Statement, StatementInner};
use crate::version::ProductVersion;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_DATAVERSE: &str = "Default";

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

pub(crate) struct ConnectionInner {
    service: Arc<dyn QueryService>,
    closed: AtomicBool,
    statements: Mutex<HashMap<u64, Arc<StatementInner>>>,
    next_statement_id: AtomicU64,
    warnings: Mutex<Vec<Warning>>,
    dataverse: Mutex<String>,
    sql_compat: bool,
    server_version: ProductVersion,
    catalog: OnceLock<SystemCatalog>,
}

impl ConnectionInner {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn submit_options(&self) -> SubmitOptions {
        SubmitOptions {
            dataverse: Some(lock(&self.dataverse).clone()),
            sql_compat: self.sql_compat,
            ..SubmitOptions::default()
        }
    }

    pub(crate) fn statement_closed(&self, statement_id: u64) {
        lock(&self.statements).remove(&statement_id);
    }

    fn new_statement(self: &Arc<Self>) -> Statement {
        let id = self.next_statement_id.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::new(StatementInner::new(id, Arc::downgrade(self), Arc::clone(&self.service)));
        lock(&self.statements).insert(id, Arc::clone(&inner));
        debug!("statement {} created", id);
        Statement::from_inner(inner)
    }

    fn close_statements_and_service(&self) -> Result<()> {
        let mut errors = CloseErrors::new();
        let statements: Vec<Arc<StatementInner>> = lock(&self.statements).drain().map(|(_, s)| s).collect();
        for statement in statements {
            errors.record(statement.close(false));
        }
        errors.record(self.service.close());
        debug!("connection closed");
        errors.into_result()
    }
}

/// A session with one query service.
///
/// Owns its statements, which own their cursors. Dropping the connection
/// closes it.
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl Connection {
    /// Connect over HTTP using `config`.
    pub fn open(config: ClientConfig) -> Result<Self> {
        let service = HttpQueryService::new(&config)?;
        Self::with_service(Arc::new(service), &config)
    }

    /// Connect through an arbitrary transport.
    pub fn with_service(service: Arc<dyn QueryService>, config: &ClientConfig) -> Result<Self> {
        let server = service.connect()?;
        let server_version = ProductVersion::parse(server.as_deref());
        let warnings = config
            .unsupported
            .iter()
            .map(|name| Warning {
                code: 0,
                message: format!("Unsupported parameter {}", name),
            })
            .collect();
        let dataverse = config
            .dataverse
            .clone()
            .filter(|d| !d.is_empty())
            .unwrap_or_else(|| DEFAULT_DATAVERSE.to_string());
        debug!("connection to {} ready", server_version);

        Ok(Self {
            inner: Arc::new(ConnectionInner {
                service,
                closed: AtomicBool::new(false),
                statements: Mutex::new(HashMap::new()),
                next_statement_id: AtomicU64::new(1),
                warnings: Mutex::new(warnings),
                dataverse: Mutex::new(dataverse),
                sql_compat: config.sql_compat,
                server_version,
                catalog: OnceLock::new(),
            }),
        })
    }

    fn check_open(&self) -> Result<()> {
        if self.inner.is_closed() {
            return Err(ClientError::Closed { object: "connection" });
        }
        Ok(())
    }

    pub fn create_statement(&self) -> Result<Statement> {
        self.check_open()?;
        Ok(self.inner.new_statement())
    }

    /// Compile `sql` on the server to learn its parameters.
    pub fn prepare_statement(&self, sql: &str) -> Result<PreparedStatement> {
        self.check_open()?;
        let statement = self.inner.new_statement();
        match statement.compile(sql).and_then(|r| r.parameter_count()) {
            Ok(count) => Ok(PreparedStatement::new(statement, sql, count)),
            Err(e) => {
                if let Err(close_err) = statement.close() {
                    debug!("failed to close statement after compile error: {}", close_err);
                }
                Err(e)
            }
        }
    }

    /// System metadata helper, created on first use.
    pub fn metadata(&self) -> Result<&SystemCatalog> {
        self.check_open()?;
        Ok(self
            .inner
            .catalog
            .get_or_init(|| SystemCatalog::new(self.inner.new_statement(), self.inner.server_version.clone())))
    }

    pub fn server_version(&self) -> &ProductVersion {
        &self.inner.server_version
    }

    /// Namespace each statement runs in.
    pub fn dataverse(&self) -> Result<String> {
        self.check_open()?;
        Ok(lock(&self.inner.dataverse).clone())
    }

    pub fn set_dataverse(&self, dataverse: &str) -> Result<()> {
        self.check_open()?;
        if dataverse.is_empty() {
            return Err(ClientError::InvalidValue {
                parameter: "dataverse".to_string(),
            });
        }
        *lock(&self.inner.dataverse) = dataverse.to_string();
        Ok(())
    }

    /// Liveness probe; never fails, a closed connection is simply not valid.
    pub fn is_valid(&self, timeout: Duration) -> bool {
        !self.inner.is_closed() && self.inner.service.ping(timeout)
    }

    /// Warnings recorded while connecting, oldest first.
    pub fn warnings(&self) -> Result<Vec<Warning>> {
        self.check_open()?;
        Ok(lock(&self.inner.warnings).clone())
    }

    pub fn clear_warnings(&self) -> Result<()> {
        self.check_open()?;
        lock(&self.inner.warnings).clear();
        Ok(())
    }

    /// Close every statement, then the transport. Repeated calls do nothing.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.inner.close_statements_and_service()
    }

    /// Mark the connection closed now and hand the teardown to `executor`.
    /// Failures during the teardown are logged, since no caller is left to see them.
    pub fn close_deferred<E>(&self, executor: E)
    where
        E: FnOnce(Box<dyn FnOnce() + Send>),
    {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let inner = Arc::clone(&self.inner);
        executor(Box::new(move || {
            if let Err(e) = inner.close_statements_and_service() {
                warn!("deferred connection close failed: {}", e);
            }
        }));
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("server_version", &self.inner.server_version)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("failed to close connection: {}", e);
        }
    }
}
