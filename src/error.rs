use thiserror::Error;

/// Failure category, independent of the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authorization,
    Connection,
    Timeout,
    Protocol,
    Statement,
    ClientUsage,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("auth: {message}")]
    Auth { message: String },

    #[error("connection: {message}")]
    Connection { message: String, transient: bool },

    #[error("timeout: {message}")]
    Timeout { message: String },

    #[error("protocol: {message}")]
    Protocol { message: String },

    #[error("statement: {message} (code {code})")]
    Statement { code: i32, message: String },

    #[error("closed: {object} is closed")]
    Closed { object: &'static str },

    #[error("unsupported type: {type_name}")]
    UnsupportedType { type_name: String },

    #[error("type mismatch: cannot read {actual} column {column} as {requested}")]
    TypeMismatch {
        column: String,
        requested: &'static str,
        actual: String,
    },

    #[error("column not found: {column}")]
    ColumnNotFound { column: String },

    #[error("invalid value: unsupported or invalid value of {parameter}")]
    InvalidValue { parameter: String },

    #[error("usage: invalid statement category")]
    InvalidStatementCategory,

    #[error("usage: no current row")]
    NoCurrentRow,

    #[error("config: {message}")]
    Config { message: String },

    #[error("close: {primary} ({} more)", suppressed.len())]
    Close {
        primary: Box<ClientError>,
        suppressed: Vec<ClientError>,
    },
}

impl ClientError {
    pub fn protocol(message: impl Into<String>) -> Self {
        ClientError::Protocol {
            message: message.into(),
        }
    }

    pub(crate) fn auth() -> Self {
        ClientError::Auth {
            message: "authentication/authorization error".to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Auth { .. } => ErrorKind::Authorization,
            ClientError::Connection { .. } => ErrorKind::Connection,
            ClientError::Timeout { .. } => ErrorKind::Timeout,
            ClientError::Protocol { .. } => ErrorKind::Protocol,
            ClientError::Statement { .. } => ErrorKind::Statement,
            ClientError::Close { primary, .. } => primary.kind(),
            ClientError::Closed { .. }
            | ClientError::UnsupportedType { .. }
            | ClientError::TypeMismatch { .. }
            | ClientError::ColumnNotFound { .. }
            | ClientError::InvalidValue { .. }
            | ClientError::InvalidStatementCategory
            | ClientError::NoCurrentRow
            | ClientError::Config { .. } => ErrorKind::ClientUsage,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, ClientError::Connection { transient: true, .. })
    }

    /// Failures attached behind the primary one when several closes failed.
    pub fn suppressed(&self) -> &[ClientError] {
        match self {
            ClientError::Close { suppressed, .. } => suppressed,
            _ => &[],
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// Collects failures from a best-effort cascade of closes.
#[derive(Debug, Default)]
pub struct CloseErrors {
    errors: Vec<ClientError>,
}

impl CloseErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: Result<()>) {
        if let Err(err) = result {
            self.errors.push(err);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First failure becomes the reported one, the rest ride along as suppressed.
    pub fn into_result(self) -> Result<()> {
        let mut errors = self.errors.into_iter();
        let Some(primary) = errors.next() else {
            return Ok(());
        };
        let suppressed: Vec<ClientError> = errors.collect();
        if suppressed.is_empty() {
            return Err(primary);
        }
        Err(ClientError::Close {
            primary: Box::new(primary),
            suppressed,
        })
    }
}

/// Non-fatal diagnostic reported by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub code: i32,
    pub message: String,
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "warning {}: {}", self.code, self.message)
    }
}
