//! Blocking client engine for the AsterixDB query service.
//!
//! A [`Connection`] owns [`Statement`]s which own [`Cursor`]s. Closing an owner
//! closes everything beneath it.

pub mod codec;
pub mod coerce;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod error;
pub mod masking;
pub mod metadata;
pub mod prepared;
pub mod protocol;
pub mod statement;
pub mod stream;
pub mod version;

pub use codec::{Datatype, Param, Value};
pub use coerce::Decimal;
pub use config::{ClientConfig, TransientPolicy};
pub use connection::Connection;
pub use cursor::{Column, Cursor};
pub use error::{ClientError, ErrorKind, Result, Warning};
pub use metadata::SystemCatalog;
pub use prepared::PreparedStatement;
pub use protocol::{HttpQueryService, QueryResponse, QueryService, StatementCategory, SubmitOptions};
pub use statement::{ExecutionContext, Statement};
pub use version::ProductVersion;
