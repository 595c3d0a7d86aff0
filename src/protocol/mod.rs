//! The query service seam: submission, result retrieval, liveness and cancellation.

mod http;
mod response;

pub use http::HttpQueryService;
pub use response::{
    Plans, QueryResponse, ResponseStatus, ServiceMessage, Signature, StatementCategory,
};

use crate::codec::Param;
use crate::error::Result;
use crate::stream::RowStream;
use std::time::Duration;
use uuid::Uuid;

/// Per-submission switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitOptions {
    pub dataverse: Option<String>,
    /// Whole seconds; zero leaves the server default in place.
    pub timeout_secs: u64,
    pub force_read_only: bool,
    pub compile_only: bool,
    pub sql_compat: bool,
}

/// Transport used by connections. [`HttpQueryService`] talks to a real server.
pub trait QueryService: Send + Sync {
    /// Probe the endpoint and return the server identification, if any.
    fn connect(&self) -> Result<Option<String>>;

    fn ping(&self, timeout: Duration) -> bool;

    fn submit(
        &self,
        sql: &str,
        params: &[Param],
        execution_id: Uuid,
        options: &SubmitOptions,
    ) -> Result<QueryResponse>;

    /// Open the deferred result behind `response.handle`, positioned at the first row.
    fn fetch_result(&self, response: &QueryResponse) -> Result<RowStream>;

    /// Ask the server to stop the execution tagged with `execution_id`.
    /// Unknown or finished executions are not an error.
    fn cancel(&self, execution_id: Uuid) -> Result<()>;

    fn close(&self) -> Result<()>;
}
