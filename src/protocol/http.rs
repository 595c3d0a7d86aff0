use super::{QueryResponse, QueryService, ResponseStatus, SubmitOptions};
use crate::codec::{Param, encode_params};
use crate::config::{ClientConfig, TransientPolicy};
use crate::error::{ClientError, Result};
use crate::stream::{ArrayStream, RowStream};
use reqwest::Method;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, SERVER};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::debug;
use url::Url;
use uuid::Uuid;

const QUERY_SERVICE_PATH: &str = "/query/service";
const QUERY_RESULT_PATH: &str = "/query/service/result";
const LOSSLESS_ADM_JSON: &str = "application/json; lossless-adm=true";
const RESULTS_FIELD: &str = "results";
const CLIENT_CONTEXT_ID: &str = "client_context_id";

#[derive(Serialize)]
struct StatementRequest<'a> {
    #[serde(rename = "client-type")]
    client_type: &'static str,
    mode: &'static str,
    statement: &'a str,
    signature: bool,
    #[serde(rename = "plan-format")]
    plan_format: &'static str,
    #[serde(rename = "max-warnings")]
    max_warnings: u32,
    #[serde(rename = "compile-only", skip_serializing_if = "std::ops::Not::not")]
    compile_only: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    readonly: bool,
    #[serde(rename = "sql-compat", skip_serializing_if = "std::ops::Not::not")]
    sql_compat: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    dataverse: Option<&'a str>,
    client_context_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    args: Vec<serde_json::Value>,
}

/// [`QueryService`] over the server's HTTP API, backed by a pooled blocking client.
pub struct HttpQueryService {
    client: Client,
    query_endpoint: Url,
    result_endpoint: String,
    active_requests_endpoint: Url,
    user: Option<String>,
    password: Option<SecretString>,
    max_warnings: u32,
    policy: TransientPolicy,
    closed: AtomicBool,
}

fn endpoint(config: &ClientConfig, path: &str) -> Result<Url> {
    let raw = format!("{}://{}:{}{}", config.scheme(), config.host, config.port, path);
    Url::parse(&raw).map_err(|_| ClientError::InvalidValue {
        parameter: format!("endpoint {}:{}", config.host, config.port),
    })
}

fn status_line(response: &Response) -> String {
    format!("{:?} {}", response.version(), response.status())
}

impl HttpQueryService {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let query_endpoint = endpoint(config, QUERY_SERVICE_PATH)?;
        let result_endpoint = endpoint(config, QUERY_RESULT_PATH)?;
        let active_requests_endpoint = endpoint(config, &config.active_requests_path)?;

        let max_connections = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .max(16);
        let mut builder = Client::builder()
            .pool_max_idle_per_host(max_connections)
            .timeout(config.socket_timeout);
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        let client = builder.build().map_err(|e| ClientError::Connection {
            message: format!("failed to create HTTP client: {}", e),
            transient: false,
        })?;

        Ok(Self {
            client,
            query_endpoint,
            result_endpoint: result_endpoint.as_str().trim_end_matches('/').to_string(),
            active_requests_endpoint,
            user: config.user.clone(),
            password: config
                .password
                .as_ref()
                .map(|p| SecretString::from(p.expose_secret().to_string())),
            max_warnings: config.max_warnings,
            policy: config.transient_policy,
            closed: AtomicBool::new(false),
        })
    }

    pub fn query_endpoint(&self) -> &Url {
        &self.query_endpoint
    }

    fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ClientError::Closed { object: "transport" });
        }
        let builder = self.client.request(method, url);
        Ok(match &self.user {
            Some(user) => builder.basic_auth(user, self.password.as_ref().map(|p| p.expose_secret())),
            None => builder,
        })
    }

    fn probe(&self, timeout: Option<Duration>) -> Result<Option<String>> {
        let mut request = self.request(Method::OPTIONS, self.query_endpoint.clone())?;
        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        let response = request
            .send()
            .map_err(|e| self.policy.http_error(&e, "failed to reach query service"))?;
        match response.status() {
            status if status.is_success() => Ok(response
                .headers()
                .get(SERVER)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::auth()),
            _ => Err(ClientError::Connection {
                message: status_line(&response),
                transient: false,
            }),
        }
    }

    fn handle_post_response(&self, response: Response) -> Result<QueryResponse> {
        let http_status = response.status();
        match http_status {
            StatusCode::OK
            | StatusCode::BAD_REQUEST
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::SERVICE_UNAVAILABLE => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => return Err(ClientError::auth()),
            _ => return Err(ClientError::protocol(status_line(&response))),
        }
        let line = status_line(&response);
        let body = response
            .bytes()
            .map_err(|e| self.policy.http_error(&e, "failed to read response"))?;
        let parsed: QueryResponse = serde_json::from_slice(&body)
            .map_err(|e| ClientError::protocol(format!("failed to parse response: {}", e)))?;

        if http_status == StatusCode::OK && parsed.status == Some(ResponseStatus::Success) {
            return Ok(parsed);
        }
        if parsed.status == Some(ResponseStatus::Timeout) {
            return Err(ClientError::Timeout {
                message: "statement execution timed out".to_string(),
            });
        }
        Err(parsed.first_error().unwrap_or_else(|| ClientError::protocol(line)))
    }

    fn result_url(&self, response: &QueryResponse) -> Result<Url> {
        let handle = response
            .handle
            .as_deref()
            .ok_or_else(|| ClientError::protocol("response carries no result handle"))?;
        let suffix = handle
            .rfind('/')
            .map(|p| &handle[p..])
            .ok_or_else(|| ClientError::protocol(format!("malformed result handle '{}'", handle)))?;
        Url::parse(&format!("{}{}", self.result_endpoint, suffix))
            .map_err(|_| ClientError::protocol(format!("malformed result handle '{}'", handle)))
    }
}

impl QueryService for HttpQueryService {
    fn connect(&self) -> Result<Option<String>> {
        let version = self.probe(None)?;
        debug!(
            "connected to '{}' at {}",
            version.as_deref().unwrap_or("unknown"),
            self.query_endpoint
        );
        Ok(version)
    }

    fn ping(&self, timeout: Duration) -> bool {
        let timeout = (!timeout.is_zero()).then_some(timeout);
        self.probe(timeout).is_ok()
    }

    fn submit(
        &self,
        sql: &str,
        params: &[Param],
        execution_id: Uuid,
        options: &SubmitOptions,
    ) -> Result<QueryResponse> {
        let body = StatementRequest {
            client_type: "jdbc",
            mode: "deferred",
            statement: sql,
            signature: true,
            plan_format: "string",
            max_warnings: self.max_warnings,
            compile_only: options.compile_only,
            readonly: options.force_read_only,
            sql_compat: options.sql_compat,
            timeout: (options.timeout_secs > 0).then(|| format!("{}s", options.timeout_secs)),
            dataverse: options.dataverse.as_deref(),
            client_context_id: execution_id.to_string(),
            args: encode_params(params)?,
        };

        debug!(
            "{} {{ {} }} with {} args",
            if options.compile_only { "compile" } else { "execute" },
            sql,
            params.len()
        );

        let response = self
            .request(Method::POST, self.query_endpoint.clone())?
            .header(ACCEPT, LOSSLESS_ADM_JSON)
            .json(&body)
            .send()
            .map_err(|e| self.policy.http_error(&e, "failed to submit statement"))?;
        self.handle_post_response(response)
    }

    fn fetch_result(&self, response: &QueryResponse) -> Result<RowStream> {
        let url = self.result_url(response)?;
        let http_response = self
            .request(Method::GET, url)?
            .header(ACCEPT, "application/json")
            .send()
            .map_err(|e| self.policy.http_error(&e, "failed to fetch result"))?;
        if http_response.status() != StatusCode::OK {
            return Err(ClientError::protocol(format!(
                "no result available: {}",
                status_line(&http_response)
            )));
        }
        let reader: Box<dyn BufRead + Send> = Box::new(BufReader::new(http_response));
        ArrayStream::locate(reader, RESULTS_FIELD, self.policy)
    }

    fn cancel(&self, execution_id: Uuid) -> Result<()> {
        let mut url = self.active_requests_endpoint.clone();
        url.query_pairs_mut()
            .append_pair(CLIENT_CONTEXT_ID, &execution_id.to_string());
        debug!("cancel {}", execution_id);
        let response = self
            .request(Method::DELETE, url)?
            .send()
            .map_err(|e| self.policy.http_error(&e, "failed to cancel statement"))?;
        match response.status() {
            StatusCode::OK | StatusCode::NOT_FOUND => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ClientError::auth()),
            _ => Err(ClientError::protocol(status_line(&response))),
        }
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
