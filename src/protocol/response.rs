use crate::codec::Datatype;
use crate::cursor::Column;
use crate::error::{ClientError, Result, Warning};
use serde::{Deserialize, Deserializer};

const OPTIONAL_TYPE_SUFFIX: char = '?';
const EXPLAIN_ONLY_COLUMN: &str = "$1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Running,
    Success,
    Timeout,
    Failed,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementCategory {
    Query,
    Update,
    Ddl,
    Procedure,
}

/// Unknown status values are kept as `None` rather than failing the whole response.
fn lenient_status<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<ResponseStatus>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|s| match s.to_ascii_uppercase().as_str() {
        "RUNNING" => Some(ResponseStatus::Running),
        "SUCCESS" => Some(ResponseStatus::Success),
        "TIMEOUT" => Some(ResponseStatus::Timeout),
        "FAILED" => Some(ResponseStatus::Failed),
        "FATAL" => Some(ResponseStatus::Fatal),
        _ => None,
    }))
}

fn lenient_category<'de, D: Deserializer<'de>>(
    d: D,
) -> std::result::Result<Option<StatementCategory>, D::Error> {
    let raw = Option::<String>::deserialize(d)?;
    Ok(raw.and_then(|s| match s.to_ascii_uppercase().as_str() {
        "QUERY" => Some(StatementCategory::Query),
        "UPDATE" => Some(StatementCategory::Update),
        "DDL" => Some(StatementCategory::Ddl),
        "PROCEDURE" => Some(StatementCategory::Procedure),
        _ => None,
    }))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Plans {
    #[serde(default, rename = "statementCategory", deserialize_with = "lenient_category")]
    pub statement_category: Option<StatementCategory>,
    #[serde(default, rename = "statementParameters")]
    pub statement_parameters: Option<Vec<serde_json::Value>>,
    #[serde(default, rename = "explainOnly")]
    pub explain_only: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub name: Option<Vec<String>>,
    #[serde(default, rename = "type")]
    pub type_name: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceMessage {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub msg: String,
}

/// Body of one statement submission.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: Option<ResponseStatus>,
    #[serde(default)]
    pub plans: Option<Plans>,
    #[serde(default)]
    pub signature: Option<Signature>,
    #[serde(default)]
    pub handle: Option<String>,
    /// Only populated for explain-only statements.
    #[serde(default)]
    pub results: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub errors: Option<Vec<ServiceMessage>>,
    #[serde(default)]
    pub warnings: Option<Vec<ServiceMessage>>,
}

impl QueryResponse {
    pub fn category(&self) -> Option<StatementCategory> {
        self.plans.as_ref().and_then(|p| p.statement_category)
    }

    pub fn is_category(&self, category: StatementCategory) -> bool {
        self.category() == Some(category)
    }

    pub fn is_explain_only(&self) -> bool {
        self.plans.as_ref().and_then(|p| p.explain_only) == Some(true)
    }

    pub fn update_count(&self) -> i64 {
        if self.is_category(StatementCategory::Update) { 1 } else { 0 }
    }

    /// Highest positional parameter referenced by the statement.
    pub fn parameter_count(&self) -> Result<usize> {
        let plans = self
            .plans
            .as_ref()
            .ok_or_else(|| ClientError::protocol("compile response carries no plans"))?;
        let Some(params) = plans.statement_parameters.as_ref() else {
            return Ok(0);
        };
        let mut count = 0usize;
        for param in params {
            let pos = param
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| ClientError::InvalidValue {
                    parameter: format!("statement parameter {}", param),
                })?;
            count = count.max(pos);
        }
        Ok(count)
    }

    pub fn columns(&self) -> Result<Vec<Column>> {
        if self.is_explain_only() {
            return Ok(vec![Column::new(EXPLAIN_ONLY_COLUMN, Datatype::String, false)]);
        }
        let signature = self
            .signature
            .as_ref()
            .ok_or_else(|| ClientError::protocol("response carries no signature"))?;
        let (Some(names), Some(types)) = (signature.name.as_ref(), signature.type_name.as_ref()) else {
            return Err(ClientError::protocol("bad result signature"));
        };
        if names.is_empty() || names.len() != types.len() {
            return Err(ClientError::protocol("bad result signature"));
        }
        names
            .iter()
            .zip(types)
            .map(|(name, type_name)| {
                let nullable = type_name.ends_with(OPTIONAL_TYPE_SUFFIX);
                let datatype = Datatype::from_type_name(type_name).ok_or_else(|| {
                    ClientError::protocol(format!("bad result signature: unknown type '{}'", type_name))
                })?;
                Ok(Column::new(name, datatype, nullable))
            })
            .collect()
    }

    /// Plan text of an explain-only response, one entry per line.
    pub fn explain_lines(&self) -> Result<Vec<String>> {
        let text = self
            .results
            .as_ref()
            .and_then(|r| r.first())
            .and_then(|v| v.as_str())
            .ok_or_else(|| ClientError::protocol("explain response carries no plan text"))?;
        Ok(text.lines().map(str::to_string).collect())
    }

    pub fn first_error(&self) -> Option<ClientError> {
        self.errors
            .as_ref()
            .and_then(|e| e.first())
            .map(|e| ClientError::Statement {
                code: e.code,
                message: e.msg.clone(),
            })
    }

    pub fn warnings(&self) -> Vec<Warning> {
        self.warnings
            .iter()
            .flatten()
            .map(|w| Warning {
                code: w.code,
                message: w.msg.clone(),
            })
            .collect()
    }
}
