use crate::config::Credentials;
use crate::io_struct::{FlatRecord, ViewDescriptor};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::header::ACCEPT;
use serde_json::Value;

const LOGGED_BODY_CHARS: usize = 1000;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("record {index} is not a JSON object")]
    NotAnObject { index: usize },
}

/// Raw result of one OData read.
///
/// `Failed` is never surfaced to the caller as an error; it keeps "no rows matched" and
/// "the read went wrong" apart for logging.
#[derive(Debug)]
pub enum FetchOutcome {
    Rows(Vec<Value>),
    Failed(String),
}

impl FetchOutcome {
    pub fn into_rows(self) -> Vec<Value> {
        match self {
            FetchOutcome::Rows(rows) => rows,
            FetchOutcome::Failed(_) => Vec::new(),
        }
    }
}

/// Where the aggregator gets flattened rows for one view descriptor.
#[async_trait]
pub trait ViewSource: Send + Sync {
    async fn fetch(&self, descriptor: &ViewDescriptor) -> Result<Vec<FlatRecord>, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ODataFetcher {
    client: reqwest::Client,
    base_url: String,
    credentials: Credentials,
}

impl ODataFetcher {
    pub fn new(client: reqwest::Client, base_url: &str, credentials: Credentials) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            credentials,
        }
    }

    pub fn view_url(&self, view: &str, entity: &str, filter: &str) -> String {
        if filter.is_empty() {
            format!("{}/{}/{}", self.base_url, view, entity)
        } else {
            format!("{}/{}/{}?{}", self.base_url, view, entity, filter)
        }
    }

    pub async fn fetch_view(&self, view: &str, entity: &str, filter: &str) -> FetchOutcome {
        let url = self.view_url(view, entity, filter);
        info!("OData GET {}", url);

        let resp = match self
            .client
            .get(&url)
            .basic_auth(&self.credentials.sap_user, Some(&self.credentials.sap_password))
            .header(ACCEPT, "application/json")
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return FetchOutcome::Failed(format!("request failed: {}", e)),
        };

        let status = resp.status();
        info!("OData status {} for {}/{}", status.as_u16(), view, entity);

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return FetchOutcome::Failed(format!("failed to read body: {}", e)),
        };
        debug!(
            "OData raw body: {}",
            body.chars().take(LOGGED_BODY_CHARS).collect::<String>()
        );

        if !status.is_success() {
            return FetchOutcome::Failed(format!("HTTP status {}", status.as_u16()));
        }

        match serde_json::from_str::<Value>(&body) {
            Ok(envelope) => match results_from_envelope(envelope) {
                Ok(rows) => FetchOutcome::Rows(rows),
                Err(reason) => FetchOutcome::Failed(reason),
            },
            Err(e) => FetchOutcome::Failed(format!("body is not JSON: {}", e)),
        }
    }
}

#[async_trait]
impl ViewSource for ODataFetcher {
    async fn fetch(&self, descriptor: &ViewDescriptor) -> Result<Vec<FlatRecord>, FetchError> {
        let outcome = self
            .fetch_view(&descriptor.view, &descriptor.entity, &descriptor.filter)
            .await;
        if let FetchOutcome::Failed(reason) = &outcome {
            warn!(
                "OData read for {}/{} failed, returning no rows: {}",
                descriptor.view, descriptor.entity, reason
            );
        }
        let rows = flatten_rows(outcome.into_rows())?;
        debug!("{} rows for view {}: {:?}", rows.len(), descriptor.view, rows);
        Ok(rows)
    }
}

/// `d.results` of an OData V2 envelope. A missing level yields no rows; a `results` that is
/// not an array is an error.
pub fn results_from_envelope(envelope: Value) -> Result<Vec<Value>, String> {
    let Value::Object(mut envelope) = envelope else {
        return Ok(Vec::new());
    };
    let Some(Value::Object(mut d)) = envelope.remove("d") else {
        return Ok(Vec::new());
    };
    match d.remove("results") {
        Some(Value::Array(rows)) => Ok(rows),
        None => Ok(Vec::new()),
        Some(other) => Err(format!(
            "d.results is {}, expected an array",
            json_type_name(&other)
        )),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Collapse one level of nested objects into `parent/child` keys.
pub fn flatten_record(record: FlatRecord) -> FlatRecord {
    let mut flat = FlatRecord::new();
    for (key, value) in record {
        match value {
            Value::Object(nested) => {
                for (sub_key, sub_value) in nested {
                    flat.insert(format!("{}/{}", key, sub_key), sub_value);
                }
            }
            other => {
                flat.insert(key, other);
            }
        }
    }
    flat
}

pub fn flatten_rows(rows: Vec<Value>) -> Result<Vec<FlatRecord>, FetchError> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| match row {
            Value::Object(record) => Ok(flatten_record(record)),
            _ => Err(FetchError::NotAnObject { index }),
        })
        .collect()
}
