use std::collections::BTreeMap;

use tracing::debug;

use super::xmlrpc::{self, Value};
use crate::domain::models::{QueryValue, SearchQuery, SearchResult};
use crate::error::{Result, SubtitleError};
use crate::search::client::RemoteService;

const OPENSUBTITLES_XMLRPC: &str = "http://api.opensubtitles.org/xml-rpc";

/// XML-RPC client for the OpenSubtitles search service.
#[derive(Debug, Clone)]
pub struct OpenSubtitlesRpc {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl OpenSubtitlesRpc {
    pub fn new() -> Self {
        Self::with_endpoint(OPENSUBTITLES_XMLRPC)
    }

    pub fn with_endpoint(endpoint: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    fn call(&self, method: &str, params: &[Value]) -> Result<Value> {
        debug!("XML-RPC call {method}");
        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "text/xml")
            .body(xmlrpc::encode_call(method, params))
            .send()?
            .error_for_status()?;

        xmlrpc::decode_response(&response.text()?)
    }
}

impl Default for OpenSubtitlesRpc {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteService for OpenSubtitlesRpc {
    fn log_in(&self, username: &str, password: &str, locale: &str, agent: &str) -> Result<String> {
        let response = self
            .call(
                "LogIn",
                &[
                    Value::String(username.to_string()),
                    Value::String(password.to_string()),
                    Value::String(locale.to_string()),
                    Value::String(agent.to_string()),
                ],
            )
            .map_err(|e| match e {
                SubtitleError::Protocol(msg) => SubtitleError::Authentication(msg),
                other => other,
            })?;

        let status = response.get("status").and_then(Value::as_str).unwrap_or("");
        if !status.starts_with("200") {
            return Err(SubtitleError::Authentication(format!("status {status:?}")));
        }

        response
            .get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SubtitleError::Protocol("LogIn response has no token".to_string()))
    }

    fn search_subtitles(&self, token: &str, queries: &[SearchQuery]) -> Result<Vec<SearchResult>> {
        let queries = queries.iter().map(query_to_value).collect();
        let response = self.call(
            "SearchSubtitles",
            &[Value::String(token.to_string()), Value::Array(queries)],
        )?;
        parse_search_response(&response)
    }

    fn log_out(&self, token: &str) -> Result<()> {
        self.call("LogOut", &[Value::String(token.to_string())])?;
        Ok(())
    }
}

fn query_to_value(query: &SearchQuery) -> Value {
    let members: BTreeMap<String, Value> = query
        .iter()
        .map(|(key, value)| {
            let value = match value {
                QueryValue::Text(s) => Value::String(s.clone()),
                QueryValue::Int(n) => Value::Int(*n),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Struct(members)
}

/// `data` must be present; `false` or an empty array means no results.
pub fn parse_search_response(response: &Value) -> Result<Vec<SearchResult>> {
    match response.get("data") {
        None => Err(SubtitleError::Protocol(format!(
            "\"data\" key not found in response: {response:?}"
        ))),
        Some(Value::Bool(false)) | Some(Value::Nil) => Ok(Vec::new()),
        Some(Value::Array(records)) => records.iter().map(parse_result).collect(),
        Some(other) => Err(SubtitleError::Protocol(format!("unexpected \"data\": {other:?}"))),
    }
}

fn parse_result(record: &Value) -> Result<SearchResult> {
    let required = |key: &str| {
        record
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| SubtitleError::Protocol(format!("search result is missing {key}")))
    };
    let number = |key: &str| record.get(key).and_then(Value::as_u64);

    let release_name = ["MovieReleaseName", "SubFileName"]
        .iter()
        .find_map(|key| record.get(key).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    Ok(SearchResult {
        release_name,
        download_link: required("SubDownloadLink")?,
        format: required("SubFormat")?,
        download_count: number("SubDownloadsCnt").unwrap_or(0),
        season: number("SeriesSeason").and_then(|n| u32::try_from(n).ok()),
        episode: number("SeriesEpisode").and_then(|n| u32::try_from(n).ok()),
    })
}
