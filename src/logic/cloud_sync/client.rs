//! BigQuery Streaming Client
//!
//! Blocking HTTP client for `tabledata.insertAll`, used as the pipeline's sink.
//! Runs on the delivery worker thread, so blocking I/O is fine here.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::telemetry::{ClickEvent, Sink, SinkError, TelemetryError};

/// Longest server error body kept in a diagnostic
const MAX_DETAIL_LEN: usize = 200;

/// Destination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub project_id: String,
    pub dataset_id: String,
    pub table_id: String,
    /// REST base URL, e.g. `https://bigquery.googleapis.com/bigquery/v2`
    pub endpoint: String,
    /// OAuth bearer token; never serialized
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    pub timeout_seconds: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            project_id: constants::get_project_id(),
            dataset_id: constants::get_dataset_id(),
            table_id: constants::get_table_id(),
            endpoint: constants::get_endpoint(),
            access_token: constants::get_access_token(),
            timeout_seconds: constants::get_http_timeout_secs(),
        }
    }
}

impl SinkConfig {
    /// `project.dataset.table`
    pub fn table_ref(&self) -> String {
        format!("{}.{}.{}", self.project_id, self.dataset_id, self.table_id)
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllRequest {
    pub kind: &'static str,
    pub skip_invalid_rows: bool,
    pub ignore_unknown_values: bool,
    pub rows: Vec<InsertRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertRow {
    pub insert_id: String,
    pub json: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertAllResponse {
    #[serde(default)]
    pub insert_errors: Vec<RowErrors>,
}

#[derive(Debug, Deserialize)]
pub struct RowErrors {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorProto {
    pub reason: Option<String>,
    pub message: Option<String>,
}

/// Analytics sink backed by a BigQuery table
pub struct BigQueryClient {
    config: SinkConfig,
    token: String,
    url: String,
    agent: ureq::Agent,
}

impl BigQueryClient {
    /// Validate the config and build the client.
    pub fn new(config: SinkConfig) -> Result<Self, TelemetryError> {
        let token = config.access_token.clone().ok_or_else(|| {
            TelemetryError::ConstructionFailure(
                "no access token (set CLICKSTREAM_ACCESS_TOKEN)".to_string(),
            )
        })?;

        for (name, value) in [
            ("project", &config.project_id),
            ("dataset", &config.dataset_id),
            ("table", &config.table_id),
        ] {
            if value.trim().is_empty() {
                return Err(TelemetryError::ConstructionFailure(format!(
                    "empty {} id",
                    name
                )));
            }
        }

        let endpoint = config.endpoint.trim_end_matches('/');
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(TelemetryError::ConstructionFailure(format!(
                "invalid endpoint: {}",
                config.endpoint
            )));
        }

        let url = format!(
            "{}/projects/{}/datasets/{}/tables/{}/insertAll",
            endpoint, config.project_id, config.dataset_id, config.table_id
        );

        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build();

        log::info!("Clickstream sink: {}", config.table_ref());

        Ok(Self {
            config,
            token,
            url,
            agent,
        })
    }

    pub fn insert_url(&self) -> &str {
        &self.url
    }

    /// Build the `insertAll` body for a batch
    pub fn build_request(batch: &[ClickEvent]) -> InsertAllRequest {
        InsertAllRequest {
            kind: "bigquery#tableDataInsertAllRequest",
            skip_invalid_rows: false,
            ignore_unknown_values: false,
            rows: batch
                .iter()
                .map(|event| InsertRow {
                    insert_id: event.insert_id().to_string(),
                    json: event.to_row(),
                })
                .collect(),
        }
    }
}

impl Sink for BigQueryClient {
    fn send(&self, batch: &[ClickEvent]) -> Result<(), SinkError> {
        let body = serde_json::to_string(&Self::build_request(batch))
            .map_err(|e| SinkError::Unknown(format!("serialize batch: {}", e)))?;

        let result = self
            .agent
            .post(&self.url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Content-Type", "application/json")
            .send_string(&body);

        match result {
            Ok(response) => {
                let text = response
                    .into_string()
                    .map_err(|e| SinkError::Unknown(format!("read response: {}", e)))?;
                parse_insert_response(&text)
            }
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                Err(classify_status(code, &self.config.table_ref(), &detail))
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(SinkError::Transient(transport.to_string()))
            }
        }
    }

    fn destination(&self) -> String {
        self.config.table_ref()
    }
}

/// Map an HTTP error status to what the worker should do with the batch.
pub fn classify_status(code: u16, table_ref: &str, detail: &str) -> SinkError {
    let detail: String = detail.trim().chars().take(MAX_DETAIL_LEN).collect();
    match code {
        404 => SinkError::NotFound(format!("table {} (HTTP 404)", table_ref)),
        _ if detail.is_empty() => SinkError::Transient(format!("HTTP {}", code)),
        _ => SinkError::Transient(format!("HTTP {}: {}", code, detail)),
    }
}

/// Interpret a 2xx `insertAll` response body.
pub fn parse_insert_response(body: &str) -> Result<(), SinkError> {
    if body.trim().is_empty() {
        return Ok(());
    }

    let response: InsertAllResponse = serde_json::from_str(body)
        .map_err(|e| SinkError::Unknown(format!("unreadable insertAll response: {}", e)))?;

    match response.insert_errors.first() {
        None => Ok(()),
        Some(first) => {
            let reason = first
                .errors
                .first()
                .and_then(|e| e.message.clone().or_else(|| e.reason.clone()))
                .unwrap_or_else(|| "unspecified".to_string());
            Err(SinkError::Rejected {
                rows: response.insert_errors.len(),
                reason: format!("row {}: {}", first.index, reason),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::telemetry::testing::test_context;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    fn sink_config(endpoint: &str) -> SinkConfig {
        SinkConfig {
            project_id: "experiment-476518".to_string(),
            dataset_id: "hl_timeleft".to_string(),
            table_id: "clickstream".to_string(),
            endpoint: endpoint.to_string(),
            access_token: Some("test-token".to_string()),
            timeout_seconds: 5,
        }
    }

    /// Answer exactly one HTTP request, returning the raw request text.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
                head.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut payload = vec![0u8; content_length];
            reader.read_exact(&mut payload).unwrap();

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();

            head + &String::from_utf8_lossy(&payload)
        });

        (format!("http://{}", addr), handle)
    }

    #[test]
    fn test_missing_token_is_construction_failure() {
        let mut config = sink_config("https://bigquery.googleapis.com/bigquery/v2");
        config.access_token = None;

        let result = BigQueryClient::new(config);
        assert!(matches!(result, Err(TelemetryError::ConstructionFailure(_))));
    }

    #[test]
    fn test_empty_table_is_construction_failure() {
        let mut config = sink_config("https://bigquery.googleapis.com/bigquery/v2");
        config.table_id = "  ".to_string();
        assert!(BigQueryClient::new(config).is_err());
    }

    #[test]
    fn test_invalid_endpoint_is_construction_failure() {
        assert!(BigQueryClient::new(sink_config("bigquery.googleapis.com")).is_err());
    }

    #[test]
    fn test_insert_url() {
        let client =
            BigQueryClient::new(sink_config("https://bigquery.googleapis.com/bigquery/v2/"))
                .unwrap();
        assert_eq!(
            client.insert_url(),
            "https://bigquery.googleapis.com/bigquery/v2/projects/experiment-476518/datasets/hl_timeleft/tables/clickstream/insertAll"
        );
        assert_eq!(client.destination(), "experiment-476518.hl_timeleft.clickstream");
    }

    #[test]
    fn test_build_request_rows() {
        let ctx = test_context();
        let batch = vec![
            ctx.event("button_click", "start_button", None),
            ctx.event("button_click", "pause_button", None),
        ];

        let request = serde_json::to_value(BigQueryClient::build_request(&batch)).unwrap();
        assert_eq!(request["kind"], "bigquery#tableDataInsertAllRequest");
        assert_eq!(request["skipInvalidRows"], false);

        let rows = request["rows"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["insertId"], batch[0].insert_id());
        assert_eq!(rows[1]["json"]["component"], "pause_button");
        assert_eq!(rows[1]["json"]["user_id"], "0123456789abcdef");
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(404, "p.d.t", "Not found: Table p:d.t"),
            SinkError::NotFound(_)
        ));
        assert_eq!(
            classify_status(503, "p.d.t", ""),
            SinkError::Transient("HTTP 503".to_string())
        );

        let long = "x".repeat(1000);
        match classify_status(500, "p.d.t", &long) {
            SinkError::Transient(msg) => assert!(msg.len() < 300),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parse_insert_response() {
        assert!(parse_insert_response("").is_ok());
        assert!(parse_insert_response(r#"{"kind":"bigquery#tableDataInsertAllResponse"}"#).is_ok());
        assert!(matches!(
            parse_insert_response("<html>"),
            Err(SinkError::Unknown(_))
        ));

        let rejected = r#"{"insertErrors":[
            {"index":1,"errors":[{"reason":"invalid","message":"no such field: foo"}]},
            {"index":2,"errors":[{"reason":"stopped"}]}
        ]}"#;
        match parse_insert_response(rejected) {
            Err(SinkError::Rejected { rows, reason }) => {
                assert_eq!(rows, 2);
                assert!(reason.contains("no such field"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_send_success() {
        let (endpoint, server) = serve_once("200 OK", r#"{"kind":"bigquery#tableDataInsertAllResponse"}"#);
        let client = BigQueryClient::new(sink_config(&endpoint)).unwrap();
        let batch = vec![test_context().event("timer_start", "timer", None)];

        assert!(client.send(&batch).is_ok());

        let request = server.join().unwrap();
        assert!(request.starts_with(
            "POST /projects/experiment-476518/datasets/hl_timeleft/tables/clickstream/insertAll"
        ));
        assert!(request.contains("Bearer test-token"));
        assert!(request.contains("\"timer_start\""));
    }

    #[test]
    fn test_send_not_found() {
        let (endpoint, server) = serve_once("404 Not Found", r#"{"error":{"code":404}}"#);
        let client = BigQueryClient::new(sink_config(&endpoint)).unwrap();
        let batch = vec![test_context().event("timer_start", "timer", None)];

        assert!(matches!(client.send(&batch), Err(SinkError::NotFound(_))));
        server.join().unwrap();
    }

    #[test]
    fn test_send_server_error_is_transient() {
        let (endpoint, server) = serve_once("503 Service Unavailable", "{}");
        let client = BigQueryClient::new(sink_config(&endpoint)).unwrap();
        let batch = vec![test_context().event("timer_start", "timer", None)];

        let err = client.send(&batch).unwrap_err();
        assert!(err.is_retryable());
        server.join().unwrap();
    }

    #[test]
    fn test_send_connection_refused_is_transient() {
        // Bind then drop to get a port nobody listens on.
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let client = BigQueryClient::new(sink_config(&format!("http://127.0.0.1:{}", port))).unwrap();
        let batch = vec![test_context().event("timer_start", "timer", None)];

        assert!(matches!(client.send(&batch), Err(SinkError::Transient(_))));
    }
}
