//! Mock implementations for testing.
//!
//! Provides a scripted HTTP transport and JSON fixtures so the services,
//! the resilience pipeline and the orchestrator can be exercised without
//! a live API.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use crate::transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
use crate::types::Position;

/// A recorded request.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request path.
    pub path: String,
    /// Request body.
    pub body: Option<Vec<u8>>,
    /// When the request reached the transport.
    pub at: Instant,
}

impl RecordedRequest {
    /// Parses the body as JSON.
    pub fn json_body(&self) -> Option<serde_json::Value> {
        self.body
            .as_deref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }

    /// Grid position carried in the body, if any.
    pub fn position(&self) -> Option<Position> {
        let body = self.json_body()?;
        Some(Position::new(body.get("row")?.as_i64()?, body.get("column")?.as_i64()?))
    }
}

/// A mock response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl MockResponse {
    /// Creates a successful JSON response.
    pub fn json<T: serde::Serialize>(value: &T) -> Self {
        let body = serde_json::to_vec(value).unwrap_or_default();
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        Self {
            status: 200,
            headers,
            body,
        }
    }

    /// Creates an empty 200 response, as returned by create and delete calls.
    pub fn ok() -> Self {
        Self::json(&serde_json::json!({}))
    }

    /// Creates an error response.
    pub fn error(status: u16, message: &str) -> Self {
        let error = serde_json::json!({
            "error": true,
            "message": message,
        });
        Self::json(&error).with_status(status)
    }

    /// Creates a response with custom status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }
}

/// What the transport hands back for one request.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// An HTTP response with any status.
    Response(MockResponse),
    /// A transport-level failure.
    Failure(TransportError),
}

impl From<MockResponse> for MockReply {
    fn from(response: MockResponse) -> Self {
        MockReply::Response(response)
    }
}

/// A reply bound to requests matching method, path and position.
#[derive(Debug, Clone)]
pub struct MockRule {
    method: Option<HttpMethod>,
    path: Option<String>,
    position: Option<Position>,
    reply: MockReply,
    remaining: Option<usize>,
}

impl MockRule {
    /// Creates a rule that matches every request.
    pub fn new(reply: impl Into<MockReply>) -> Self {
        Self {
            method: None,
            path: None,
            position: None,
            reply: reply.into(),
            remaining: None,
        }
    }

    /// Restricts the rule to one method.
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Restricts the rule to one path.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Restricts the rule to bodies targeting one cell.
    pub fn position(mut self, row: i64, column: i64) -> Self {
        self.position = Some(Position::new(row, column));
        self
    }

    /// Applies the rule only `n` times.
    pub fn times(mut self, n: usize) -> Self {
        self.remaining = Some(n);
        self
    }

    fn matches(&self, request: &RecordedRequest) -> bool {
        self.remaining != Some(0)
            && self.method.map_or(true, |m| m == request.method)
            && self.path.as_deref().map_or(true, |p| p == request.path)
            && self.position.map_or(true, |p| request.position() == Some(p))
    }
}

/// Mock HTTP transport for testing.
///
/// Replies are resolved in order: the first matching rule, then the next
/// queued reply, then the default reply.
pub struct MockTransport {
    rules: Mutex<Vec<MockRule>>,
    queue: Mutex<VecDeque<MockReply>>,
    default_reply: Mutex<MockReply>,
    requests: Mutex<Vec<RecordedRequest>>,
    latency: Mutex<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockTransport {
    /// Creates a transport whose default reply is a 500 error.
    pub fn new() -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            queue: Mutex::new(VecDeque::new()),
            default_reply: Mutex::new(MockReply::Response(MockResponse::error(
                500,
                "No mock response configured",
            ))),
            requests: Mutex::new(Vec::new()),
            latency: Mutex::new(Duration::ZERO),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Creates a transport that answers every request with an empty 200.
    pub fn succeeding() -> Self {
        let transport = Self::new();
        transport.set_default(MockResponse::ok());
        transport
    }

    /// Adds a rule.
    pub fn add_rule(&self, rule: MockRule) {
        self.rules.lock().push(rule);
    }

    /// Queues a reply.
    pub fn queue(&self, reply: impl Into<MockReply>) {
        self.queue.lock().push_back(reply.into());
    }

    /// Queues a JSON response.
    pub fn queue_json<T: serde::Serialize>(&self, value: &T) {
        self.queue(MockResponse::json(value));
    }

    /// Queues an error response.
    pub fn queue_error(&self, status: u16, message: &str) {
        self.queue(MockResponse::error(status, message));
    }

    /// Queues a transport failure.
    pub fn queue_failure(&self, error: TransportError) {
        self.queue(MockReply::Failure(error));
    }

    /// Sets the default reply.
    pub fn set_default(&self, reply: impl Into<MockReply>) {
        *self.default_reply.lock() = reply.into();
    }

    /// Delays every reply by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Gets all recorded requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Gets the last recorded request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().last().cloned()
    }

    /// Returns the number of requests made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Highest number of requests that were in flight at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn resolve(&self, request: &RecordedRequest) -> MockReply {
        {
            let mut rules = self.rules.lock();
            if let Some(rule) = rules.iter_mut().find(|rule| rule.matches(request)) {
                if let Some(remaining) = rule.remaining.as_mut() {
                    *remaining -= 1;
                }
                return rule.reply.clone();
            }
        }

        if let Some(reply) = self.queue.lock().pop_front() {
            return reply;
        }

        self.default_reply.lock().clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("requests", &self.request_count())
            .finish()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let recorded = RecordedRequest {
            method: request.method,
            path: request.path,
            body: request.body,
            at: Instant::now(),
        };
        let reply = self.resolve(&recorded);
        self.requests.lock().push(recorded);

        let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            MockReply::Response(response) => Ok(HttpResponse {
                status: response.status,
                headers: response.headers,
                body: response.body,
            }),
            MockReply::Failure(error) => Err(error),
        }
    }
}

/// Test fixtures for common payloads.
pub mod fixtures {
    use serde_json::{json, Value};

    /// A goal map body built from rows of labels.
    pub fn goal_map(rows: &[&[&str]]) -> Value {
        json!({ "goal": rows })
    }

    /// A small 3x3 goal map with one object of each kind.
    pub fn small_goal_map() -> Value {
        goal_map(&[
            &["POLYANET", "SPACE", "SPACE"],
            &["SPACE", "BLUE_SOLOON", "SPACE"],
            &["SPACE", "SPACE", "UP_COMETH"],
        ])
    }

    /// A current-map body; `cells` lists `(row, column, cell json)`.
    pub fn current_map(width: usize, height: usize, cells: &[(usize, usize, Value)]) -> Value {
        let mut content = vec![vec![Value::Null; width]; height];
        for (row, column, cell) in cells {
            if let Some(slot) = content.get_mut(*row).and_then(|r| r.get_mut(*column)) {
                *slot = cell.clone();
            }
        }
        json!({ "map": { "content": content } })
    }

    /// A Polyanet cell of the current map.
    pub fn polyanet_cell() -> Value {
        json!({ "type": 0 })
    }

    /// A Soloon cell of the current map.
    pub fn soloon_cell(color: &str) -> Value {
        json!({ "type": 1, "color": color })
    }

    /// A Cometh cell of the current map.
    pub fn cometh_cell(direction: &str) -> Value {
        json!({ "type": 2, "direction": direction })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rules_take_precedence_over_queue() {
        let transport = MockTransport::succeeding();
        transport.add_rule(
            MockRule::new(MockResponse::error(400, "bad cell"))
                .method(HttpMethod::Post)
                .path("/soloons")
                .position(2, 3),
        );
        transport.queue_error(503, "busy");

        let hit = HttpRequest::post("/soloons")
            .with_json(&serde_json::json!({"row": 2, "column": 3}))
            .unwrap();
        let miss = HttpRequest::post("/soloons")
            .with_json(&serde_json::json!({"row": 0, "column": 0}))
            .unwrap();

        assert_eq!(transport.send(hit).await.unwrap().status, 400);
        assert_eq!(transport.send(miss.clone()).await.unwrap().status, 503);
        assert_eq!(transport.send(miss).await.unwrap().status, 200);
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test]
    async fn test_rule_times_limit() {
        let transport = MockTransport::succeeding();
        transport.add_rule(MockRule::new(MockResponse::error(502, "flaky")).times(1));

        assert_eq!(transport.send(HttpRequest::get("/x")).await.unwrap().status, 502);
        assert_eq!(transport.send(HttpRequest::get("/x")).await.unwrap().status, 200);
    }

    #[tokio::test]
    async fn test_queued_failure() {
        let transport = MockTransport::succeeding();
        transport.queue_failure(TransportError::Connection {
            message: "refused".to_string(),
        });

        assert!(transport.send(HttpRequest::get("/x")).await.is_err());
        assert!(transport.send(HttpRequest::get("/x")).await.is_ok());
    }

    #[test]
    fn test_current_map_fixture() {
        let map = fixtures::current_map(2, 2, &[(1, 0, fixtures::soloon_cell("red"))]);
        assert_eq!(map["map"]["content"][1][0]["type"], 1);
        assert!(map["map"]["content"][0][0].is_null());
    }
}
