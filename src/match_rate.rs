// 🎯 Match-Rate Harness - replay recorded requests against a decision service
//
// Every request lands in exactly one outcome bucket. Nothing a single
// request does can abort the batch.

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use tracing::{debug, info};

// ============================================================================
// INPUTS
// ============================================================================

/// The five merchant fields sent to the decision service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MerchantRequest {
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

/// One recorded request from `requests.json`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRequest {
    #[serde(default, deserialize_with = "lenient_id")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub merchant: MerchantRequest,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct IdRef {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<String>,
}

/// Expected identifiers for one request
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TruthEntry {
    #[serde(default)]
    pub corporation: IdRef,
    #[serde(default)]
    pub location: IdRef,
}

pub type TruthSet = HashMap<String, TruthEntry>;

/// Text of a JSON id: strings (non-blank) and numbers are accepted
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(id_text))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(HarnessError::MissingInput(path.to_path_buf()).into());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let parsed = serde_json::from_str(&raw).map_err(|source| HarnessError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(parsed)
}

pub fn load_requests(path: &Path) -> Result<Vec<TestRequest>> {
    read_json(path)
}

pub fn load_truth_set(path: &Path) -> Result<TruthSet> {
    read_json(path)
}

// ============================================================================
// DECISION SERVICE
// ============================================================================

/// Opaque merchant matcher under test.
///
/// `Ok(None)` means the service answered with nothing usable (empty body or
/// JSON null); `Err` is a transport or protocol failure.
pub trait DecisionService {
    fn submit(&self, request: &MerchantRequest) -> Result<Option<Value>>;
}

/// Decision service reached over HTTP: `POST <base_url>/solution/`
pub struct HttpDecisionService {
    client: reqwest::blocking::Client,
    url: String,
}

impl HttpDecisionService {
    pub fn new(config: &HarnessConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(HttpDecisionService {
            client,
            url: config.solution_url(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl DecisionService for HttpDecisionService {
    fn submit(&self, request: &MerchantRequest) -> Result<Option<Value>> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()?
            .error_for_status()?;

        let body = response.text()?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        let value: Value = serde_json::from_str(&body).context("response is not JSON")?;
        Ok((!value.is_null()).then_some(value))
    }
}

// ============================================================================
// OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    NoResponse(Option<String>),
    MissingFields(&'static str),
    NoTruthMapping,
    IdMatch,
    IdMismatch {
        expected_corporation: Option<String>,
        expected_location: Option<String>,
        corporation: String,
        location: String,
    },
}

impl Outcome {
    /// Bucket one service answer against the expected identifiers
    pub fn classify(response: Result<Option<Value>>, expected: Option<&TruthEntry>) -> Outcome {
        let body = match response {
            Ok(Some(body)) => body,
            Ok(None) => return Outcome::NoResponse(None),
            Err(err) => return Outcome::NoResponse(Some(format!("{err:#}"))),
        };

        let section = |name: &str| body.get(name).filter(|v| v.is_object());
        let (Some(corporation), Some(location)) = (section("corporation"), section("location"))
        else {
            return Outcome::MissingFields("Missing corporation or location");
        };

        let id_of = |node: &Value| node.get("id").and_then(id_text);
        let (Some(corporation), Some(location)) = (id_of(corporation), id_of(location)) else {
            return Outcome::MissingFields("Missing IDs");
        };

        let Some(expected) = expected else {
            return Outcome::NoTruthMapping;
        };

        let corporation_matches = expected.corporation.id.as_deref() == Some(corporation.as_str());
        let location_matches = expected.location.id.as_deref() == Some(location.as_str());
        if corporation_matches && location_matches {
            Outcome::IdMatch
        } else {
            Outcome::IdMismatch {
                expected_corporation: expected.corporation.id.clone(),
                expected_location: expected.location.id.clone(),
                corporation,
                location,
            }
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Outcome::IdMatch)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::NoResponse(None) => f.write_str("No response"),
            Outcome::NoResponse(Some(reason)) => write!(f, "Error: {reason}"),
            Outcome::MissingFields(what) => f.write_str(what),
            Outcome::NoTruthMapping => f.write_str("No truth mapping available"),
            Outcome::IdMatch => f.write_str("ID MATCH"),
            Outcome::IdMismatch {
                expected_corporation,
                expected_location,
                corporation,
                location,
            } => write!(
                f,
                "ID MISMATCH (expected corp={}, loc={}; got corp={}, loc={})",
                expected_corporation.as_deref().unwrap_or("?"),
                expected_location.as_deref().unwrap_or("?"),
                corporation,
                location
            ),
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchReport {
    pub total: usize,
    pub matches: usize,
    pub mismatches: usize,
    pub no_response: usize,
    pub missing_fields: usize,
    pub no_truth_mapping: usize,
}

impl MatchReport {
    pub fn record(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::NoResponse(_) => self.no_response += 1,
            Outcome::MissingFields(_) => self.missing_fields += 1,
            Outcome::NoTruthMapping => self.no_truth_mapping += 1,
            Outcome::IdMatch => self.matches += 1,
            Outcome::IdMismatch { .. } => self.mismatches += 1,
        }
    }

    /// Requests that produced no comparable answer
    pub fn failures(&self) -> usize {
        self.no_response + self.missing_fields + self.no_truth_mapping
    }

    /// Percentage of exact id matches; None when nothing was run
    pub fn match_rate(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some(self.matches as f64 * 100.0 / self.total as f64)
    }

    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("Total requests: {}", self.total),
            format!("Successful exact ID matches: {}", self.matches),
            format!("ID mismatches: {}", self.mismatches),
            format!("Failed requests (HTTP/errors/missing data): {}", self.failures()),
        ];
        if let Some(rate) = self.match_rate() {
            lines.push(format!("Exact ID match rate: {rate:.2}%"));
        }
        lines
    }

    /// Summary to stdout, or the no-requests notice to stderr
    pub fn print(&self) {
        for line in self.summary_lines() {
            println!("{line}");
        }
        if self.match_rate().is_none() {
            eprintln!("No requests to process");
        }
    }
}

// ============================================================================
// RUN
// ============================================================================

/// One progress line: mark, ordinal, request id, merchant name, outcome
pub fn progress_line(ordinal: usize, request: &TestRequest, outcome: &Outcome) -> String {
    let mark = if outcome.is_match() { "✓" } else { "✗" };
    format!(
        "{} Request {} ({}): {} - {}",
        mark,
        ordinal,
        request.request_id.as_deref().unwrap_or("no id"),
        request.merchant.merchant_name.as_deref().unwrap_or_default(),
        outcome
    )
}

/// Submit every request in order and score the answers
pub fn run_match_rate<D: DecisionService + ?Sized>(
    service: &D,
    requests: &[TestRequest],
    truth: &TruthSet,
) -> MatchReport {
    let mut report = MatchReport::default();

    for (idx, request) in requests.iter().enumerate() {
        let expected = request.request_id.as_ref().and_then(|id| truth.get(id));
        let outcome = Outcome::classify(service.submit(&request.merchant), expected);
        debug!(request_id = ?request.request_id, ?outcome, "Request scored");

        println!("{}", progress_line(idx + 1, request, &outcome));
        report.record(&outcome);
    }

    report
}

/// Load both inputs and score the HTTP service at `config.base_url`
pub fn check_match_rate(config: &HarnessConfig) -> Result<MatchReport> {
    let requests = load_requests(&config.requests_path)?;
    let truth = load_truth_set(&config.truth_set_path)?;
    let service = HttpDecisionService::new(config)?;

    info!(requests = requests.len(), truth_entries = truth.len(), url = service.url(), "Checking match rate");
    println!("Testing {} requests against {}", requests.len(), service.url());
    println!("{}", "-".repeat(50));

    let report = run_match_rate(&service, &requests, &truth);

    println!("{}", "-".repeat(50));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::time::Duration;

    /// Answers keyed by merchant name; "offline" fails, unknown names get null
    struct FakeService {
        answers: HashMap<String, Value>,
    }

    impl DecisionService for FakeService {
        fn submit(&self, request: &MerchantRequest) -> Result<Option<Value>> {
            let name = request.merchant_name.as_deref().unwrap_or_default();
            if name == "offline" {
                return Err(anyhow!("connection refused"));
            }
            Ok(self.answers.get(name).cloned())
        }
    }

    fn answer(corporation: &str, location: &str) -> Value {
        json!({
            "corporation": {"id": corporation, "legal_name": "Walgreen Co."},
            "location": {"id": location, "name": "Walgreens"}
        })
    }

    fn truth(corporation: &str, location: &str) -> TruthEntry {
        TruthEntry {
            corporation: IdRef { id: Some(corporation.to_string()) },
            location: IdRef { id: Some(location.to_string()) },
        }
    }

    fn request(id: Option<&str>, merchant: &str) -> TestRequest {
        TestRequest {
            request_id: id.map(String::from),
            merchant: MerchantRequest {
                merchant_name: Some(merchant.to_string()),
                ..MerchantRequest::default()
            },
        }
    }

    #[test]
    fn test_classify_buckets() {
        let expected = truth("C1", "L1");

        assert_eq!(Outcome::classify(Ok(None), Some(&expected)), Outcome::NoResponse(None));
        assert!(matches!(
            Outcome::classify(Err(anyhow!("timed out")), Some(&expected)),
            Outcome::NoResponse(Some(_))
        ));
        assert!(matches!(
            Outcome::classify(Ok(Some(json!({"corporation": {"id": "C1"}}))), Some(&expected)),
            Outcome::MissingFields(_)
        ));
        assert!(matches!(
            Outcome::classify(
                Ok(Some(json!({"corporation": {"id": "C1"}, "location": null}))),
                Some(&expected)
            ),
            Outcome::MissingFields(_)
        ));
        assert_eq!(
            Outcome::classify(
                Ok(Some(json!({"corporation": {"id": " "}, "location": {"id": "L1"}}))),
                Some(&expected)
            ),
            Outcome::MissingFields("Missing IDs")
        );
        assert_eq!(Outcome::classify(Ok(Some(answer("C1", "L1"))), None), Outcome::NoTruthMapping);
        assert_eq!(Outcome::classify(Ok(Some(answer("C1", "L1"))), Some(&expected)), Outcome::IdMatch);
        assert!(matches!(
            Outcome::classify(Ok(Some(answer("C1", "L2"))), Some(&expected)),
            Outcome::IdMismatch { .. }
        ));
    }

    #[test]
    fn test_numeric_ids_compare_as_text() {
        let response = json!({"corporation": {"id": 7}, "location": {"id": 42}});
        assert_eq!(Outcome::classify(Ok(Some(response)), Some(&truth("7", "42"))), Outcome::IdMatch);
    }

    #[test]
    fn test_match_rate_formatting() {
        let mut report = MatchReport::default();
        for _ in 0..7 {
            report.record(&Outcome::IdMatch);
        }
        report.record(&Outcome::NoTruthMapping);
        report.record(&Outcome::NoResponse(None));
        report.record(&Outcome::MissingFields("Missing IDs"));

        assert_eq!(report.total, 10);
        assert_eq!(report.failures(), 3);
        assert_eq!(report.summary_lines().last().unwrap(), "Exact ID match rate: 70.00%");
    }

    #[test]
    fn test_empty_run_has_no_rate() {
        let report = MatchReport::default();
        assert_eq!(report.match_rate(), None);
        assert!(!report.summary_lines().iter().any(|l| l.contains("rate")));
    }

    #[test]
    fn test_run_continues_past_failures() {
        let service = FakeService {
            answers: HashMap::from([
                ("Walgreens".to_string(), answer("C1", "L1")),
                ("CVS".to_string(), answer("C2", "L9")),
            ]),
        };
        let truth_set = TruthSet::from([
            ("r1".to_string(), truth("C1", "L1")),
            ("r2".to_string(), truth("C2", "L2")),
            ("r3".to_string(), truth("C3", "L3")),
        ]);
        let requests = vec![
            request(Some("r1"), "Walgreens"),
            request(Some("r2"), "CVS"),
            request(Some("r3"), "offline"),
            request(Some("r4"), "Unknown"),
            request(None, "Walgreens"),
        ];

        let report = run_match_rate(&service, &requests, &truth_set);

        assert_eq!(
            report,
            MatchReport {
                total: 5,
                matches: 1,
                mismatches: 1,
                no_response: 2,
                missing_fields: 0,
                no_truth_mapping: 1,
            }
        );
    }

    #[test]
    fn test_progress_line() {
        let line = progress_line(1, &request(Some("r1"), "Walgreens"), &Outcome::IdMatch);
        assert_eq!(line, "✓ Request 1 (r1): Walgreens - ID MATCH");
    }

    #[test]
    fn test_load_inputs() {
        let mut requests = tempfile::NamedTempFile::new().unwrap();
        write!(
            requests,
            r#"[{{"requestId": 12, "merchantName": "Walgreens", "city": "Austin", "region": "TX", "postalCode": "78701"}}]"#
        )
        .unwrap();

        let loaded = load_requests(requests.path()).unwrap();
        assert_eq!(loaded[0].request_id.as_deref(), Some("12"));
        assert_eq!(loaded[0].merchant.region.as_deref(), Some("TX"));
        assert_eq!(loaded[0].merchant.address, None);

        let mut truth_file = tempfile::NamedTempFile::new().unwrap();
        write!(truth_file, "{{not json").unwrap();
        let err = load_truth_set(truth_file.path()).unwrap_err();
        assert!(matches!(err.downcast_ref::<HarnessError>(), Some(HarnessError::InvalidJson { .. })));

        let err = load_requests(Path::new("does/not/exist.json")).unwrap_err();
        assert!(matches!(err.downcast_ref::<HarnessError>(), Some(HarnessError::MissingInput(_))));
    }

    /// Read one HTTP request off `stream` and return its request line
    fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + length {
                break;
            }
        }
        String::from_utf8_lossy(&buf)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string()
    }

    /// Serve one canned (status, body) per connection; request lines are
    /// sent back over the channel
    fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();

        std::thread::spawn(move || {
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                tx.send(read_request(&mut stream)).unwrap();
                let reason = if status == 200 { "OK" } else { "Internal Server Error" };
                let response = format!(
                    "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(response.as_bytes()).unwrap();
            }
        });

        (format!("http://{addr}"), rx)
    }

    #[test]
    fn test_http_responses_land_in_buckets() {
        let (base_url, requests) = serve(vec![
            (500, r#"{"error": "boom"}"#),
            (200, ""),
            (200, "null"),
            (200, "not json"),
            (200, r#"{"corporation": {"id": "C1"}, "location": {"id": "L1"}}"#),
        ]);
        let config = HarnessConfig {
            base_url,
            timeout: Duration::from_secs(5),
            ..HarnessConfig::default()
        };
        let service = HttpDecisionService::new(&config).unwrap();
        let expected = truth("C1", "L1");

        let outcomes: Vec<Outcome> = (0..5)
            .map(|_| {
                let answer = service.submit(&request(Some("r1"), "Walgreens").merchant);
                Outcome::classify(answer, Some(&expected))
            })
            .collect();

        assert!(matches!(outcomes[0], Outcome::NoResponse(Some(_))));
        assert_eq!(outcomes[1], Outcome::NoResponse(None));
        assert_eq!(outcomes[2], Outcome::NoResponse(None));
        assert!(matches!(outcomes[3], Outcome::NoResponse(Some(_))));
        assert_eq!(outcomes[4], Outcome::IdMatch);

        let request_line = requests.recv().unwrap();
        assert!(request_line.starts_with("POST /solution/ "), "{request_line}");
    }
}
