//! HTTP client abstraction for testability.

use std::time::Duration;

use super::types::FetchError;

/// Default request timeout for the backend endpoints.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// A raw HTTP response. Status handling is the caller's policy, so non-200
/// responses are returned as values rather than errors.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Trait for HTTP GET operations.
///
/// Allows dependency injection: tests drive the fetch task with a scripted
/// mock client instead of a network.
pub trait HttpClient: Send + Sync {
    /// Perform an HTTP GET with the given headers.
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, FetchError>;
}

/// Real HTTP client implementation using reqwest's blocking API.
///
/// Blocking is deliberate: the fetch task owns a background thread and the
/// three calls are strictly sequential.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
}

impl ReqwestClient {
    /// Create a client with the default timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    /// Create a client with a custom timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestClient {
    fn get(&self, url: &str, headers: &[(String, String)]) -> Result<HttpResponse, FetchError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .send()
            .map_err(|e| FetchError::Network(format!("request failed: {}", e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| FetchError::Network(format!("failed to read response: {}", e)))?;

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Mock HTTP client that replays a scripted sequence of responses and
    /// records every request it sees.
    pub struct MockHttpClient {
        responses: Mutex<VecDeque<Result<HttpResponse, FetchError>>>,
        pub requests: Mutex<Vec<(String, Vec<(String, String)>)>>,
    }

    impl MockHttpClient {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn push_json(&self, status: u16, body: &str) {
            self.responses.lock().unwrap().push_back(Ok(HttpResponse {
                status,
                body: body.as_bytes().to_vec(),
            }));
        }

        pub fn push_error(&self, error: FetchError) {
            self.responses.lock().unwrap().push_back(Err(error));
        }

        pub fn request_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requested_urls(&self) -> Vec<String> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .map(|(url, _)| url.clone())
                .collect()
        }
    }

    impl HttpClient for MockHttpClient {
        fn get(
            &self,
            url: &str,
            headers: &[(String, String)],
        ) -> Result<HttpResponse, FetchError> {
            self.requests
                .lock()
                .unwrap()
                .push((url.to_string(), headers.to_vec()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(FetchError::Network("no scripted response".to_string())))
        }
    }

    #[test]
    fn test_mock_replays_in_order() {
        let mock = MockHttpClient::new();
        mock.push_json(200, "[1]");
        mock.push_json(404, "");

        let first = mock.get("http://a", &[]).unwrap();
        assert_eq!(first.status, 200);
        let second = mock.get("http://b", &[]).unwrap();
        assert_eq!(second.status, 404);
        assert_eq!(mock.requested_urls(), vec!["http://a", "http://b"]);
    }

    #[test]
    fn test_mock_error() {
        let mock = MockHttpClient::new();
        mock.push_error(FetchError::Network("boom".to_string()));
        assert!(mock.get("http://a", &[]).is_err());
    }

    #[test]
    fn test_mock_exhausted_is_an_error() {
        let mock = MockHttpClient::new();
        assert!(mock.get("http://a", &[]).is_err());
    }
}
