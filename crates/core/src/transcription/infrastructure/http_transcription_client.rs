use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use serde::Deserialize;

use crate::shared::constants::{SEGMENT_MIME_TYPE, SEGMENT_UPLOAD_NAME};
use crate::transcription::domain::transcription_service::{
    TranscriptionError, TranscriptionParams, TranscriptionService,
};

/// Both `json` and `verbose_json` responses carry the full text at the top level.
#[derive(Deserialize)]
struct TranscriptionBody {
    text: String,
}

/// Client for OpenAI-compatible `/audio/transcriptions` endpoints.
///
/// Sends each segment as a multipart upload with bearer authentication.
/// The timeout covers the whole call, connect through body.
pub struct HttpTranscriptionClient {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl HttpTranscriptionClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TranscriptionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranscriptionError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> TranscriptionError {
        if err.is_timeout() {
            TranscriptionError::Timeout(self.timeout)
        } else {
            TranscriptionError::Transport(err.to_string())
        }
    }
}

impl std::fmt::Debug for HttpTranscriptionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTranscriptionClient")
            .field("endpoint", &self.endpoint)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TranscriptionService for HttpTranscriptionClient {
    fn transcribe(
        &self,
        segment: &[u8],
        params: &TranscriptionParams,
    ) -> Result<String, TranscriptionError> {
        let file = Part::bytes(segment.to_vec())
            .file_name(SEGMENT_UPLOAD_NAME)
            .mime_str(SEGMENT_MIME_TYPE)
            .map_err(|e| self.classify(e))?;

        let form = Form::new()
            .part("file", file)
            .text("model", params.model.clone())
            .text("temperature", params.temperature.to_string())
            .text("response_format", params.response_format.as_str())
            .text("language", params.language.clone());

        let mut request = self.client.post(&self.endpoint).multipart(form);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().map_err(|e| self.classify(e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranscriptionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().map_err(|e| self.classify(e))?;
        let parsed: TranscriptionBody = serde_json::from_str(&body)
            .map_err(|e| TranscriptionError::MalformedResponse(e.to_string()))?;
        Ok(parsed.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    fn http_response(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
        haystack.windows(needle.len()).position(|w| w == needle)
    }

    /// Reads one request (headers plus Content-Length body) and returns it as text.
    fn read_request(stream: &mut std::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = find(&buf, b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..pos]).to_lowercase();
                let len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= pos + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Serves a single canned response after `delay`, returning the endpoint URL
    /// and a handle yielding the raw request text.
    fn serve_once(response: String, delay: Duration) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            std::thread::sleep(delay);
            let _ = stream.write_all(response.as_bytes());
            request
        });
        (format!("http://{addr}/openai/v1/audio/transcriptions"), handle)
    }

    fn client(endpoint: &str, timeout: Duration) -> HttpTranscriptionClient {
        HttpTranscriptionClient::new(endpoint, Some("test-key".to_string()), timeout).unwrap()
    }

    #[test]
    fn test_success_returns_text_and_sends_form() {
        let body = r#"{"task":"transcribe","language":"english","duration":2.0,"text":" Hello there.","segments":[]}"#;
        let (endpoint, handle) = serve_once(http_response("200 OK", body), Duration::ZERO);

        let text = client(&endpoint, Duration::from_secs(5))
            .transcribe(b"fLaCdata", &TranscriptionParams::default())
            .unwrap();
        assert_eq!(text, " Hello there.");

        let request = handle.join().unwrap();
        assert!(request.starts_with("POST /openai/v1/audio/transcriptions"));
        assert!(request.contains("authorization: Bearer test-key")
            || request.contains("Authorization: Bearer test-key"));
        assert!(request.contains("filename=\"chunk.flac\""));
        assert!(request.contains("audio/flac"));
        assert!(request.contains("distil-whisper-large-v3-en"));
        assert!(request.contains("verbose_json"));
        assert!(request.contains("name=\"language\"\r\n\r\nen"));
        assert!(request.contains("name=\"temperature\"\r\n\r\n0"));
        assert!(request.contains("fLaCdata"));
    }

    #[test]
    fn test_non_success_status_is_http_error() {
        let (endpoint, handle) = serve_once(
            http_response("429 Too Many Requests", r#"{"error":"slow down"}"#),
            Duration::ZERO,
        );

        let err = client(&endpoint, Duration::from_secs(5))
            .transcribe(b"x", &TranscriptionParams::default())
            .unwrap_err();
        handle.join().unwrap();

        match err {
            TranscriptionError::Http { status, body } => {
                assert_eq!(status, 429);
                assert!(body.contains("slow down"));
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_body_is_reported() {
        let (endpoint, handle) =
            serve_once(http_response("200 OK", r#"{"words":[]}"#), Duration::ZERO);

        let err = client(&endpoint, Duration::from_secs(5))
            .transcribe(b"x", &TranscriptionParams::default())
            .unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, TranscriptionError::MalformedResponse(_)));
    }

    #[test]
    fn test_slow_service_times_out() {
        let (endpoint, handle) = serve_once(
            http_response("200 OK", r#"{"text":"late"}"#),
            Duration::from_millis(1500),
        );

        let err = client(&endpoint, Duration::from_millis(200))
            .transcribe(b"x", &TranscriptionParams::default())
            .unwrap_err();
        handle.join().unwrap();
        assert!(matches!(err, TranscriptionError::Timeout(_)));
    }

    #[test]
    fn test_unreachable_endpoint_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = client(&format!("http://{addr}/"), Duration::from_secs(2))
            .transcribe(b"x", &TranscriptionParams::default())
            .unwrap_err();
        assert!(matches!(err, TranscriptionError::Transport(_)));
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let c = client("http://localhost/", Duration::from_secs(1));
        let debug = format!("{c:?}");
        assert!(!debug.contains("test-key"));
        assert!(debug.contains("redacted"));
    }
}
