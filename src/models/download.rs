use std::{io::Read, time::Duration};

use reqwest::{blocking::Client, StatusCode};
use thiserror::Error;

const CHUNK_SIZE: usize = 32 * 1024;
/// Content-Length is only a hint; larger bodies grow the buffer as they arrive.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("resource not found: {url}")]
    NotFound { url: String },

    #[error("{url} responded with status {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
}

impl TransportError {
    #[must_use]
    pub fn url(&self) -> &str {
        match self {
            Self::NotFound { url } | Self::Status { url, .. } | Self::Request { url, .. } => url,
        }
    }
}

/// Fetches raw bytes for a URL. Retries and timeouts are the
/// implementation's business.
pub trait Transport: Send + Sync {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError>;

    /// Like [`Transport::fetch_bytes`], reporting the running byte count.
    fn fetch_bytes_with_progress(
        &self,
        url: &str,
        progress: &mut dyn FnMut(u64),
    ) -> Result<Vec<u8>, TransportError> {
        let bytes = self.fetch_bytes(url)?;
        progress(bytes.len() as u64);
        Ok(bytes)
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let mut builder = Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|err| TransportError::Request {
            url: String::new(),
            message: format!("create http client: {err}"),
        })?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, TransportError> {
        self.fetch_bytes_with_progress(url, &mut |_: u64| {})
    }

    fn fetch_bytes_with_progress(
        &self,
        url: &str,
        progress: &mut dyn FnMut(u64),
    ) -> Result<Vec<u8>, TransportError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|err| request_error(url, err))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(TransportError::NotFound {
                    url: url.to_string(),
                })
            }
            status if !status.is_success() => {
                return Err(TransportError::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let capacity = response
            .content_length()
            .unwrap_or(0)
            .min(MAX_PREALLOCATION) as usize;
        let mut bytes = Vec::with_capacity(capacity);
        let mut buffer = vec![0u8; CHUNK_SIZE];
        loop {
            let read = response
                .read(&mut buffer)
                .map_err(|err| TransportError::Request {
                    url: url.to_string(),
                    message: format!("read body chunk: {err}"),
                })?;
            if read == 0 {
                break;
            }
            bytes.extend_from_slice(&buffer[..read]);
            progress(bytes.len() as u64);
        }
        Ok(bytes)
    }
}

fn request_error(url: &str, err: reqwest::Error) -> TransportError {
    TransportError::Request {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Vec<u8>);

    impl Transport for Fixed {
        fn fetch_bytes(&self, _url: &str) -> Result<Vec<u8>, TransportError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn default_progress_reports_full_length() {
        let transport = Fixed(vec![7; 42]);
        let mut seen = Vec::new();
        let bytes = transport
            .fetch_bytes_with_progress("https://example.invalid/a", &mut |n: u64| seen.push(n))
            .unwrap();
        assert_eq!(bytes.len(), 42);
        assert_eq!(seen, vec![42]);
    }

    #[test]
    fn error_exposes_url() {
        let error = TransportError::NotFound {
            url: "https://example.invalid/missing".into(),
        };
        assert_eq!(error.url(), "https://example.invalid/missing");
    }

    /// Serves one connection with a canned status line, headers and body.
    fn serve_once(head: &'static str, body: &'static [u8]) -> String {
        use std::io::{BufRead, BufReader, Write};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            while reader.read_line(&mut line).unwrap() > 0 && line != "\r\n" {
                line.clear();
            }
            let mut stream = reader.into_inner();
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(body);
        });
        format!("http://{addr}/model.onnx")
    }

    fn transport() -> HttpTransport {
        HttpTransport::new("onnx-hub-test", Some(Duration::from_secs(5))).unwrap()
    }

    #[test]
    fn reads_body_and_reports_progress() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\n",
            b"hello",
        );
        let mut seen = 0;
        let bytes = transport()
            .fetch_bytes_with_progress(&url, &mut |n: u64| seen = n)
            .unwrap();
        assert_eq!(bytes, b"hello");
        assert_eq!(seen, 5);
    }

    #[test]
    fn maps_404_to_not_found() {
        let url = serve_once(
            "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            b"",
        );
        assert!(matches!(
            transport().fetch_bytes(&url),
            Err(TransportError::NotFound { .. })
        ));
    }

    #[test]
    fn oversized_content_length_is_not_trusted_for_allocation() {
        let url = serve_once(
            "HTTP/1.1 200 OK\r\nContent-Length: 9000000000000000000\r\nConnection: close\r\n\r\n",
            b"hello",
        );
        match transport().fetch_bytes(&url) {
            Ok(bytes) => assert_eq!(bytes, b"hello"),
            Err(err) => assert!(matches!(err, TransportError::Request { .. }), "{err}"),
        }
    }

    #[test]
    fn http_transport_builds() {
        assert!(HttpTransport::new("onnx-hub-test", Some(Duration::from_secs(5))).is_ok());
    }
}
