//! Direct HTTP transport backed by `reqwest`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};

use super::{FormPart, RawResponse, ResponseBody, Transport, TransportError, WireBody, WireRequest};

/// Sends wire requests over HTTP.
///
/// Connect and receive timeouts are taken from each [`WireRequest`]; the
/// connect bound covers the exchange up to the response head, the receive
/// bound covers reading the body.
#[derive(Debug, Clone, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Create a transport with a default `reqwest` client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport around an existing `reqwest` client.
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn build_form(parts: &[FormPart]) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    filename,
                    content_type,
                    data,
                } => {
                    let file = Part::bytes(data.to_vec())
                        .file_name(filename.clone())
                        .mime_str(content_type)
                        .map_err(|e| {
                            TransportError::InvalidRequest(format!("Invalid MIME type: {e}"))
                        })?;
                    form.part(name.clone(), file)
                }
            };
        }
        Ok(form)
    }
}

async fn bounded<T, F>(limit: Option<Duration>, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, reqwest::Error>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(TransportError::from),
        None => fut.await.map_err(TransportError::from),
    }
}

/// Classify a response body by its `Content-Type`.
///
/// JSON bodies are decoded (falling back to text when they do not parse),
/// `text/*` bodies become text, everything else stays binary.
pub(crate) fn classify_body(content_type: Option<&str>, bytes: Bytes) -> ResponseBody {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();

    if mime == "application/json" || mime.ends_with("+json") {
        return serde_json::from_slice(&bytes).map_or_else(
            |_| ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned()),
            ResponseBody::Json,
        );
    }

    if mime.starts_with("text/") {
        return ResponseBody::Text(String::from_utf8_lossy(&bytes).into_owned());
    }

    ResponseBody::Bytes(bytes)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &WireRequest) -> Result<RawResponse, TransportError> {
        let builder = self
            .client
            .post(&request.url)
            .headers(request.headers.clone());

        let builder = match &request.body {
            WireBody::Json(value) => builder.json(value),
            WireBody::Multipart(parts) => builder.multipart(Self::build_form(parts)?),
        };

        tracing::debug!(
            operation = %request.operation,
            url = %request.url,
            "Sending HTTP request"
        );

        let response = bounded(request.connect_timeout, builder.send()).await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);

        let bytes = bounded(request.receive_timeout, response.bytes()).await?;

        tracing::debug!(
            operation = %request.operation,
            status,
            len = bytes.len(),
            "Received HTTP response"
        );

        Ok(RawResponse::new(
            status,
            classify_body(content_type.as_deref(), bytes),
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    mod classify_body {
        use super::*;

        #[test]
        fn test_decodes_json() {
            let body = classify_body(
                Some("application/json; charset=utf-8"),
                Bytes::from_static(br#"{"text":"hi"}"#),
            );
            assert_eq!(body, ResponseBody::Json(serde_json::json!({"text": "hi"})));
        }

        #[test]
        fn test_invalid_json_falls_back_to_text() {
            let body = classify_body(Some("application/json"), Bytes::from_static(b"oops"));
            assert_eq!(body, ResponseBody::Text("oops".to_owned()));
        }

        #[test]
        fn test_text_plain_is_text() {
            let body = classify_body(Some("text/plain"), Bytes::from_static(b"hello"));
            assert_eq!(body, ResponseBody::Text("hello".to_owned()));
        }

        #[test]
        fn test_audio_stays_binary() {
            let body = classify_body(Some("audio/mpeg"), Bytes::from_static(&[1, 2, 3]));
            assert_eq!(body, ResponseBody::Bytes(Bytes::from_static(&[1, 2, 3])));
        }

        #[test]
        fn test_missing_content_type_is_binary() {
            let body = classify_body(None, Bytes::from_static(b"x"));
            assert!(matches!(body, ResponseBody::Bytes(_)));
        }
    }

    #[test]
    fn test_builds_multipart_form() {
        let parts = vec![
            FormPart::File {
                name: "file".to_owned(),
                filename: "audio.webm".to_owned(),
                content_type: "audio/webm".to_owned(),
                data: Bytes::from_static(b"0123456789"),
            },
            FormPart::text("model", "whisper-1"),
        ];
        assert!(HttpTransport::build_form(&parts).is_ok());
    }

    #[test]
    fn test_rejects_invalid_mime() {
        let parts = vec![FormPart::File {
            name: "file".to_owned(),
            filename: "a".to_owned(),
            content_type: "not a mime".to_owned(),
            data: Bytes::new(),
        }];
        let err = HttpTransport::build_form(&parts).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
