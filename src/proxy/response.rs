//! Minimal HTTP response framing.
//!
//! Wire format, exactly:
//! ```text
//! HTTP/1.1 <code> <reason>\n
//! Content-Type: <type>\n
//! Content-Length: <n>\n
//! \n
//! <body>
//! ```

use std::io;

use axum::http::StatusCode;
use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// A complete response ready to be written to a client.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: StatusCode,
    content_type: String,
    body: Bytes,
}

impl HttpResponse {
    /// 200 OK carrying `body`.
    pub fn ok(body: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            content_type: content_type.into(),
            body,
        }
    }

    /// Error response with a synthesized HTML body.
    pub fn error(status: StatusCode, message: &str) -> Self {
        let reason = reason_phrase(status);
        let html = format!("<html><body><h1>{reason}</h1><p>{message}</p></body></html>");

        Self {
            status,
            content_type: "text/html".to_string(),
            body: Bytes::from(html),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Status line and headers, including the blank separator line.
    pub fn head(&self) -> String {
        format!(
            "HTTP/1.1 {} {}\nContent-Type: {}\nContent-Length: {}\n\n",
            self.status.as_u16(),
            reason_phrase(self.status),
            self.content_type,
            self.body.len()
        )
    }

    /// Serialized head followed by the body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let head = self.head();
        let mut out = Vec::with_capacity(head.len() + self.body.len());
        out.extend_from_slice(head.as_bytes());
        out.extend_from_slice(&self.body);
        out
    }

    /// Writes the full response and flushes.
    pub async fn write_to<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        writer.write_all(self.head().as_bytes()).await?;
        writer.write_all(&self.body).await?;
        writer.flush().await
    }
}

fn reason_phrase(status: StatusCode) -> &'static str {
    status.canonical_reason().unwrap_or("Unknown")
}
