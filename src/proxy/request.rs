//! Request line reading and parsing.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

/// Longest request line accepted, terminator included.
pub const MAX_REQUEST_LINE: u64 = 8 * 1024;

/// The two fields of `METHOD TARGET-URL` the proxy acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestLine {
    pub method: String,
    pub target: String,
}

impl RequestLine {
    /// Splits a request line on single spaces.
    ///
    /// A line with no target yields `/`, which no scheme policy accepts.
    /// Consecutive spaces produce an empty target, which is rejected the
    /// same way. Anything after the target (such as an HTTP version) is
    /// ignored.
    pub fn parse(line: &str) -> Self {
        let mut tokens = line.split(' ');
        let method = tokens.next().unwrap_or_default().to_string();
        let target = tokens.next().unwrap_or("/").to_string();

        Self { method, target }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// Reads one newline-terminated line from `reader`.
///
/// Returns `Ok(None)` if the peer closed the connection before sending
/// anything. The line terminator, including a preceding `\r`, is stripped.
pub async fn read_request_line<R>(reader: &mut R) -> io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = reader
        .take(MAX_REQUEST_LINE)
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if read as u64 == MAX_REQUEST_LINE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "request line too long",
        ));
    }

    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
