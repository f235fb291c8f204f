//! Proxy Module
//!
//! The connection-handling loop: reads one request line per connection,
//! applies the scheme/target/method policy, answers from the cache or the
//! fixed upstream, and writes a minimal HTTP/1.1 response.

mod request;
mod response;
mod server;
mod upstream;

pub use request::{read_request_line, RequestLine, MAX_REQUEST_LINE};
pub use response::HttpResponse;
pub use server::{ProxyHandle, ProxyServer, RequestHandler, TargetRule};
pub use upstream::{Fetched, UpstreamClient, DEFAULT_CONTENT_TYPE};
