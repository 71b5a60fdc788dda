use lazy_static::lazy_static;
use reqwest::Client;
use std::time::Duration;

lazy_static! {
    /// Shared HTTP client. Reqwest pools connections per host internally,
    /// so one client instance covers every backend we talk to.
    static ref HTTP_CLIENT: Client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .pool_idle_timeout(Duration::from_secs(90))
        .build()
        .unwrap_or_else(|_| Client::new());
}

pub fn http_client() -> Client {
    HTTP_CLIENT.clone()
}

/// Accumulates raw network bytes and releases complete SSE lines.
///
/// Chunk boundaries from the transport do not line up with event boundaries,
/// so a partial line stays buffered until its terminator arrives.
#[derive(Default)]
pub struct SseLineBuffer {
    buf: String,
}

impl SseLineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a decoded chunk and drain every complete line it closes.
    pub fn push(&mut self, chunk: &str) -> Vec<String> {
        self.buf.push_str(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            lines.push(line.trim_end_matches(['\n', '\r']).to_string());
        }
        lines
    }
}

/// Strips the `data:` field prefix from an SSE line, if present.
pub fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|rest| rest.trim_start())
}
