//! Operator Console
//!
//! Line-oriented control interface: `start`, `stop`, `clear`, `show`,
//! `stats`, `delete <pattern>` and `help`. Reads from any async line
//! source and writes human-readable output, so the binary wires it to
//! stdin/stdout and tests drive it from byte buffers.

use std::net::SocketAddr;

use chrono::SecondsFormat;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::cache::Cache;
use crate::config::ProxyConfig;
use crate::error::Result;
use crate::proxy::{ProxyHandle, ProxyServer};

const HELP: &str = "\
Commands:
  start             start accepting proxy connections
  stop              stop the proxy and leave the console
  clear             empty the cache
  show              list cached entries
  stats             show cache statistics
  delete <pattern>  remove entries by exact URL or glob (* and ?)
  help              show this message
";

// == Command ==
/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Clear,
    Show,
    Stats,
    Delete(String),
    Help,
    Empty,
    Unknown(String),
}

impl Command {
    /// Parses one input line. The command word is case-insensitive; the
    /// `delete` pattern is kept verbatim.
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        match word.to_ascii_lowercase().as_str() {
            "" => Self::Empty,
            "start" => Self::Start,
            "stop" => Self::Stop,
            "clear" => Self::Clear,
            "show" => Self::Show,
            "stats" => Self::Stats,
            "help" => Self::Help,
            "delete" => Self::Delete(rest.trim().to_string()),
            _ => Self::Unknown(line.to_string()),
        }
    }
}

struct RunningProxy {
    addr: SocketAddr,
    handle: ProxyHandle,
    task: JoinHandle<Result<()>>,
}

// == Console ==
/// Interactive controller for one proxy configuration and one cache.
pub struct Console<W> {
    config: ProxyConfig,
    cache: Cache,
    out: W,
    running: Option<RunningProxy>,
}

impl<W> Console<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(config: ProxyConfig, cache: Cache, out: W) -> Self {
        Self {
            config,
            cache,
            out,
            running: None,
        }
    }

    /// Processes commands from `input` until `stop` or end of input.
    ///
    /// End of input stops a running proxy the same way `stop` does.
    pub async fn run<R>(&mut self, input: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        self.say("Type 'start' to start the proxy, 'stop' to stop it and quit, 'help' for all commands.\n")
            .await?;

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            if !self.execute(Command::parse(&line)).await? {
                return Ok(());
            }
        }

        self.stop().await
    }

    /// Executes one command. Returns false when the console should exit.
    pub async fn execute(&mut self, command: Command) -> Result<bool> {
        match command {
            Command::Start => self.start().await?,
            Command::Stop => {
                self.stop().await?;
                return Ok(false);
            }
            Command::Clear => {
                let cleared = self.cache.clear().await;
                self.say(&format!("Cache cleared ({cleared} entries removed).\n"))
                    .await?;
            }
            Command::Show => self.show().await?,
            Command::Stats => self.stats().await?,
            Command::Delete(pattern) if pattern.is_empty() => {
                self.say("Usage: delete <pattern>\n").await?;
            }
            Command::Delete(pattern) => match self.cache.remove(&pattern).await {
                Ok(0) => {
                    self.say(&format!("No cached entry matches {pattern}\n")).await?;
                }
                Ok(removed) => {
                    self.say(&format!("Removed {removed} entries matching {pattern}\n"))
                        .await?;
                }
                Err(err) => self.say(&format!("{err}\n")).await?,
            },
            Command::Help => self.say(HELP).await?,
            Command::Empty => {}
            Command::Unknown(line) => {
                self.say(&format!("Unknown command: {line} (type 'help')\n"))
                    .await?;
            }
        }
        Ok(true)
    }

    /// Whether a proxy started from this console is still accepting.
    pub fn is_running(&self) -> bool {
        self.running
            .as_ref()
            .is_some_and(|running| !running.task.is_finished())
    }

    /// Address of the running proxy, if any.
    pub fn proxy_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.addr)
    }

    pub fn into_output(self) -> W {
        self.out
    }

    async fn start(&mut self) -> Result<()> {
        if self.is_running() {
            return self.say("The proxy is already running.\n").await;
        }

        let server = match ProxyServer::bind(&self.config, self.cache.clone()).await {
            Ok(server) => server,
            Err(err) => {
                error!(error = %err, "Failed to start proxy");
                return self.say(&format!("Failed to start proxy: {err}\n")).await;
            }
        };

        let addr = server.local_addr();
        let handle = server.handle();
        let task = tokio::spawn(server.run());
        self.running = Some(RunningProxy { addr, handle, task });

        self.say(&format!("Proxy started on {addr}\n")).await
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return self.say("The proxy is not running.\n").await;
        };

        running.handle.stop();
        match running.task.await {
            Ok(Ok(())) => info!(address = %running.addr, "Proxy stopped from console"),
            Ok(Err(err)) => error!(error = %err, "Proxy exited with an error"),
            Err(err) => error!(error = %err, "Proxy task failed"),
        }

        self.say("Proxy stopped.\n").await
    }

    async fn show(&mut self) -> Result<()> {
        let entries = self.cache.entries().await;
        if entries.is_empty() {
            return self.say("The cache is empty.\n").await;
        }

        let mut listing = String::from("Cache contents:\n");
        for entry in entries {
            listing.push_str(&format!(
                "URL: {}\n  Size: {} bytes\n  Type: {}\n  Expires: {}\n",
                entry.key,
                entry.size,
                entry.content_type,
                entry.expires_at.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }
        self.say(&listing).await
    }

    async fn stats(&mut self) -> Result<()> {
        let stats = self.cache.stats().await;
        self.say(&format!(
            "Entries: {}\nResident bytes: {}\nHits: {}\nMisses: {}\nHit rate: {:.1}%\nRejected: {}\nExpired: {}\n",
            stats.total_entries,
            stats.resident_bytes,
            stats.hits,
            stats.misses,
            stats.hit_rate() * 100.0,
            stats.rejected,
            stats.expired
        ))
        .await
    }

    async fn say(&mut self, message: &str) -> Result<()> {
        self.out.write_all(message.as_bytes()).await?;
        self.out.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheStore;
    use bytes::Bytes;
    use std::time::Duration;

    fn test_console() -> (Console<Vec<u8>>, Cache) {
        let cache = Cache::with_store(
            CacheStore::new(100, 1 << 20, Duration::from_secs(300)),
            Duration::from_secs(600),
        );
        let config = ProxyConfig {
            bind_port: 0,
            upstream_port: 1,
            ..ProxyConfig::default()
        };
        (Console::new(config, cache.clone(), Vec::new()), cache)
    }

    fn output(console: Console<Vec<u8>>) -> String {
        String::from_utf8(console.into_output()).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("  START "), Command::Start);
        assert_eq!(Command::parse("stop"), Command::Stop);
        assert_eq!(Command::parse("Show"), Command::Show);
        assert_eq!(Command::parse(""), Command::Empty);
        assert_eq!(
            Command::parse("delete http://H/A.png"),
            Command::Delete("http://H/A.png".to_string())
        );
        assert_eq!(Command::parse("delete"), Command::Delete(String::new()));
        assert_eq!(
            Command::parse("frobnicate now"),
            Command::Unknown("frobnicate now".to_string())
        );
    }

    #[tokio::test]
    async fn test_show_and_clear() {
        let (mut console, cache) = test_console();
        cache
            .add("http://h/a", Bytes::from_static(b"12345"), "text/plain")
            .await;

        console.run(&b"show\nclear\nshow\n"[..]).await.unwrap();

        let out = output(console);
        assert!(out.contains("URL: http://h/a\n  Size: 5 bytes"));
        assert!(out.contains("Cache cleared (1 entries removed)."));
        assert!(out.contains("The cache is empty."));
        assert!(cache.entries().await.is_empty());
    }

    #[tokio::test]
    async fn test_delete_pattern() {
        let (mut console, cache) = test_console();
        cache.add("http://h/a.png", Bytes::from_static(b"1"), "image/png").await;
        cache.add("http://h/b.png", Bytes::from_static(b"2"), "image/png").await;
        cache.add("http://h/c.css", Bytes::from_static(b"3"), "text/css").await;

        console
            .run(&b"delete *.png\ndelete nothing\ndelete\n"[..])
            .await
            .unwrap();

        let out = output(console);
        assert!(out.contains("Removed 2 entries matching *.png"));
        assert!(out.contains("No cached entry matches nothing"));
        assert!(out.contains("Usage: delete <pattern>"));
        assert_eq!(cache.entries().await.len(), 1);
    }

    #[tokio::test]
    async fn test_start_twice_then_stop() {
        let (mut console, _cache) = test_console();

        assert!(console.execute(Command::Start).await.unwrap());
        assert!(console.is_running());
        assert!(console.proxy_addr().is_some());

        assert!(console.execute(Command::Start).await.unwrap());
        assert!(!console.execute(Command::Stop).await.unwrap());
        assert!(!console.is_running());

        let out = output(console);
        assert!(out.contains("Proxy started on 127.0.0.1:"));
        assert!(out.contains("The proxy is already running."));
        assert!(out.contains("Proxy stopped."));
    }

    #[tokio::test]
    async fn test_stop_ends_console_loop() {
        let (mut console, _cache) = test_console();

        console.run(&b"stop\nclear\n"[..]).await.unwrap();

        let out = output(console);
        assert!(out.contains("The proxy is not running."));
        assert!(!out.contains("Cache cleared"));
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let (mut console, _cache) = test_console();
        console.run(&b"dance\n"[..]).await.unwrap();

        assert!(output(console).contains("Unknown command: dance"));
    }
}
