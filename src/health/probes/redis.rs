// src/health/probes/redis.rs
use crate::config::RedisConfig;
use crate::health::Probe;
use crate::retry::RetryPolicy;
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use url::Url;

const DEFAULT_REDIS_PORT: u16 = 6379;

/// Longest status reply accepted, newline included.
const MAX_REPLY_LEN: u64 = 512;

/// Sends a RESP `PING` to a Redis server and expects `+PONG`.
pub struct RedisProbe {
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    retry: Option<RetryPolicy>,
}

impl RedisProbe {
    pub fn new(url: &Url) -> Result<Self> {
        let host = url
            .host_str()
            .ok_or_else(|| anyhow!("redis url has no host: {url}"))?
            .to_string();

        let username = Some(url.username())
            .filter(|u| !u.is_empty())
            .map(str::to_string);

        Ok(Self {
            host,
            port: url.port().unwrap_or(DEFAULT_REDIS_PORT),
            username,
            password: url.password().map(str::to_string),
            retry: None,
        })
    }

    pub fn from_config(config: &RedisConfig) -> Result<Self> {
        let mut probe = Self::new(&config.url)?;
        probe.retry = config.retry.clone().map(RetryPolicy::new);
        Ok(probe)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    async fn ping_once(&self) -> Result<()> {
        let stream = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .with_context(|| format!("failed to connect to redis at {}:{}", self.host, self.port))?;
        let mut stream = BufReader::new(stream);

        if let Some(password) = &self.password {
            let auth = match &self.username {
                Some(user) => encode_command(&["AUTH", user.as_str(), password.as_str()]),
                None => encode_command(&["AUTH", password.as_str()]),
            };
            stream.get_mut().write_all(&auth).await?;
            expect_simple(&mut stream, "OK").await?;
        }

        stream.get_mut().write_all(&encode_command(&["PING"])).await?;
        expect_simple(&mut stream, "PONG").await
    }
}

#[async_trait]
impl Probe for RedisProbe {
    async fn check(&self) -> Result<()> {
        match &self.retry {
            Some(retry) => retry.execute("redis ping", || self.ping_once()).await,
            None => self.ping_once().await,
        }
    }
}

/// RESP array of bulk strings.
fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut buf = format!("*{}\r\n", args.len()).into_bytes();
    for arg in args {
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

async fn expect_simple(stream: &mut BufReader<TcpStream>, expected: &str) -> Result<()> {
    let mut line = String::new();
    let read = (&mut *stream).take(MAX_REPLY_LEN).read_line(&mut line).await?;
    if read == 0 {
        bail!("redis closed the connection");
    }
    if !line.ends_with('\n') && read as u64 >= MAX_REPLY_LEN {
        bail!("redis reply exceeds {MAX_REPLY_LEN} bytes");
    }

    let reply = line.trim_end_matches(['\r', '\n']);
    if reply.strip_prefix('+') == Some(expected) {
        return Ok(());
    }
    match reply.strip_prefix('-') {
        Some(error) => bail!("redis error: {error}"),
        None => bail!("unexpected redis reply: {reply:?}"),
    }
}
