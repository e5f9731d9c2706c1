use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tokio::time::sleep;
use tracing::warn;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0.0.0 Safari/537.36";

/// Outcome of a single attempt against the transport.
#[derive(Debug, thiserror::Error)]
pub enum AttemptError {
    #[error("rate limited (429)")]
    RateLimited,
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("connection error: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
}

#[async_trait]
pub trait PageTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<String, AttemptError>;
}

pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build http client");

        Self { client }
    }
}

#[async_trait]
impl PageTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<String, AttemptError> {
        let res = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => return Err(AttemptError::Timeout),
            Err(e) => return Err(AttemptError::Connection(e.to_string())),
        };

        match res.status() {
            StatusCode::OK => res
                .text()
                .await
                .map_err(|e| AttemptError::Connection(e.to_string())),
            StatusCode::TOO_MANY_REQUESTS => Err(AttemptError::RateLimited),
            status => Err(AttemptError::HttpStatus(status.as_u16())),
        }
    }
}

/// Gave up on a URL after exhausting every retry. Callers decide whether
/// this ends the page loop or the whole source.
#[derive(Debug, thiserror::Error)]
#[error("failed to fetch {url} after {attempts} attempts: {last_error}")]
pub struct FetchFailure {
    pub url: String,
    pub attempts: u32,
    pub last_error: String,
}

pub struct Fetcher<T> {
    transport: T,
    max_retries: u32,
    initial_backoff: Duration,
    backoff_factor: u32,
}

impl<T: PageTransport> Fetcher<T> {
    pub fn new(
        transport: T,
        max_retries: u32,
        initial_backoff: Duration,
        backoff_factor: u32,
    ) -> Self {
        Self {
            transport,
            max_retries,
            initial_backoff,
            backoff_factor,
        }
    }

    pub async fn fetch(&self, url: &str) -> Result<String, FetchFailure> {
        let mut delay = self.initial_backoff;
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=self.max_retries {
            match self.transport.get(url).await {
                Ok(body) => return Ok(body),
                Err(AttemptError::HttpStatus(code)) => {
                    // Transient, but no forced wait before the next try.
                    warn!(url, code, attempt, "Request failed, retrying");
                    last_error = format!("http status {}", code);
                }
                Err(e) => {
                    warn!(
                        url,
                        error = %e,
                        attempt,
                        delay_secs = delay.as_secs_f64(),
                        "Transient fetch error, backing off"
                    );
                    last_error = e.to_string();
                    sleep(delay).await;
                    delay *= self.backoff_factor;
                }
            }
        }

        Err(FetchFailure {
            url: url.to_string(),
            attempts: self.max_retries,
            last_error,
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use super::{AttemptError, PageTransport};

    /// Replays a fixed sequence of attempt outcomes and records when each
    /// attempt happened. Clones share state, so a test can keep a handle
    /// after moving one into a `Fetcher`.
    #[derive(Clone)]
    pub(crate) struct ScriptedTransport {
        script: Arc<Mutex<VecDeque<Result<String, AttemptError>>>>,
        calls: Arc<Mutex<Vec<Instant>>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new(script: Vec<Result<String, AttemptError>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script.into())),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub(crate) fn attempts(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub(crate) fn call_instants(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PageTransport for ScriptedTransport {
        async fn get(&self, _url: &str) -> Result<String, AttemptError> {
            self.calls.lock().unwrap().push(Instant::now());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("scripted transport ran out of responses")
        }
    }
}
