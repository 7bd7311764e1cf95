//! The transport core: attempt loop, deadlines, stats, and retry.
//!
//! [`Transport`] wraps a pooled [`reqwest::Client`] and adds the controls
//! the bare client lacks: a dial deadline, a response-header deadline, a
//! whole-request deadline that survives into body reads, bounded immediate
//! retry of idempotent requests, and a synchronous per-attempt stats hook.
//! Use [`TransportBuilder`] to configure and create transports.

use crate::{
    request::Request,
    response::Response,
    retry::RetryPolicy,
    stats::{RetryState, Stats, StatsHook},
    timeout::AttemptDeadlines,
    Error, Result,
};
use http::Method;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use url::Url;

/// A controllable HTTP transport.
///
/// The transport is cheap to clone and designed to be shared across many
/// concurrent callers; per-call state lives on the calling task. Connection
/// pooling, TLS, DNS, and the HTTP/1.1 wire protocol come from the wrapped
/// client.
///
/// # Examples
///
/// ```no_run
/// use holdfast::Transport;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), holdfast::Error> {
/// let transport = Transport::builder()
///     .connect_timeout(Duration::from_secs(1))
///     .response_header_timeout(Duration::from_secs(5))
///     .request_timeout(Duration::from_secs(30))
///     .max_tries(3)
///     .build()?;
///
/// let response = transport.get("http://localhost:8080/answer").await?;
/// let body = response.text().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Transport {
    inner: Arc<TransportInner>,
}

struct TransportInner {
    /// Taken by `close`; `None` refuses new round-trips. In-flight calls
    /// hold their own handle and finish normally.
    client: Mutex<Option<reqwest::Client>>,
    policy: RetryPolicy,
    response_header_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
    stats: Option<StatsHook>,
}

impl Transport {
    /// Creates a new [`TransportBuilder`] with default settings.
    pub fn builder() -> TransportBuilder {
        TransportBuilder::new()
    }

    /// Performs a round-trip, retrying idempotent requests per the
    /// configured policy.
    ///
    /// Each attempt arms fresh header and request deadlines, reports a
    /// [`Stats`] record to the hook, and either returns or replays. The
    /// returned [`Response`] keeps the request deadline armed until its
    /// body is drained or dropped.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let Some(client) = self.client_handle() else {
            return Err(Error::Closed);
        };
        let mut attempt: u32 = 0;
        loop {
            let deadlines = AttemptDeadlines::start(
                self.inner.response_header_timeout,
                self.inner.request_timeout,
            );
            let started = Instant::now();
            tracing::debug!(
                method = %request.method,
                url = %request.url,
                attempt,
                "sending request"
            );
            let outcome = send_once(&client, &request, &deadlines).await;
            let duration = started.elapsed();
            match outcome {
                Ok(response) => {
                    tracing::debug!(
                        status = response.status().as_u16(),
                        attempt,
                        duration_ms = duration.as_millis() as u64,
                        "request succeeded"
                    );
                    self.observe(
                        &request,
                        Some(&response),
                        None,
                        RetryState {
                            count: attempt,
                            pending: false,
                        },
                        duration,
                    );
                    return Ok(Response::new(
                        response,
                        deadlines.body_deadline(),
                        self.inner.request_timeout,
                    ));
                }
                Err(error) => {
                    let pending = self
                        .inner
                        .policy
                        .should_retry(&request.method, &error, attempt);
                    tracing::warn!(
                        error = %error,
                        method = %request.method,
                        url = %request.url,
                        attempt,
                        retry = pending,
                        "attempt failed"
                    );
                    self.observe(
                        &request,
                        None,
                        Some(&error),
                        RetryState {
                            count: attempt,
                            pending,
                        },
                        duration,
                    );
                    if !pending {
                        return Err(error);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Performs a GET round-trip.
    pub async fn get(&self, url: impl AsRef<str>) -> Result<Response> {
        self.execute(Request::new(Method::GET, Url::parse(url.as_ref())?))
            .await
    }

    /// Performs a HEAD round-trip.
    pub async fn head(&self, url: impl AsRef<str>) -> Result<Response> {
        self.execute(Request::new(Method::HEAD, Url::parse(url.as_ref())?))
            .await
    }

    /// Closes the transport.
    ///
    /// Round-trips started after `close` returns fail with
    /// [`Error::Closed`]. In-flight calls are not cancelled: they hold
    /// their own client handle and finish normally, retries included, and
    /// the pool's idle connections are torn down once the last handle
    /// drops. Calling `close` again is a no-op.
    pub fn close(&self) {
        let mut client = self
            .inner
            .client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *client = None;
    }

    fn client_handle(&self) -> Option<reqwest::Client> {
        self.inner
            .client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn observe(
        &self,
        request: &Request,
        response: Option<&reqwest::Response>,
        error: Option<&Error>,
        retry: RetryState,
        duration: Duration,
    ) {
        if let Some(hook) = &self.inner.stats {
            hook(&Stats {
                request,
                response,
                error,
                retry,
                duration,
            });
        }
    }
}

/// One attempt: build, send, and race the header-phase deadline.
///
/// Abandoning the in-flight send on expiry closes the attempt's connection,
/// which is what unblocks any read pending inside the wrapped client.
async fn send_once(
    client: &reqwest::Client,
    request: &Request,
    deadlines: &AttemptDeadlines,
) -> Result<reqwest::Response> {
    let mut pending = client
        .request(request.method.clone(), request.url.clone())
        .headers(request.headers.clone());
    if let Some(body) = &request.body {
        pending = pending.body(body.clone());
    }
    let sent = pending.send();
    let outcome = match deadlines.header_phase() {
        Some((deadline, timer)) => match timeout_at(deadline, sent).await {
            Ok(outcome) => outcome,
            Err(_) => return Err(deadlines.expired(timer)),
        },
        None => sent.await,
    };
    outcome.map_err(|source| {
        if source.is_connect() {
            Error::Connect {
                url: request.url.clone(),
                source,
            }
        } else {
            Error::Request {
                url: request.url.clone(),
                source,
            }
        }
    })
}

/// Builder for configuring and creating a [`Transport`].
///
/// Unset timeouts leave the corresponding deadline unarmed; `max_tries` of
/// `0` or `1` disables retry.
///
/// # Examples
///
/// ```no_run
/// use holdfast::{Stats, Transport};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # fn example() -> Result<(), holdfast::Error> {
/// let transport = Transport::builder()
///     .connect_timeout(Duration::from_secs(1))
///     .max_tries(2)
///     .stats(Arc::new(|stats: &Stats<'_>| {
///         eprintln!("{}", stats.summary());
///     }))
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct TransportBuilder {
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) response_header_timeout: Option<Duration>,
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) max_tries: u32,
    stats: Option<StatsHook>,
    disable_keepalives: bool,
    disable_compression: bool,
    max_idle_conns_per_host: Option<usize>,
    danger_accept_invalid_certs: bool,
    proxy: Option<reqwest::Proxy>,
}

impl TransportBuilder {
    /// Creates a builder with every control at its zero value: no
    /// deadlines, a single attempt, no stats hook.
    pub fn new() -> Self {
        TransportBuilder {
            connect_timeout: None,
            response_header_timeout: None,
            request_timeout: None,
            max_tries: 1,
            stats: None,
            disable_keepalives: false,
            disable_compression: false,
            max_idle_conns_per_host: None,
            danger_accept_invalid_certs: false,
            proxy: None,
        }
    }

    /// Maximum duration of a single TCP dial, TLS handshake included.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Maximum time from the request being written until response headers
    /// are fully received. Disarmed once headers arrive.
    pub fn response_header_timeout(mut self, timeout: Duration) -> Self {
        self.response_header_timeout = Some(timeout);
        self
    }

    /// Maximum wall-clock time for the whole round-trip, body included.
    /// Stays armed until the response body is drained or dropped.
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Upper bound on total attempts, not retries. `0` behaves as `1`.
    pub fn max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Observer invoked synchronously once per attempt.
    pub fn stats(mut self, hook: StatsHook) -> Self {
        self.stats = Some(hook);
        self
    }

    /// Disables connection reuse; every attempt dials fresh.
    pub fn disable_keepalives(mut self) -> Self {
        self.disable_keepalives = true;
        self
    }

    /// Disables transparent response decompression.
    pub fn disable_compression(mut self) -> Self {
        self.disable_compression = true;
        self
    }

    /// Caps idle pooled connections per host.
    pub fn max_idle_conns_per_host(mut self, max: usize) -> Self {
        self.max_idle_conns_per_host = Some(max);
        self
    }

    /// Accepts invalid TLS certificates. Only for tests against
    /// self-signed endpoints.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Routes requests through the given proxy.
    pub fn proxy(mut self, proxy: reqwest::Proxy) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Builds the configured [`Transport`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the wrapped client rejects the
    /// configuration.
    pub fn build(self) -> Result<Transport> {
        let mut client = reqwest::Client::builder();
        if let Some(timeout) = self.connect_timeout {
            client = client.connect_timeout(timeout);
        }
        if self.disable_keepalives {
            client = client.pool_max_idle_per_host(0);
        } else if let Some(max) = self.max_idle_conns_per_host {
            client = client.pool_max_idle_per_host(max);
        }
        client = client.gzip(!self.disable_compression);
        if self.danger_accept_invalid_certs {
            client = client.danger_accept_invalid_certs(true);
        }
        if let Some(proxy) = self.proxy {
            client = client.proxy(proxy);
        }
        let client = client
            .build()
            .map_err(|err| Error::Config(format!("failed to build http client: {err}")))?;

        Ok(Transport {
            inner: Arc::new(TransportInner {
                client: Mutex::new(Some(client)),
                policy: RetryPolicy::new(self.max_tries),
                response_header_timeout: self.response_header_timeout,
                request_timeout: self.request_timeout,
                stats: self.stats,
            }),
        })
    }
}

impl Default for TransportBuilder {
    fn default() -> Self {
        TransportBuilder::new()
    }
}
