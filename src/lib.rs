//! # Holdfast - a controllable HTTP transport
//!
//! Holdfast wraps a pooled [`reqwest`] client and adds the controls a bare
//! client lacks: dial timeouts, response-header timeouts, whole-request
//! timeouts that stay armed while the body streams, bounded immediate retry
//! of idempotent requests, and a per-attempt statistics hook.
//!
//! ## Quick Start
//!
//! ```no_run
//! use holdfast::Transport;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), holdfast::Error> {
//!     let transport = Transport::builder()
//!         .connect_timeout(Duration::from_secs(1))
//!         .response_header_timeout(Duration::from_secs(5))
//!         .request_timeout(Duration::from_secs(30))
//!         .max_tries(3)
//!         .build()?;
//!
//!     let response = transport.get("https://example.com/answer").await?;
//!     println!("status: {}", response.status());
//!     println!("body: {}", response.text().await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Timeouts
//!
//! Three independent deadlines, each unarmed unless configured:
//!
//! - **connect timeout** - bounds a single TCP dial (TLS included).
//! - **response-header timeout** - bounds the window from request written
//!   to response headers received; disarmed the moment headers arrive.
//! - **request timeout** - bounds the whole round-trip and stays armed
//!   across [`Response`] body reads until the body is drained or dropped.
//!
//! When a deadline fires the attempt's connection is closed and never
//! reused; the resulting error message contains `connection closed`.
//! Dial-phase failures contain `dial`. Both markers are stable and safe to
//! match on.
//!
//! ## Retry
//!
//! Failed attempts are replayed immediately, with no backoff, when all of
//! the following hold: the attempt cap (`max_tries`) is not reached, the
//! method is idempotent (GET, HEAD, OPTIONS, PUT, DELETE, TRACE), and the
//! failure guarantees the server cannot have started acting on the request
//! (dial failure, peer reset before a full response, or a header timeout
//! with nothing received). HTTP status codes are never errors and never
//! retried; a 5xx surfaces as a successful [`Response`].
//!
//! ## Observing attempts
//!
//! A [`StatsHook`] sees one [`Stats`] record per attempt, synchronously,
//! before the transport retries or returns. The last record of a call, and
//! only the last, has `retry.pending == false`.
//!
//! ```no_run
//! use holdfast::{Stats, Transport};
//! use std::sync::Arc;
//!
//! # fn example() -> Result<(), holdfast::Error> {
//! let transport = Transport::builder()
//!     .max_tries(2)
//!     .stats(Arc::new(|stats: &Stats<'_>| {
//!         eprintln!("{}", stats.summary());
//!     }))
//!     .build()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature flags
//!
//! - `cli` - a `clap`-based adapter registering `<prefix>.dial-timeout`,
//!   `<prefix>.response-header-timeout`, `<prefix>.request-timeout`, and
//!   `<prefix>.max-tries` options bound to a [`TransportBuilder`].

#[cfg(feature = "cli")]
pub mod cli;
mod error;
mod request;
mod response;
pub mod retry;
mod stats;
mod timeout;
mod transport;

pub use error::{Error, Result};
pub use request::Request;
pub use response::Response;
pub use retry::RetryPolicy;
pub use stats::{RetryState, Stats, StatsHook};
pub use transport::{Transport, TransportBuilder};
