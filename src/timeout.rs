//! Per-attempt deadline scheduling.
//!
//! Each attempt carries up to two one-shot deadlines, both anchored at
//! attempt start: a header deadline, disarmed when response headers arrive,
//! and a whole-request deadline that stays armed until the body is drained
//! or dropped. Expiry abandons the in-flight I/O, which closes the
//! attempt's connection; a closed connection never returns to the pool, so
//! a fired deadline cannot fire twice.

use crate::Error;
use std::time::Duration;
use tokio::time::Instant;

/// The timer that owns an expired deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Timer {
    Header,
    Request,
}

/// One-shot deadlines for a single attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) struct AttemptDeadlines {
    header: Option<Instant>,
    request: Option<Instant>,
    header_timeout: Option<Duration>,
    request_timeout: Option<Duration>,
}

impl AttemptDeadlines {
    /// Arms the timers as of now. `None` leaves the corresponding timer
    /// unarmed.
    pub(crate) fn start(
        header_timeout: Option<Duration>,
        request_timeout: Option<Duration>,
    ) -> Self {
        let now = Instant::now();
        AttemptDeadlines {
            header: header_timeout.map(|timeout| now + timeout),
            request: request_timeout.map(|timeout| now + timeout),
            header_timeout,
            request_timeout,
        }
    }

    /// The deadline in force while waiting for response headers, and the
    /// timer that owns it. When both timers are armed the earlier one wins;
    /// on a tie the header timer is charged, keeping the failure retriable.
    pub(crate) fn header_phase(&self) -> Option<(Instant, Timer)> {
        match (self.header, self.request) {
            (Some(header), Some(request)) if request < header => Some((request, Timer::Request)),
            (Some(header), _) => Some((header, Timer::Header)),
            (None, Some(request)) => Some((request, Timer::Request)),
            (None, None) => None,
        }
    }

    /// The deadline that outlives the header phase and bounds body reads.
    pub(crate) fn body_deadline(&self) -> Option<Instant> {
        self.request
    }

    /// The error surfaced when the given timer fires.
    pub(crate) fn expired(&self, timer: Timer) -> Error {
        match timer {
            Timer::Header => Error::HeaderTimeout {
                timeout: self.header_timeout.unwrap_or_default(),
            },
            Timer::Request => Error::RequestTimeout {
                timeout: self.request_timeout.unwrap_or_default(),
            },
        }
    }
}
