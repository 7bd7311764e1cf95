//! Command-line flag adapter.
//!
//! Registers the transport's tunables on a [`clap::Command`] under a
//! caller-chosen prefix and binds a [`TransportBuilder`] to the parsed
//! values: `<prefix>.dial-timeout`, `<prefix>.response-header-timeout`,
//! `<prefix>.request-timeout`, and `<prefix>.max-tries`. Durations accept
//! humantime syntax (`50ms`, `3s`, `1m`).
//!
//! The adapter is a convenience layer over the builder; the transport is
//! fully usable by direct construction and never reads process-wide state.

use crate::TransportBuilder;
use clap::{Arg, ArgMatches, Command};
use std::time::Duration;

/// Adds the four transport options to `command`, named under `prefix`.
pub fn register(command: Command, prefix: &str) -> Command {
    command
        .arg(duration_arg(
            prefix,
            "dial-timeout",
            "Maximum duration of a single TCP dial",
        ))
        .arg(duration_arg(
            prefix,
            "response-header-timeout",
            "Maximum time from request written to response headers received",
        ))
        .arg(duration_arg(
            prefix,
            "request-timeout",
            "Maximum wall-clock time for the whole round-trip, body included",
        ))
        .arg(
            Arg::new(format!("{prefix}.max-tries"))
                .long(format!("{prefix}.max-tries"))
                .value_name("COUNT")
                .value_parser(clap::value_parser!(u32))
                .help("Upper bound on total attempts for idempotent requests"),
        )
}

fn duration_arg(prefix: &str, name: &str, help: &'static str) -> Arg {
    Arg::new(format!("{prefix}.{name}"))
        .long(format!("{prefix}.{name}"))
        .value_name("DURATION")
        .value_parser(parse_duration)
        .help(help)
}

fn parse_duration(raw: &str) -> Result<Duration, String> {
    humantime::parse_duration(raw).map_err(|err| err.to_string())
}

/// Builds a [`TransportBuilder`] bound to the values parsed for `prefix`.
///
/// Absent options leave the builder's zero-value defaults in place.
pub fn builder_from_matches(matches: &ArgMatches, prefix: &str) -> TransportBuilder {
    let mut builder = TransportBuilder::new();
    if let Some(timeout) = matches.get_one::<Duration>(&format!("{prefix}.dial-timeout")) {
        builder = builder.connect_timeout(*timeout);
    }
    if let Some(timeout) =
        matches.get_one::<Duration>(&format!("{prefix}.response-header-timeout"))
    {
        builder = builder.response_header_timeout(*timeout);
    }
    if let Some(timeout) = matches.get_one::<Duration>(&format!("{prefix}.request-timeout")) {
        builder = builder.request_timeout(*timeout);
    }
    if let Some(tries) = matches.get_one::<u32>(&format!("{prefix}.max-tries")) {
        builder = builder.max_tries(*tries);
    }
    builder
}
