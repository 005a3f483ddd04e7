//! A writer for sending typed metric samples to a [Graphite][graphite]/Carbon line receiver.
//!
//! [graphite]: https://graphite.readthedocs.io/en/latest/feeding-carbon.html
//!
//! # Usage
//!
//! ```no_run
//! # use carbon_writer::{CarbonBuilder, Sample};
//! // First, create a builder.
//! //
//! // The line receiver host and port are required. Types databases describe how many values each sample of a given
//! // type carries, and how each value should be interpreted.
//! let writer = CarbonBuilder::default()
//!     .with_receiver_host("graphite.example.com")
//!     .with_receiver_port(2003)
//!     .with_types_db("/usr/share/collectd/types.db")
//!     .with_differentiate_counters(true)
//!     .build()
//!     .expect("failed to build writer");
//!
//! // Samples are written one at a time, or in batches. Each value of a sample becomes one line.
//! let sample = Sample::new("web01.example.com", "load", "load", 1_700_000_000, vec![0.42, 0.38, 0.35]);
//! match writer.write(&sample) {
//!     Ok(lines) => println!("sent {lines} lines"),
//!     Err(e) => eprintln!("sample dropped: {e}"),
//! }
//! ```
//!
//! The writer can also be configured from collectd-style key/value settings: see the [`config`] module.
//!
//! # Features
//!
//! ## Metric paths
//!
//! Each value is written as `<prefix>.<host><postfix>.<plugin>.<plugin instance>.<type>.<type instance>.<data source>`,
//! with absent segments left out entirely. Dots in the host name are replaced with the host separator, and spaces, dots
//! and parentheses in the instances are cleaned up so that they can't introduce extra path segments.
//!
//! ## Counter differentiation
//!
//! `COUNTER` and `DERIVE` data sources can be reported as the change since their previous value, or as a per-second
//! rate, instead of as their ever-increasing raw value. Counters that wrap around their declared maximum are handled,
//! and counters without a known maximum simply start over from their new value.
//!
//! ## Reconnection
//!
//! The writer connects on demand. When the line receiver cannot be reached, connection attempts are limited to one per
//! reconnect backoff window (10 seconds by default), and samples written in between are dropped rather than queued.
//!
//! ## Telemetry
//!
//! The writer captures its own internal telemetry, such as lines written and suppressed, payloads sent and dropped,
//! and connection attempts. It is emitted through the global [`metrics`] recorder, under the `carbon_writer`
//! namespace.
//!
//! # Missing
//!
//! ## Buffering
//!
//! Lines that can't be delivered are dropped. There is no queue to hold them until the line receiver is reachable
//! again.
//!
//! ## Asynchronous backend
//!
//! Connecting and sending happen on the calling thread, bounded by the connect and write timeouts.

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::struct_excessive_bools)]
#![deny(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]

mod builder;
pub use self::builder::{BuildError, CarbonBuilder};

pub mod config;

mod derive;
pub use self::derive::{DifferentiationMode, History};

mod dispatch;
pub use self::dispatch::{BatchSummary, CarbonWriter, WriteError};

mod forwarder;
pub use self::forwarder::{ForwardError, RemoteAddr};

mod path;
pub use self::path::{MetricPath, PathConfiguration};

mod sample;
pub use self::sample::Sample;

mod state;
mod telemetry;

mod types;
pub use self::types::{Bound, DataSource, DataSourceKind, TypeRegistry, TypesError};

mod writer;
pub use self::writer::{format_line, parse_line};
