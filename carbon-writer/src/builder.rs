use std::{path::PathBuf, sync::Arc, time::Duration};

use quanta::Clock;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    derive::DifferentiationMode,
    dispatch::CarbonWriter,
    forwarder::{sync::Forwarder, ForwarderConfiguration, RemoteAddr},
    path::PathConfiguration,
    state::{State, StateConfiguration},
    telemetry::TelemetryUpdate,
    types::{TypeRegistry, TypesError},
};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);
const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(10);

/// Errors that could occur while building a Carbon writer.
#[derive(Debug, Error)]
pub enum BuildError {
    /// No line receiver host was configured.
    #[error("line receiver host not defined")]
    MissingReceiverHost,

    /// No line receiver port was configured.
    #[error("line receiver port not defined")]
    MissingReceiverPort,

    /// The configured line receiver port is not a valid port.
    #[error("invalid line receiver port '{value}'")]
    InvalidPort {
        /// The invalid value.
        value: String,
    },

    /// The configured metric separator cannot be used.
    #[error("invalid metric separator '{separator}': {reason}")]
    InvalidSeparator {
        /// The invalid separator.
        separator: String,

        /// Why the separator was rejected.
        reason: &'static str,
    },

    /// A configured timeout is zero.
    #[error("{name} must be greater than zero")]
    InvalidTimeout {
        /// Name of the timeout.
        name: &'static str,
    },

    /// A configuration setting that requires a value was given none.
    #[error("setting '{key}' requires a value")]
    MissingSettingValue {
        /// Key of the setting.
        key: String,
    },

    /// A configuration setting was given a value it cannot accept.
    #[error("invalid value '{value}' for setting '{key}'")]
    InvalidSettingValue {
        /// Key of the setting.
        key: String,

        /// The invalid value.
        value: String,
    },

    /// A types database could not be loaded.
    #[error(transparent)]
    Types(#[from] TypesError),
}

/// Builder for a Carbon writer.
pub struct CarbonBuilder {
    receiver_host: Option<String>,
    receiver_port: Option<u16>,
    types_dbs: Vec<PathBuf>,
    type_definitions: Vec<String>,
    differentiate_counters: bool,
    differentiate_over_time: bool,
    path: PathConfiguration,
    connect_timeout: Duration,
    write_timeout: Duration,
    reconnect_backoff: Duration,
    connect_on_build: bool,
    telemetry: bool,
}

impl CarbonBuilder {
    /// Set the host of the line receiver to send metrics to.
    ///
    /// The host name is resolved on every connection attempt. Required.
    #[must_use]
    pub fn with_receiver_host<H>(mut self, host: H) -> Self
    where
        H: Into<String>,
    {
        self.receiver_host = Some(host.into());
        self
    }

    /// Set the port of the line receiver to send metrics to.
    ///
    /// Required.
    #[must_use]
    pub fn with_receiver_port(mut self, port: u16) -> Self {
        self.receiver_port = Some(port);
        self
    }

    /// Adds a types database file to load type definitions from.
    ///
    /// Types databases are loaded in the order they were added, and a type defined in more than one replaces any
    /// earlier definition.
    #[must_use]
    pub fn with_types_db<P>(mut self, path: P) -> Self
    where
        P: Into<PathBuf>,
    {
        self.types_dbs.push(path.into());
        self
    }

    /// Adds type definitions, in the types database format.
    ///
    /// Inline definitions are loaded after all types database files.
    #[must_use]
    pub fn with_type_definitions<S>(mut self, definitions: S) -> Self
    where
        S: Into<String>,
    {
        self.type_definitions.push(definitions.into());
        self
    }

    /// Sets whether or not counters are differentiated.
    ///
    /// When enabled, `COUNTER` and `DERIVE` data sources are reported as the change since their previous value, rather
    /// than as their raw value. The first value of each metric is used as a baseline and is not reported.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_differentiate_counters(mut self, differentiate: bool) -> Self {
        self.differentiate_counters = differentiate;
        self
    }

    /// Sets whether or not counters are differentiated over time.
    ///
    /// When enabled, counters are differentiated as with
    /// [`with_differentiate_counters`](CarbonBuilder::with_differentiate_counters), and the change is further divided by
    /// the number of seconds elapsed since the previous value, producing a per-second rate. Enabling this implies
    /// enabling counter differentiation.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_differentiate_counters_over_time(mut self, over_time: bool) -> Self {
        self.differentiate_over_time = over_time;
        self
    }

    /// Sets whether or not plugin and type instances are lower-cased in metric paths.
    ///
    /// Defaults to `false`.
    #[must_use]
    pub fn with_lowercase_metric_names(mut self, lowercase: bool) -> Self {
        self.path.lowercase = lowercase;
        self
    }

    /// Sets a prefix for all metric paths.
    #[must_use]
    pub fn with_metric_prefix<S>(mut self, prefix: S) -> Self
    where
        S: Into<String>,
    {
        self.path.prefix = Some(prefix.into());
        self
    }

    /// Sets a segment to place after the host segment of all metric paths.
    #[must_use]
    pub fn with_host_postfix<S>(mut self, postfix: S) -> Self
    where
        S: Into<String>,
    {
        self.path.postfix = Some(postfix.into());
        self
    }

    /// Sets the string that replaces dots within host names.
    ///
    /// Defaults to `_`.
    #[must_use]
    pub fn with_host_separator<S>(mut self, separator: S) -> Self
    where
        S: Into<String>,
    {
        self.path.host_separator = separator.into();
        self
    }

    /// Sets the separator between metric path segments.
    ///
    /// The separator also replaces spaces and dots within plugin and type instances. It must not be empty, must not
    /// contain whitespace or parentheses, and may only contain a dot if it is exactly `.`.
    ///
    /// Defaults to `.`.
    #[must_use]
    pub fn with_metric_separator<S>(mut self, separator: S) -> Self
    where
        S: Into<String>,
    {
        self.path.metric_separator = separator.into();
        self
    }

    /// Sets the timeout for connecting to the line receiver.
    ///
    /// The timeout applies to each resolved address in turn. Resolving the host name is not bounded by it: a slow DNS
    /// lookup holds up the connection attempt, and every writer waiting to send, for as long as the system resolver
    /// takes.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the write timeout for sending metrics.
    ///
    /// When the write timeout is reached, the write operation will be aborted, the connection closed, and the lines
    /// being sent at the time will be dropped without retrying.
    ///
    /// Defaults to 1 second.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Sets the minimum time between a failed connection attempt and the next one.
    ///
    /// Samples written while waiting for the next attempt are dropped.
    ///
    /// Defaults to 10 seconds.
    #[must_use]
    pub fn with_reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = backoff;
        self
    }

    /// Sets whether or not to connect to the line receiver when the writer is built.
    ///
    /// A failure to connect at build time is not an error: it is logged, and the reconnect backoff applies to the first
    /// write as it would to any other.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_connect_on_build(mut self, connect: bool) -> Self {
        self.connect_on_build = connect;
        self
    }

    /// Sets whether or not to enable telemetry for the writer.
    ///
    /// When enabled, counters describing the writer's own operation -- lines written and suppressed, payloads sent and
    /// dropped, connection attempts, and so on -- are emitted through the global `metrics` recorder.
    ///
    /// Defaults to `true`.
    #[must_use]
    pub fn with_telemetry(mut self, telemetry: bool) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub(crate) fn differentiation_mode(&self) -> DifferentiationMode {
        if self.differentiate_over_time {
            DifferentiationMode::OverTime
        } else if self.differentiate_counters {
            DifferentiationMode::Delta
        } else {
            DifferentiationMode::Disabled
        }
    }

    fn validate_separator(separator: &str) -> Result<(), BuildError> {
        let reason = if separator.is_empty() {
            "must not be empty"
        } else if separator.chars().any(|c| c.is_whitespace() || c == '(' || c == ')') {
            "must not contain whitespace or parentheses"
        } else if separator != "." && separator.contains('.') {
            "must not contain a dot unless it is exactly '.'"
        } else {
            return Ok(());
        };

        Err(BuildError::InvalidSeparator { separator: separator.to_string(), reason })
    }

    /// Builds the writer.
    ///
    /// All types databases are loaded, and unless disabled, a first connection attempt is made.
    ///
    /// # Errors
    ///
    /// If the line receiver host or port is missing, if any setting is invalid, or if a types database cannot be
    /// read, an error is returned.
    pub fn build(self) -> Result<CarbonWriter, BuildError> {
        self.build_with_clock(Clock::new())
    }

    pub(crate) fn build_with_clock(self, clock: Clock) -> Result<CarbonWriter, BuildError> {
        let host = self.receiver_host.clone().ok_or(BuildError::MissingReceiverHost)?;
        let port = self.receiver_port.ok_or(BuildError::MissingReceiverPort)?;
        if port == 0 {
            return Err(BuildError::InvalidPort { value: port.to_string() });
        }

        Self::validate_separator(&self.path.metric_separator)?;
        for (name, timeout) in [("connect timeout", self.connect_timeout), ("write timeout", self.write_timeout)] {
            if timeout.is_zero() {
                return Err(BuildError::InvalidTimeout { name });
            }
        }

        let mut registry = TypeRegistry::new();
        for path in &self.types_dbs {
            registry.load_file(path)?;
        }
        for definitions in &self.type_definitions {
            registry.load_str(definitions);
        }
        info!(types = registry.len(), "Loaded type definitions.");

        let remote_addr = RemoteAddr::new(host, port);
        let state_config = StateConfiguration {
            path: self.path.clone(),
            differentiation: self.differentiation_mode(),
            telemetry: self.telemetry,
            receiver: remote_addr.to_string(),
        };
        let state = Arc::new(State::new(state_config, registry));

        let forwarder_config = ForwarderConfiguration {
            remote_addr,
            connect_timeout: self.connect_timeout,
            write_timeout: self.write_timeout,
            reconnect_backoff: self.reconnect_backoff,
        };
        let forwarder = Arc::new(Forwarder::new(forwarder_config, clock));

        if self.connect_on_build {
            let mut telemetry = TelemetryUpdate::default();
            if let Err(e) = forwarder.connect(&mut telemetry) {
                debug!(error = %e, "Initial connection attempt failed; will retry on write.");
            }
            state.apply_telemetry(&telemetry);
        }

        Ok(CarbonWriter::new(state, forwarder))
    }
}

impl Default for CarbonBuilder {
    fn default() -> Self {
        CarbonBuilder {
            receiver_host: None,
            receiver_port: None,
            types_dbs: Vec::new(),
            type_definitions: Vec::new(),
            differentiate_counters: false,
            differentiate_over_time: false,
            path: PathConfiguration::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
            connect_on_build: true,
            telemetry: true,
        }
    }
}
