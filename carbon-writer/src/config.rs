//! Key/value configuration, in the style of a collectd `<Plugin>` block.
//!
//! Each [`Setting`] is a key followed by zero or more values, and is applied on top of a [`CarbonBuilder`]:
//!
//! ```no_run
//! # use carbon_writer::{config::Setting, CarbonBuilder};
//! let settings = [
//!     Setting::new("LineReceiverHost", ["graphite.example.com"]),
//!     Setting::new("LineReceiverPort", ["2003"]),
//!     Setting::new("TypesDB", ["/usr/share/collectd/types.db"]),
//!     Setting::flag("DifferentiateCounters"),
//! ];
//!
//! let writer = CarbonBuilder::from_settings(&settings)
//!     .and_then(CarbonBuilder::build)
//!     .expect("failed to build writer");
//! ```
//!
//! Keys are case-sensitive:
//!
//! | Key                             | Values                    | Builder method                                   |
//! |---------------------------------|---------------------------|--------------------------------------------------|
//! | `LineReceiverHost`              | host                      | [`with_receiver_host`][CarbonBuilder::with_receiver_host] |
//! | `LineReceiverPort`              | port                      | [`with_receiver_port`][CarbonBuilder::with_receiver_port] |
//! | `TypesDB`                       | one or more paths         | [`with_types_db`][CarbonBuilder::with_types_db]  |
//! | `DifferentiateCounters`         | optional boolean          | [`with_differentiate_counters`][CarbonBuilder::with_differentiate_counters] |
//! | `DeriveCounters`                | optional boolean          | same as `DifferentiateCounters`                  |
//! | `DifferentiateCountersOverTime` | optional boolean          | [`with_differentiate_counters_over_time`][CarbonBuilder::with_differentiate_counters_over_time] |
//! | `LowercaseMetricNames`          | optional boolean          | [`with_lowercase_metric_names`][CarbonBuilder::with_lowercase_metric_names] |
//! | `MetricPrefix`                  | prefix                    | [`with_metric_prefix`][CarbonBuilder::with_metric_prefix] |
//! | `HostPostfix`                   | postfix                   | [`with_host_postfix`][CarbonBuilder::with_host_postfix] |
//! | `HostSeparator`                 | separator                 | [`with_host_separator`][CarbonBuilder::with_host_separator] |
//! | `MetricSeparator`               | separator                 | [`with_metric_separator`][CarbonBuilder::with_metric_separator] |
//!
//! A boolean key given without a value is `true`. Unknown keys are ignored.

use tracing::debug;

use crate::builder::{BuildError, CarbonBuilder};

/// A single configuration setting.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Setting {
    key: String,
    values: Vec<String>,
}

impl Setting {
    /// Creates a new `Setting` with the given key and values.
    pub fn new<K, I, V>(key: K, values: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        Setting { key: key.into(), values: values.into_iter().map(Into::into).collect() }
    }

    /// Creates a new `Setting` with the given key and no values.
    pub fn flag<K>(key: K) -> Self
    where
        K: Into<String>,
    {
        Setting { key: key.into(), values: Vec::new() }
    }

    /// Returns the key of the setting.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the values of the setting.
    pub fn values(&self) -> &[String] {
        &self.values
    }

    fn single_value(&self) -> Result<&str, BuildError> {
        self.values
            .first()
            .map(String::as_str)
            .ok_or_else(|| BuildError::MissingSettingValue { key: self.key.clone() })
    }

    fn bool_value(&self) -> Result<bool, BuildError> {
        let Some(value) = self.values.first() else {
            return Ok(true);
        };

        match value.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" => Ok(true),
            "false" | "no" | "off" => Ok(false),
            _ => Err(BuildError::InvalidSettingValue { key: self.key.clone(), value: value.clone() }),
        }
    }
}

impl CarbonBuilder {
    /// Creates a builder from the given settings.
    ///
    /// Settings are applied in order, so a key given more than once takes its last value, except for `TypesDB`, whose
    /// paths accumulate. Required settings are only checked when the writer is built.
    ///
    /// # Errors
    ///
    /// If a setting is missing its value, or has a value that cannot be parsed, an error is returned.
    pub fn from_settings<'a, I>(settings: I) -> Result<Self, BuildError>
    where
        I: IntoIterator<Item = &'a Setting>,
    {
        settings.into_iter().try_fold(CarbonBuilder::default(), CarbonBuilder::apply_setting)
    }

    /// Applies a single setting to the builder.
    ///
    /// # Errors
    ///
    /// If the setting is missing its value, or has a value that cannot be parsed, an error is returned.
    pub fn apply_setting(self, setting: &Setting) -> Result<Self, BuildError> {
        let builder = match setting.key() {
            "LineReceiverHost" => self.with_receiver_host(setting.single_value()?),
            "LineReceiverPort" => {
                let value = setting.single_value()?;
                let port = value.trim().parse().map_err(|_| BuildError::InvalidPort { value: value.to_string() })?;
                self.with_receiver_port(port)
            }
            "TypesDB" => {
                if setting.values().is_empty() {
                    return Err(BuildError::MissingSettingValue { key: setting.key().to_string() });
                }
                setting.values().iter().fold(self, |builder, path| builder.with_types_db(path))
            }
            "DifferentiateCounters" | "DeriveCounters" => self.with_differentiate_counters(setting.bool_value()?),
            "DifferentiateCountersOverTime" => self.with_differentiate_counters_over_time(setting.bool_value()?),
            "LowercaseMetricNames" => self.with_lowercase_metric_names(setting.bool_value()?),
            "MetricPrefix" => self.with_metric_prefix(setting.single_value()?),
            "HostPostfix" => self.with_host_postfix(setting.single_value()?),
            "HostSeparator" => self.with_host_separator(setting.single_value()?),
            "MetricSeparator" => self.with_metric_separator(setting.single_value()?),
            key => {
                debug!(key, "Ignoring unknown setting.");
                self
            }
        };

        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::Setting;
    use crate::{
        builder::{BuildError, CarbonBuilder},
        derive::DifferentiationMode,
    };

    #[test]
    fn bool_values() {
        assert!(Setting::flag("DeriveCounters").bool_value().unwrap());
        assert!(Setting::new("DeriveCounters", ["True"]).bool_value().unwrap());
        assert!(!Setting::new("DeriveCounters", ["false"]).bool_value().unwrap());

        let result = Setting::new("DeriveCounters", ["maybe"]).bool_value();
        assert!(matches!(result, Err(BuildError::InvalidSettingValue { .. })));
    }

    #[test]
    fn differentiation_settings() {
        let builder = CarbonBuilder::from_settings(&[Setting::flag("DeriveCounters")]).unwrap();
        assert_eq!(builder.differentiation_mode(), DifferentiationMode::Delta);

        let builder = CarbonBuilder::from_settings(&[Setting::flag("DifferentiateCountersOverTime")]).unwrap();
        assert_eq!(builder.differentiation_mode(), DifferentiationMode::OverTime);

        let settings = [Setting::flag("DifferentiateCounters"), Setting::new("DifferentiateCounters", ["no"])];
        let builder = CarbonBuilder::from_settings(&settings).unwrap();
        assert_eq!(builder.differentiation_mode(), DifferentiationMode::Disabled);
    }

    #[test]
    fn invalid_settings() {
        let result = CarbonBuilder::from_settings(&[Setting::new("LineReceiverPort", ["graphite"])]);
        assert!(matches!(result, Err(BuildError::InvalidPort { value }) if value == "graphite"));

        let result = CarbonBuilder::from_settings(&[Setting::new("LineReceiverPort", ["70000"])]);
        assert!(matches!(result, Err(BuildError::InvalidPort { .. })));

        let result = CarbonBuilder::from_settings(&[Setting::flag("LineReceiverHost")]);
        assert!(matches!(result, Err(BuildError::MissingSettingValue { key }) if key == "LineReceiverHost"));

        let result = CarbonBuilder::from_settings(&[Setting::flag("TypesDB")]);
        assert!(matches!(result, Err(BuildError::MissingSettingValue { .. })));
    }

    #[test]
    fn required_settings_checked_at_build() {
        let settings = [Setting::new("LineReceiverHost", ["localhost"]), Setting::new("SomethingElse", ["1"])];
        let builder = CarbonBuilder::from_settings(&settings).unwrap();
        assert!(matches!(builder.build(), Err(BuildError::MissingReceiverPort)));
    }

    #[test]
    fn full_configuration() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port().to_string();

        let settings = [
            Setting::new("LineReceiverHost", ["127.0.0.1"]),
            Setting::new("LineReceiverPort", [port.as_str()]),
            Setting::new("MetricPrefix", ["collectd"]),
            Setting::new("HostPostfix", ["dc1"]),
            Setting::new("HostSeparator", ["-"]),
            Setting::new("MetricSeparator", ["_"]),
            Setting::flag("LowercaseMetricNames"),
        ];
        let writer = CarbonBuilder::from_settings(&settings).unwrap().with_telemetry(false).build().unwrap();
        assert!(writer.is_connected());
    }
}
