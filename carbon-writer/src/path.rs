//! Metric path construction.
use crate::sample::Sample;

pub(crate) const DEFAULT_HOST_SEPARATOR: &str = "_";
pub(crate) const DEFAULT_METRIC_SEPARATOR: &str = ".";

/// Settings controlling how metric paths are built.
#[derive(Clone, Debug)]
pub struct PathConfiguration {
    /// Segment placed before the host segment.
    pub prefix: Option<String>,

    /// Segment placed after the host segment.
    pub postfix: Option<String>,

    /// Replacement for dots within the host name.
    pub host_separator: String,

    /// Separator between path segments.
    pub metric_separator: String,

    /// Whether or not sanitized instance segments are lower-cased.
    pub lowercase: bool,
}

impl Default for PathConfiguration {
    fn default() -> Self {
        PathConfiguration {
            prefix: None,
            postfix: None,
            host_separator: DEFAULT_HOST_SEPARATOR.to_string(),
            metric_separator: DEFAULT_METRIC_SEPARATOR.to_string(),
            lowercase: false,
        }
    }
}

impl PathConfiguration {
    /// Sanitizes a free-text field so it can be used as a path segment.
    ///
    /// Surrounding whitespace is trimmed, spaces and dots are replaced with the metric separator, and parentheses are
    /// removed. The result is lower-cased if configured to do so.
    pub fn sanitize(&self, field: &str) -> String {
        let mut sanitized = String::with_capacity(field.len());
        for c in field.trim().chars() {
            match c {
                ' ' | '.' => sanitized.push_str(&self.metric_separator),
                '(' | ')' => {}
                c => sanitized.push(c),
            }
        }

        // Dropping parentheses can expose whitespace at either end, e.g. `(\t)foo`.
        let sanitized = sanitized.trim();
        if self.lowercase {
            sanitized.to_lowercase()
        } else {
            sanitized.to_string()
        }
    }

    /// Builds the path shared by every data source of the given sample.
    ///
    /// The data source name is appended separately via [`MetricPath::with_data_source`].
    pub fn base_path(&self, sample: &Sample) -> MetricPath {
        let mut path = MetricPath::new(&self.metric_separator);

        if let Some(prefix) = &self.prefix {
            path.push(prefix);
        }

        path.push(&sample.host.replace('.', &self.host_separator));

        if let Some(postfix) = &self.postfix {
            path.push(postfix);
        }

        path.push(&sample.plugin);
        if let Some(plugin_instance) = &sample.plugin_instance {
            path.push(&self.sanitize(plugin_instance));
        }

        path.push(&sample.type_name);
        if let Some(type_instance) = &sample.type_instance {
            path.push(&self.sanitize(type_instance));
        }

        path
    }
}

/// A metric path under construction.
///
/// Empty segments are never added, so an absent optional field never leaves behind a doubled separator.
#[derive(Clone, Debug)]
pub struct MetricPath {
    separator: String,
    buf: String,
}

impl MetricPath {
    fn new(separator: &str) -> Self {
        MetricPath { separator: separator.to_string(), buf: String::new() }
    }

    fn push(&mut self, segment: &str) {
        if segment.is_empty() {
            return;
        }

        if !self.buf.is_empty() {
            self.buf.push_str(&self.separator);
        }
        self.buf.push_str(segment);
    }

    /// Returns the full path for the given data source.
    pub fn with_data_source(&self, ds_name: &str) -> String {
        let mut path = self.clone();
        path.push(ds_name);
        path.buf
    }

    /// Returns the path built so far.
    pub fn as_str(&self) -> &str {
        &self.buf
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::PathConfiguration;
    use crate::sample::Sample;

    fn lowercase() -> PathConfiguration {
        PathConfiguration { lowercase: true, ..PathConfiguration::default() }
    }

    fn underscored() -> PathConfiguration {
        PathConfiguration { metric_separator: "_".to_string(), ..PathConfiguration::default() }
    }

    #[test]
    fn sanitize() {
        // Cases are defined as: path configuration, input, expected output.
        let cases = [
            (PathConfiguration::default(), "eth0", "eth0"),
            (PathConfiguration::default(), "  eth0 ", "eth0"),
            (PathConfiguration::default(), "Intel(R) Core", "IntelR.Core"),
            (PathConfiguration::default(), "sda1.part", "sda1.part"),
            (PathConfiguration::default(), "(\t)idle", "idle"),
            (lowercase(), "Intel(R) Core", "intelr.core"),
            (underscored(), "my disk.0", "my_disk_0"),
        ];

        for (config, input, expected) in cases {
            assert_eq!(config.sanitize(input), expected);
        }
    }

    #[test]
    fn base_path() {
        let mut sample = Sample::new("web01.example.com", "cpu", "cpu", 1000, vec![1.0]);
        sample.plugin_instance = Some("0".to_string());
        sample.type_instance = Some("User Time".to_string());

        let config = PathConfiguration::default();
        let path = config.base_path(&sample);
        assert_eq!(path.as_str(), "web01_example_com.cpu.0.cpu.User.Time");
        assert_eq!(path.with_data_source("value"), "web01_example_com.cpu.0.cpu.User.Time.value");

        let config = PathConfiguration {
            prefix: Some("collectd".to_string()),
            postfix: Some("node".to_string()),
            host_separator: "-".to_string(),
            lowercase: true,
            ..PathConfiguration::default()
        };
        let path = config.base_path(&sample);
        assert_eq!(path.with_data_source("value"), "collectd.web01-example-com.node.cpu.0.cpu.user.time.value");
    }

    #[test]
    fn absent_segments_are_omitted() {
        let config = PathConfiguration::default();

        let mut with_instance = Sample::new("h", "p", "t", 0, vec![0.0]);
        with_instance.plugin_instance = Some("i".to_string());
        let without_instance = Sample::new("h", "p", "t", 0, vec![0.0]);

        let with_path = config.base_path(&with_instance).with_data_source("value");
        let without_path = config.base_path(&without_instance).with_data_source("value");
        assert_eq!(with_path.split('.').count(), without_path.split('.').count() + 1);
        assert_eq!(without_path, "h.p.t.value");

        // An instance that sanitizes down to nothing is treated as absent.
        let mut empty_instance = Sample::new("h", "p", "t", 0, vec![0.0]);
        empty_instance.type_instance = Some(" () ".to_string());
        assert_eq!(config.base_path(&empty_instance).with_data_source("value"), "h.p.t.value");
    }

    proptest! {
        #[test]
        fn sanitize_is_idempotent(input in any::<String>(), lower in any::<bool>(), sep in prop_oneof![Just("."), Just("_"), Just("-")]) {
            let config = PathConfiguration {
                metric_separator: sep.to_string(),
                lowercase: lower,
                ..PathConfiguration::default()
            };

            let once = config.sanitize(&input);
            let twice = config.sanitize(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
