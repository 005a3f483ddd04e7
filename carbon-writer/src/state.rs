use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::{
    derive::{DifferentiationMode, History},
    dispatch::WriteError,
    path::PathConfiguration,
    sample::Sample,
    telemetry::{Telemetry, TelemetryUpdate},
    types::TypeRegistry,
    writer::PayloadWriter,
};

/// Writer state configuration.
pub struct StateConfiguration {
    /// How metric paths are built.
    pub path: PathConfiguration,

    /// Whether and how counters are differentiated.
    pub differentiation: DifferentiationMode,

    /// Whether or not to collect/emit internal telemetry.
    pub telemetry: bool,

    /// Receiver address, used to label internal telemetry.
    pub receiver: String,
}

/// Writer state.
///
/// Holds everything needed to turn samples into lines: the type registry, which is read-only once built, and the
/// history of differentiated metrics, which is guarded by its own lock.
pub(crate) struct State {
    config: StateConfiguration,
    registry: TypeRegistry,
    history: Mutex<History>,
    telemetry: OnceLock<Telemetry>,
}

impl State {
    /// Creates a new `State` from the given configuration and type registry.
    pub fn new(config: StateConfiguration, registry: TypeRegistry) -> Self {
        State { config, registry, history: Mutex::new(History::new()), telemetry: OnceLock::new() }
    }

    /// Returns a reference to the type registry.
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    #[cfg(test)]
    pub fn history(&self) -> &Mutex<History> {
        &self.history
    }

    /// Encodes a sample into metric lines.
    ///
    /// The sample is validated against its type first, and rejected as a whole if it doesn't match. Otherwise, one
    /// line is written per value, except for values the differentiator suppresses. Differentiation history is updated
    /// before this returns, whether or not the lines are ever sent.
    pub fn encode(
        &self,
        sample: &Sample,
        writer: &mut PayloadWriter,
        telemetry: &mut TelemetryUpdate,
    ) -> Result<(), WriteError> {
        let Some(data_sources) = self.registry.lookup(&sample.type_name) else {
            warn!(
                type_name = sample.type_name.as_str(),
                "Unknown type; do you have all your types databases configured?"
            );
            telemetry.track_unknown_type();
            return Err(WriteError::UnknownType { type_name: sample.type_name.clone() });
        };

        if data_sources.len() != sample.values.len() {
            warn!(
                type_name = sample.type_name.as_str(),
                expected = data_sources.len(),
                actual = sample.values.len(),
                "Differing number of values for type."
            );
            telemetry.track_value_count_mismatch();
            return Err(WriteError::ValueCountMismatch {
                type_name: sample.type_name.clone(),
                expected: data_sources.len(),
                actual: sample.values.len(),
            });
        }

        let base_path = self.config.path.base_path(sample);
        let lines_before = writer.len();

        // The lock covers the whole sample so its values are differentiated as one unit.
        let mut history = self.history.lock();
        for (ds, &value) in data_sources.iter().zip(&sample.values) {
            let path = base_path.with_data_source(ds.name());
            match history.derive(&path, value, ds, sample.timestamp, self.config.differentiation) {
                Some(value) => writer.write_line(&path, value, sample.timestamp),
                None => trace!(path = path.as_str(), "Suppressed value with no usable baseline."),
            }
        }
        drop(history);

        let written = writer.len() - lines_before;
        telemetry.track_lines(written, sample.values.len() - written);

        Ok(())
    }

    /// Applies a telemetry update, if telemetry is enabled.
    ///
    /// Telemetry is registered lazily, on the first update, so that it goes to whichever global recorder is installed
    /// by then.
    pub fn apply_telemetry(&self, update: &TelemetryUpdate) {
        if self.config.telemetry && update.had_updates() {
            let telemetry = self.telemetry.get_or_init(|| Telemetry::new(&self.config.receiver));
            telemetry.apply_update(update);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{State, StateConfiguration};
    use crate::{
        derive::DifferentiationMode, dispatch::WriteError, path::PathConfiguration, sample::Sample,
        telemetry::TelemetryUpdate, types::TypeRegistry, writer::PayloadWriter,
    };

    fn state(differentiation: DifferentiationMode) -> State {
        let mut registry = TypeRegistry::new();
        registry.load_str("mytype value:GAUGE:0:100");
        registry.load_str("cnt value:COUNTER:0:U");
        registry.load_str("if_octets rx:DERIVE:0:U, tx:DERIVE:0:U");
        registry.load_str("lc value:gauge:0:U");

        let config = StateConfiguration {
            path: PathConfiguration::default(),
            differentiation,
            telemetry: false,
            receiver: "127.0.0.1:2003".to_string(),
        };
        State::new(config, registry)
    }

    fn encode(state: &State, sample: &Sample) -> Result<String, WriteError> {
        let mut writer = PayloadWriter::new();
        state.encode(sample, &mut writer, &mut TelemetryUpdate::default())?;
        Ok(String::from_utf8(writer.as_bytes().to_vec()).unwrap())
    }

    #[test]
    fn gauge_line() {
        let state = state(DifferentiationMode::Delta);
        let sample = Sample::new("h.a", "p", "mytype", 1000, vec![42.0]);

        assert_eq!(encode(&state, &sample).unwrap(), "h_a.p.mytype.value 42.000000 1000\n");
    }

    #[test]
    fn lower_case_kind() {
        let state = state(DifferentiationMode::Delta);
        let sample = Sample::new("h", "p", "lc", 1000, vec![1.0]);

        assert_eq!(encode(&state, &sample).unwrap(), "h.p.lc.value 1.000000 1000\n");
    }

    #[test]
    fn rejected_samples() {
        let state = state(DifferentiationMode::Delta);

        let unknown = Sample::new("h", "p", "nope", 1000, vec![1.0]);
        assert!(matches!(encode(&state, &unknown), Err(WriteError::UnknownType { .. })));

        let mismatched = Sample::new("h", "if", "if_octets", 1000, vec![1.0]);
        match encode(&state, &mismatched) {
            Err(WriteError::ValueCountMismatch { expected, actual, .. }) => {
                assert_eq!((expected, actual), (2, 1));
            }
            other => panic!("expected value count mismatch, got {other:?}"),
        }

        // Nothing about a rejected sample is recorded.
        assert!(state.history().lock().is_empty());
    }

    #[test]
    fn unlimited_counter_wrap() {
        let state = state(DifferentiationMode::Delta);

        let first = Sample::new("h", "p", "cnt", 1000, vec![5.0]);
        assert_eq!(encode(&state, &first).unwrap(), "");
        assert_eq!(state.history().lock().last_observation("h.p.cnt.value"), Some((1000, 5.0)));

        let wrapped = Sample::new("h", "p", "cnt", 1010, vec![3.0]);
        assert_eq!(encode(&state, &wrapped).unwrap(), "");
        assert_eq!(state.history().lock().last_observation("h.p.cnt.value"), Some((1010, 3.0)));

        let next = Sample::new("h", "p", "cnt", 1020, vec![13.0]);
        assert_eq!(encode(&state, &next).unwrap(), "h.p.cnt.value 10.000000 1020\n");
    }

    #[test]
    fn multiple_data_sources() {
        let state = state(DifferentiationMode::OverTime);

        let sample = Sample::new("h", "interface", "if_octets", 1000, vec![100.0, 200.0]).with_plugin_instance("eth0");
        assert_eq!(encode(&state, &sample).unwrap(), "");

        let sample = Sample::new("h", "interface", "if_octets", 1010, vec![600.0, 300.0]).with_plugin_instance("eth0");
        assert_eq!(
            encode(&state, &sample).unwrap(),
            "h.interface.eth0.if_octets.rx 50.000000 1010\nh.interface.eth0.if_octets.tx 10.000000 1010\n"
        );
    }
}
