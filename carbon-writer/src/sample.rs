/// A single observation delivered by the host collector.
///
/// Each value corresponds, by position, to one data source declared for the sample's type.
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Host the sample was collected on.
    pub host: String,

    /// Name of the plugin that collected the sample.
    pub plugin: String,

    /// Optional plugin instance, such as a CPU index or interface name.
    pub plugin_instance: Option<String>,

    /// Name of the sample's type, which must be known to the writer's type registry.
    pub type_name: String,

    /// Optional type instance, such as `user` for a CPU time sample.
    pub type_instance: Option<String>,

    /// Collection time, in seconds since the Unix epoch.
    pub timestamp: u64,

    /// Raw values, one per data source.
    pub values: Vec<f64>,
}

impl Sample {
    /// Creates a new `Sample` without plugin or type instances.
    pub fn new<H, P, T>(host: H, plugin: P, type_name: T, timestamp: u64, values: Vec<f64>) -> Self
    where
        H: Into<String>,
        P: Into<String>,
        T: Into<String>,
    {
        Sample {
            host: host.into(),
            plugin: plugin.into(),
            plugin_instance: None,
            type_name: type_name.into(),
            type_instance: None,
            timestamp,
            values,
        }
    }

    /// Sets the plugin instance.
    #[must_use]
    pub fn with_plugin_instance<S>(mut self, plugin_instance: S) -> Self
    where
        S: Into<String>,
    {
        self.plugin_instance = Some(plugin_instance.into());
        self
    }

    /// Sets the type instance.
    #[must_use]
    pub fn with_type_instance<S>(mut self, type_instance: S) -> Self
    where
        S: Into<String>,
    {
        self.type_instance = Some(type_instance.into());
        self
    }
}
