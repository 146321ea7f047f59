//! Configuration for tracing behavior.

/// Configuration options for datasource tracing.
///
/// # Example
///
/// ```rust
/// use datasource_tracing::TracingConfig;
///
/// let config = TracingConfig::default()
///     .with_fetch_tracing(false)
///     .with_parameter_values(true);
/// ```
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Whether connection acquisition and lifetime get their own span.
    /// Default: `true`
    pub trace_connection: bool,

    /// Whether each statement execution gets its own span.
    /// Default: `true`
    pub trace_query: bool,

    /// Whether result-set iteration gets its own span.
    /// Default: `true`
    pub trace_fetch: bool,

    /// Whether to prefer the parameter-substituted SQL rendering, when the
    /// driver provides one, over the raw statement text in span tags.
    /// Default: `false` (parameter values may contain sensitive data)
    pub include_parameter_values: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            trace_connection: true,
            trace_query: true,
            trace_fetch: true,
            include_parameter_values: false,
        }
    }
}

impl TracingConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable connection-level spans.
    pub fn with_connection_tracing(mut self, enabled: bool) -> Self {
        self.trace_connection = enabled;
        self
    }

    /// Enable or disable statement-level spans.
    pub fn with_query_tracing(mut self, enabled: bool) -> Self {
        self.trace_query = enabled;
        self
    }

    /// Enable or disable result-set-level spans.
    pub fn with_fetch_tracing(mut self, enabled: bool) -> Self {
        self.trace_fetch = enabled;
        self
    }

    /// Enable or disable parameter values in the SQL span tag.
    ///
    /// **Security Warning**: parameter values often contain user input and
    /// potentially sensitive data. Only enable in controlled environments.
    pub fn with_parameter_values(mut self, enabled: bool) -> Self {
        self.include_parameter_values = enabled;
        self
    }
}
