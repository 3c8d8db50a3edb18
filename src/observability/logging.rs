//! Subscriber setup for applications embedding invoker chains.
//!
//! Chain events are emitted under the `integrations_client_invoker` target.
//! [`LoggingConfig`] sets the level for that target separately from the
//! level applied to everything else, so an application can turn on retry
//! and teardown diagnostics without raising its own verbosity.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Target under which every chain event is emitted.
pub const LOG_TARGET: &str = "integrations_client_invoker";

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Level for chain events (`integrations_client_invoker`)
    pub level: LogLevel,
    /// Level for every other target, unless `RUST_LOG` overrides it
    pub default_level: LogLevel,
    /// Output format
    pub format: LogFormat,
    /// Whether to print the event target
    pub include_target: bool,
    /// Extra `EnvFilter` directives, e.g. `"my_app::orders=trace"`
    pub directives: Vec<String>,
}

/// Minimum level of events to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Every lifecycle transition and cache lookup
    Trace,
    /// Client open/close/abort and cache hits
    Debug,
    /// Invocation start and completion
    Info,
    /// Retries, timeouts and teardown failures
    Warn,
    /// Failed invocations and exhausted retry budgets
    Error,
}

impl LogLevel {
    /// Directive spelling of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Multi-line, colored output for development
    Pretty,
    /// One JSON object per event, with `client`, `attempt` and `elapsed_ms`
    /// as top-level keys
    Json,
    /// Single-line output
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            default_level: LogLevel::Warn,
            format: LogFormat::Compact,
            include_target: true,
            directives: Vec::new(),
        }
    }
}

impl LoggingConfig {
    /// Creates a configuration logging chain events at `info` and everything
    /// else at `warn`
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the level for chain events
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Sets the level for every other target
    pub fn with_default_level(mut self, level: LogLevel) -> Self {
        self.default_level = level;
        self
    }

    /// Sets the output format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Sets whether to print the event target
    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    /// Adds an `EnvFilter` directive
    pub fn with_directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    /// Directives applied on top of the base filter, chain target first.
    pub fn filter_directives(&self) -> Vec<String> {
        let mut directives = vec![format!("{}={}", LOG_TARGET, self.level.as_str())];
        directives.extend(self.directives.iter().cloned());
        directives
    }

    /// Builds the filter on top of `base`.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the extra directives does not parse.
    pub fn build_filter(
        &self,
        base: EnvFilter,
    ) -> Result<EnvFilter, Box<dyn std::error::Error>> {
        let mut filter = base;
        for directive in self.filter_directives() {
            filter = filter.add_directive(directive.parse::<Directive>()?);
        }
        Ok(filter)
    }

    /// Installs the global subscriber.
    ///
    /// `RUST_LOG`, when set, replaces `default_level` as the base filter. The
    /// chain target level and extra directives are always applied.
    ///
    /// ```no_run
    /// use integrations_client_invoker::observability::{LogFormat, LogLevel, LoggingConfig};
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// LoggingConfig::new()
    ///     .with_level(LogLevel::Debug)
    ///     .with_format(LogFormat::Json)
    ///     .init()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns an error if a directive does not parse or a global subscriber
    /// is already installed.
    pub fn init(self) -> Result<(), Box<dyn std::error::Error>> {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.default_level.as_str()));
        let filter = self.build_filter(base)?;
        let registry = tracing_subscriber::registry().with(filter);

        match self.format {
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_target(self.include_target))
                .try_init()?,
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_target(self.include_target),
                )
                .try_init()?,
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_target(self.include_target))
                .try_init()?,
        }

        Ok(())
    }
}
