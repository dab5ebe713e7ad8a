use std::collections::BTreeMap;
use std::env;
use std::fmt;

#[cfg(test)]
use mockall::automock;
use parking_lot::Mutex;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::Error;
use crate::Result;

/// Verbosity of one datasource, as carried by its `log-level` config leaf.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Error,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parses the config leaf value, e.g. `LOG_LEVEL_DEBUG`.
    pub fn from_config(raw: &str) -> Option<Self> {
        match raw {
            "LOG_LEVEL_ERROR" => Some(LogLevel::Error),
            "LOG_LEVEL_INFO" => Some(LogLevel::Info),
            "LOG_LEVEL_DEBUG" => Some(LogLevel::Debug),
            "LOG_LEVEL_TRACE" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}", self.as_filter())
    }
}

/// Adjusts logging of a single datasource while the process runs.
#[cfg_attr(test, automock)]
pub trait LogLevelControl: Send + Sync {
    /// `None` drops the override and the datasource follows the base filter.
    fn set_datasource_level(
        &self,
        datasource: &str,
        level: Option<LogLevel>,
    ) -> Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLogLevelControl;

impl LogLevelControl for NoopLogLevelControl {
    fn set_datasource_level(
        &self,
        _datasource: &str,
        _level: Option<LogLevel>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Rewrites the process-wide [`EnvFilter`] with one span directive per
/// datasource override, matching the `datasource` span every run is
/// instrumented with.
pub struct ReloadLogLevelControl {
    base: String,
    handle: reload::Handle<EnvFilter, Registry>,
    levels: Mutex<BTreeMap<String, LogLevel>>,
}

impl ReloadLogLevelControl {
    pub fn new(
        base: impl Into<String>,
        handle: reload::Handle<EnvFilter, Registry>,
    ) -> Self {
        Self {
            base: base.into(),
            handle,
            levels: Mutex::new(BTreeMap::new()),
        }
    }
}

impl LogLevelControl for ReloadLogLevelControl {
    fn set_datasource_level(
        &self,
        datasource: &str,
        level: Option<LogLevel>,
    ) -> Result<()> {
        let mut levels = self.levels.lock();
        let changed = match level {
            Some(level) => levels.insert(datasource.to_string(), level) != Some(level),
            None => levels.remove(datasource).is_some(),
        };
        if !changed {
            return Ok(());
        }

        let directives = datasource_directives(&self.base, &levels);
        let filter = EnvFilter::try_new(&directives)
            .map_err(|e| Error::Fatal(format!("invalid log filter {:?}: {}", directives, e)))?;
        self.handle
            .reload(filter)
            .map_err(|e| Error::Fatal(format!("failed to reload log filter: {}", e)))
    }
}

/// `base` followed by `[datasource{datasource=<name>}]=<level>` per entry.
pub(crate) fn datasource_directives(
    base: &str,
    levels: &BTreeMap<String, LogLevel>,
) -> String {
    let mut directives: Vec<String> = Vec::with_capacity(levels.len() + 1);
    if !base.is_empty() {
        directives.push(base.to_string());
    }
    for (name, level) in levels {
        directives.push(format!("[datasource{{datasource={}}}]={}", name, level));
    }
    directives.join(",")
}

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` when the variable is unset or invalid.
///
/// The returned control rewrites the filter when datasources change their
/// `log-level`.
pub fn init_observability(default_filter: &str) -> Result<ReloadLogLevelControl> {
    let from_env = env::var(EnvFilter::DEFAULT_ENV)
        .ok()
        .and_then(|raw| EnvFilter::try_new(&raw).ok().map(|filter| (raw, filter)));
    let (base, filter) = match from_env {
        Some(found) => found,
        None => {
            let filter = EnvFilter::try_new(default_filter).map_err(|e| {
                Error::Fatal(format!("invalid log filter {:?}: {}", default_filter, e))
            })?;
            (default_filter.to_string(), filter)
        }
    };

    let (filter, handle) = reload::Layer::new(filter);
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| Error::Fatal(format!("failed to install tracing subscriber: {}", e)))?;

    Ok(ReloadLogLevelControl::new(base, handle))
}
