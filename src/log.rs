//! Bridge from the engine's log output into `tracing`.

use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing::Level;

use crate::engine::Engine;

/// Log sink installed in the engine.
pub type LogSink = fn(LogLevel, &str);

/// Engine log verbosity, from quietest to noisiest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(missing_docs)]
pub enum LogLevel {
    None,
    Fatal,
    Error,
    Warning,
    Info,
    Debug,
    Verbose,
}

/// `tracing` max level to engine verbosity.
const FILTER_TABLE: [(LevelFilter, LogLevel); 6] = [
    (LevelFilter::OFF, LogLevel::None),
    (LevelFilter::ERROR, LogLevel::Error),
    (LevelFilter::WARN, LogLevel::Warning),
    (LevelFilter::INFO, LogLevel::Info),
    (LevelFilter::DEBUG, LogLevel::Debug),
    (LevelFilter::TRACE, LogLevel::Verbose),
];

impl LogLevel {
    /// The engine verbosity matching a `tracing` max level filter.
    pub fn from_filter(filter: LevelFilter) -> Self {
        FILTER_TABLE
            .iter()
            .find(|(f, _)| *f == filter)
            .map(|(_, l)| *l)
            .unwrap_or(LogLevel::Verbose)
    }

    /// The engine verbosity matching the currently active `tracing` subscriber.
    pub fn current() -> Self {
        LogLevel::from_filter(LevelFilter::current())
    }

    /// The `tracing` level engine messages of this level are logged at.
    ///
    /// `None` is never logged.
    pub fn to_tracing(self) -> Option<Level> {
        match self {
            LogLevel::None => None,
            LogLevel::Fatal | LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warning => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Verbose => Some(Level::TRACE),
        }
    }
}

static INSTALLED: OnceCell<LogLevel> = OnceCell::new();

/// Install the log bridge in the engine.
///
/// The engine logger is process wide, so only the first call has an effect. Returns the
/// level that is in effect.
pub fn init_logger(engine: &dyn Engine, level: LogLevel) -> LogLevel {
    *INSTALLED.get_or_init(|| {
        debug!("Bridge engine log at {:?}", level);
        engine.init_logger(level, forward);
        level
    })
}

/// The level installed by [`init_logger()`], if any.
pub fn installed_level() -> Option<LogLevel> {
    INSTALLED.get().copied()
}

// Must agree with LogLevel::to_tracing(). The macros need the level statically.
fn forward(level: LogLevel, message: &str) {
    match level {
        LogLevel::None => {}
        LogLevel::Fatal | LogLevel::Error => error!(target: "whip_whep::engine", "{}", message),
        LogLevel::Warning => warn!(target: "whip_whep::engine", "{}", message),
        LogLevel::Info => info!(target: "whip_whep::engine", "{}", message),
        LogLevel::Debug => debug!(target: "whip_whep::engine", "{}", message),
        LogLevel::Verbose => trace!(target: "whip_whep::engine", "{}", message),
    }
}
