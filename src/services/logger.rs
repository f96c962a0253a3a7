use crate::utils::flags::parse_bool;
use crate::utils::redact::redact_fields;
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Fatal,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Fatal => "fatal",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Verbosity presets selected by `VANTA_MCP_LOG_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Quiet,
    Minimal,
    Verbose,
    All,
}

impl LogMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "quiet" => Some(LogMode::Quiet),
            "minimal" => Some(LogMode::Minimal),
            "verbose" => Some(LogMode::Verbose),
            "all" => Some(LogMode::All),
            _ => None,
        }
    }

    pub fn resolve(level: Option<&str>, verbose: Option<&str>) -> Self {
        if let Some(raw) = level {
            return LogMode::parse(raw).unwrap_or(LogMode::Minimal);
        }
        if parse_bool(verbose, false) {
            return LogMode::Verbose;
        }
        LogMode::Minimal
    }

    pub fn from_env() -> Self {
        let level = std::env::var("VANTA_MCP_LOG_LEVEL").ok();
        let verbose = std::env::var("VANTA_MCP_VERBOSE").ok();
        LogMode::resolve(level.as_deref(), verbose.as_deref())
    }

    fn ceiling(self) -> LogLevel {
        match self {
            LogMode::Quiet => LogLevel::Error,
            LogMode::Minimal => LogLevel::Info,
            LogMode::Verbose => LogLevel::Debug,
            LogMode::All => LogLevel::Trace,
        }
    }

    pub fn allows(self, level: LogLevel) -> bool {
        level <= self.ceiling()
    }
}

pub type Sink = Arc<dyn Fn(&str) + Send + Sync>;

fn stderr_sink() -> Sink {
    Arc::new(|line: &str| eprintln!("{}", line))
}

/// JSON-lines logger on stderr. stdout belongs to the MCP transport.
#[derive(Clone)]
pub struct Logger {
    context: String,
    mode: LogMode,
    sink: Sink,
}

impl std::fmt::Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("context", &self.context)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Logger {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
            mode: LogMode::from_env(),
            sink: stderr_sink(),
        }
    }

    pub fn with_sink(context: &str, mode: LogMode, sink: Sink) -> Self {
        Self {
            context: context.to_string(),
            mode,
            sink,
        }
    }

    pub fn child(&self, suffix: &str) -> Self {
        let context = if suffix.is_empty() {
            self.context.clone()
        } else {
            format!("{}:{}", self.context, suffix)
        };
        Self {
            context,
            mode: self.mode,
            sink: self.sink.clone(),
        }
    }

    pub fn mode(&self) -> LogMode {
        self.mode
    }

    fn log(&self, level: LogLevel, event: &str, message: &str, fields: Option<&Value>) {
        if !self.mode.allows(level) {
            return;
        }
        let mut entry = serde_json::json!({
            "ts": chrono::Utc::now().to_rfc3339(),
            "level": level.as_str(),
            "context": self.context,
            "event": event,
            "msg": message,
        });
        if let (Some(fields), Value::Object(map)) = (fields, &mut entry) {
            if !fields.is_null() {
                map.insert("fields".to_string(), redact_fields(fields));
            }
        }
        if let Ok(line) = serde_json::to_string(&entry) {
            (self.sink)(&line);
        }
    }

    pub fn fatal(&self, event: &str, message: &str, fields: Option<&Value>) {
        self.log(LogLevel::Fatal, event, message, fields);
    }

    pub fn error(&self, event: &str, message: &str, fields: Option<&Value>) {
        self.log(LogLevel::Error, event, message, fields);
    }

    pub fn warn(&self, event: &str, message: &str, fields: Option<&Value>) {
        self.log(LogLevel::Warn, event, message, fields);
    }

    pub fn info(&self, event: &str, message: &str, fields: Option<&Value>) {
        self.log(LogLevel::Info, event, message, fields);
    }

    pub fn debug(&self, event: &str, message: &str, fields: Option<&Value>) {
        self.log(LogLevel::Debug, event, message, fields);
    }

    pub fn trace(&self, event: &str, message: &str, fields: Option<&Value>) {
        self.log(LogLevel::Trace, event, message, fields);
    }
}
