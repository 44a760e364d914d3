//! User-facing notifications.
//!
//! Every failure, warning and confirmation the desk shows is a `Notice`.
//! Transient notices fade on their own; durable ones stay until dismissed.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dismissal {
    AfterSeconds(u32),
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: Level,
    pub message: String,
    pub dismissal: Dismissal,
    /// Extra lines, e.g. one per failed form field.
    pub details: Vec<String>,
    pub retryable: bool,
}

const TRANSIENT_SECONDS: u32 = 5;

impl Notice {
    fn new(level: Level, message: impl Into<String>, dismissal: Dismissal) -> Self {
        Self {
            level,
            message: message.into(),
            dismissal,
            details: Vec::new(),
            retryable: false,
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Level::Info, message, Dismissal::AfterSeconds(TRANSIENT_SECONDS))
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self::new(Level::Success, message, Dismissal::AfterSeconds(TRANSIENT_SECONDS))
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Level::Warning, message, Dismissal::Manual)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Level::Error, message, Dismissal::Manual)
    }

    pub fn with_details(mut self, details: Vec<String>) -> Self {
        self.details = details;
        self
    }

    pub fn retryable(mut self) -> Self {
        self.retryable = true;
        self
    }

    pub fn durable(mut self) -> Self {
        self.dismissal = Dismissal::Manual;
        self
    }

    pub fn css_class(&self) -> &'static str {
        match self.level {
            Level::Info => "notice-info",
            Level::Success => "notice-success",
            Level::Warning => "notice-warning",
            Level::Error => "notice-error",
        }
    }

    /// Milliseconds until the notice hides itself; 0 for durable notices.
    pub fn dismiss_after_ms(&self) -> u32 {
        match self.dismissal {
            Dismissal::AfterSeconds(seconds) => seconds * 1000,
            Dismissal::Manual => 0,
        }
    }
}
