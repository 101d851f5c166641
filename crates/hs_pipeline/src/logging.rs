use tracing::Level;
use std::sync::Once;
use std::collections::VecDeque;

static INIT: Once = Once::new();

/// Prefixes every message of a pipeline stage, e.g. `[train] [corpus]`.
#[derive(Debug, Clone, Default)]
pub struct Logger {
    prefixes: VecDeque<String>,
}

impl Logger {
    pub fn new() -> Self {
        Self {
            prefixes: VecDeque::new(),
        }
    }

    pub fn with_new_prefixes(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.clear();
        self.prefixes.push_back(prefix.into());
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push_back(prefix.into());
        self
    }

    fn render(&self, message: &str) -> String {
        let prefix = self.prefixes.iter().map(|p| format!("[{}] ", p)).collect::<String>();
        format!("{}{}", prefix, message)
    }

    pub fn info(&self, message: &str) {
        tracing::info!("{}", self.render(message));
    }

    pub fn error(&self, message: &str) {
        tracing::error!("{}", self.render(message));
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{}", self.render(message));
    }

    pub fn debug(&self, message: &str) {
        tracing::debug!("{}", self.render(message));
    }
}

/// Installs the fmt subscriber once per process.
pub fn init_logging(level: Level) -> Logger {
    if !tracing::dispatcher::has_been_set() {
        INIT.call_once(|| {
            tracing_subscriber::fmt()
                .with_max_level(level)
                .init();
        });
    }
    Logger::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_render_in_order() {
        let logger = Logger::new().with_prefix("train").with_prefix("corpus");
        assert_eq!(logger.render("loaded"), "[train] [corpus] loaded");
    }

    #[test]
    fn test_new_prefixes_replace_existing() {
        let logger = Logger::new().with_prefix("train").with_new_prefixes("score");
        assert_eq!(logger.render("idle"), "[score] idle");
    }
}
