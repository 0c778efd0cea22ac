use thiserror::Error;

#[derive(Debug, Error)]
pub enum SqlMapperError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Template compile error: {0}")]
    CompileError(String),

    #[error("Parameter binding error: {0}")]
    BindingError(String),

    /// No pooled connection became free within the configured wait budget.
    #[error("System busy: {0}")]
    SystemBusy(String),

    #[error("SQL execution error: {0}")]
    ExecutionError(String),

    #[error("Result mapping error: {0}")]
    MappingError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl SqlMapperError {
    /// True for the acquisition-timeout outcome.
    #[must_use]
    pub fn is_system_busy(&self) -> bool {
        matches!(self, Self::SystemBusy(_))
    }
}
