#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Telegram API error: {0}")]
    Telegram(String),

    /// Telegram could not parse the Markdown entities of an outgoing message
    #[error("Telegram rejected message markup: {0}")]
    MarkdownRejected(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AppError {
    /// Short machine-readable code for structured logs
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Config(_) => "CONFIG_ERROR",
            AppError::Telegram(_) => "TELEGRAM_ERROR",
            AppError::MarkdownRejected(_) => "MARKDOWN_REJECTED",
            AppError::Http(_) => "HTTP_ERROR",
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
