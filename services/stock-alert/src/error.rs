//! Error taxonomy for the valuation pipeline.
//!
//! Fetch and valuation errors are contained to one ticker. Mutation errors
//! double as the status message shown to the administrator, so their
//! display strings are user-facing.

use thiserror::Error;

// ============================================================================
// Fetch
// ============================================================================

/// Failure to obtain facts from one external source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The page could not be retrieved
    #[error("transport error for {url}: {message}")]
    Transport { url: String, message: String },

    /// A required field was empty or absent after extraction
    #[error("{origin}: field '{field}' missing")]
    MissingField {
        origin: &'static str,
        field: &'static str,
    },

    /// A field was present but could not be interpreted
    #[error("field '{field}' malformed: {value:?}")]
    Malformed { field: String, value: String },
}

impl FetchError {
    pub(crate) fn malformed(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Malformed {
            field: field.into(),
            value: value.into(),
        }
    }
}

// ============================================================================
// Valuation
// ============================================================================

/// Failure to compute a fair-value estimate for one ticker.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValuationError {
    #[error("invalid ticker {0:?}")]
    InvalidTicker(String),

    /// Quote source (name, price, PE, PB)
    #[error("quote source failed: {0}")]
    SourceA(#[source] FetchError),

    /// Five-year averages source (ROE, dividend)
    #[error("five-year average source failed: {0}")]
    SourceB(#[source] FetchError),

    /// Forward ROE source
    #[error("forward ROE source failed: {0}")]
    SourceC(#[source] FetchError),

    /// Foreign key-statistics source
    #[error("statistics source failed: {0}")]
    Source(#[source] FetchError),

    #[error("ROE resolved to zero, value undefined")]
    DivideByZero,
}

// ============================================================================
// Mutation
// ============================================================================

/// Rejected administrative edit of the watch-list.
#[derive(Debug, Error)]
pub enum MutationError {
    #[error("{0} 不在列表中")]
    NotFound(String),

    #[error("新增失败 {ticker} {name} 已存在！")]
    Duplicate { ticker: String, name: String },

    #[error("输入有误：序号 {index} 超出范围 1-{len}")]
    OutOfRange { index: usize, len: usize },

    #[error("输入有误：无效代码 {0:?}")]
    InvalidTicker(String),

    #[error("{command} 输入有误：{reason}")]
    InvalidCommand { command: String, reason: String },

    #[error("{ticker} 添加失败：{source}")]
    Valuation {
        ticker: String,
        #[source]
        source: ValuationError,
    },
}

impl MutationError {
    /// HTTP status for a rejected edit.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Duplicate { .. } => 409,
            Self::Valuation { .. } => 502,
            Self::OutOfRange { .. } | Self::InvalidTicker(_) | Self::InvalidCommand { .. } => 400,
        }
    }
}

// ============================================================================
// Persistence & mail
// ============================================================================

/// Failure to make the watch-list durable.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("配置保存失败：{0}")]
    Io(#[from] stock_common::Error),
}

/// Failure to hand a digest to the mail server.
#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail configuration error: {0}")]
    Config(String),

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("SMTP delivery failed: {0}")]
    Transport(String),
}
