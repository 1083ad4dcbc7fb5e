use thiserror::Error;

/// Errors raised outside the synthesis core: browser plumbing, snapshot
/// parsing, expression parsing and the request bridge.
///
/// Synthesis itself never surfaces these; failed oracle checks count as zero
/// matches instead.
#[derive(Debug, Error)]
pub enum LocatorError {
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to connect to browser: {0}")]
    ConnectionFailed(String),

    #[error("Tab operation failed: {0}")]
    TabOperationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("DOM parsing failed: {0}")]
    DomParseFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Node {0} is not part of this document")]
    DetachedNode(usize),

    #[error("Evaluation failed: {0}")]
    EvaluationFailed(String),

    #[error("Invalid expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("Bridge request {0} timed out")]
    BridgeTimeout(u64),

    #[error("Bridge channel closed")]
    BridgeClosed,
}

impl LocatorError {
    pub(crate) fn invalid(expression: &str, reason: impl Into<String>) -> Self {
        Self::InvalidExpression { expression: expression.to_string(), reason: reason.into() }
    }
}

/// Result type alias for locator operations
pub type Result<T> = std::result::Result<T, LocatorError>;
