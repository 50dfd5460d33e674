use thiserror::Error;

pub type Result<T> = std::result::Result<T, LayoutError>;

/// Malformed input. Missing CTE roots, dangling references and dependency
/// cycles are not errors; they are reported in `LayoutDiagnostics`.
#[derive(Debug, Error, PartialEq)]
pub enum LayoutError {
    #[error("duplicate plan node id: {0}")]
    DuplicateNodeId(String),
    #[error("duplicate CTE definition: {0}")]
    DuplicateCteName(String),
    #[error("invalid layout config: {0}")]
    InvalidConfig(String),
}
