//! # Remod - Namespace Rewriter for Binary Modules
//!
//! Renames a top-level namespace identifier consistently across a set of
//! interdependent binary modules.
//!
//! Remod provides:
//! - A collision-guarded rename table with a closed set of name patterns
//! - A symbol graph walker covering types, members, attributes, generics
//!   and executable-code operands
//! - A dependency-ordered rewrite driver with atomic in-place commits
//! - A checksummed binary module codec and a post-rewrite merge tool

pub mod rename;
pub mod module;
pub mod job;
pub mod event;
pub mod walker;
pub mod driver;
pub mod commit;
pub mod resolver;
pub mod codec;
pub mod merge;

// Re-exports for convenient access
pub use rename::{NamePattern, RenameTable};
pub use module::Module;
pub use job::{JobState, RewriteJob};
pub use event::{RecordingSink, RenameEvent, RenameSink, SymbolKind, TracingSink};
pub use walker::Walker;
pub use driver::RewriteDriver;
pub use resolver::ModuleResolver;

/// Result type alias for remod operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for remod operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Codec error: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Invalid module file: {0}")]
    InvalidModule(String),

    #[error("Module not found: {0}")]
    ModuleNotFound(String),

    #[error("Invalid module path: {0}")]
    InvalidPath(String),

    #[error("Duplicate input module: {0}")]
    DuplicateJob(String),

    #[error("Duplicate type after merge: {0}")]
    DuplicateType(String),

    #[error("Merge error: {0}")]
    Merge(String),
}
