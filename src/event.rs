//! Rename events - structured reports of every applied rename.
//!
//! The walker and driver never format text themselves; they hand each
//! rename to a [`RenameSink`]. The default [`TracingSink`] logs module-level
//! renames at info and symbol-level renames at debug, so `-v` is what turns
//! the per-symbol stream on.

use std::fmt;

/// What kind of symbol a rename touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Namespace,
    Type,
    Member,
    GenericParameter,
    InstructionOperand,
    Identity,
    ModuleReference,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Namespace => "namespace",
            SymbolKind::Type => "type",
            SymbolKind::Member => "member",
            SymbolKind::GenericParameter => "generic-parameter",
            SymbolKind::InstructionOperand => "instruction-operand",
            SymbolKind::Identity => "identity",
            SymbolKind::ModuleReference => "module-reference",
        }
    }

    pub fn all() -> &'static [SymbolKind] {
        &[
            SymbolKind::Namespace,
            SymbolKind::Type,
            SymbolKind::Member,
            SymbolKind::GenericParameter,
            SymbolKind::InstructionOperand,
            SymbolKind::Identity,
            SymbolKind::ModuleReference,
        ]
    }

    /// Module-level renames are reported even without verbose logging.
    pub fn is_module_level(&self) -> bool {
        matches!(self, SymbolKind::Identity | SymbolKind::ModuleReference)
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One applied rename inside one module.
#[derive(Debug, Clone, PartialEq)]
pub struct RenameEvent {
    /// Name of the module being rewritten when the rename happened.
    pub module: String,
    pub kind: SymbolKind,
    pub before: String,
    pub after: String,
}

/// Receiver for rename events.
pub trait RenameSink {
    fn record(&mut self, event: RenameEvent);
}

/// Forwards rename events to the `tracing` log stream.
pub struct TracingSink;

impl RenameSink for TracingSink {
    fn record(&mut self, event: RenameEvent) {
        if event.kind.is_module_level() {
            tracing::info!(
                "[{}][{}] {} -> {}",
                event.module,
                event.kind,
                event.before,
                event.after
            );
        } else {
            tracing::debug!(
                "[{}][{}] {} -> {}",
                event.module,
                event.kind,
                event.before,
                event.after
            );
        }
    }
}

/// Collects rename events in memory for inspection.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<RenameEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenameSink for RecordingSink {
    fn record(&mut self, event: RenameEvent) {
        self.events.push(event);
    }
}
