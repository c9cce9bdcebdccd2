// src/diagnostics.rs
//
// Sink for semantic diagnostics raised while querying or linking structures.
//
// These are not errors: the operation that raised one still produces a result
// (INCOMPATIBLE, ERROR, a missing module name). The listener decides whether the
// caller should give up early.

use std::sync::{Arc, Mutex, PoisonError};

use strata_identity::ConstantId;

pub const VE_CYCLICAL_CONTRIBUTION: &str = "VE-CYCLICAL-CONTRIBUTION";
pub const VE_TOO_MANY_TYPE_PARAMS: &str = "VE-TOO-MANY-TYPE-PARAMS";
pub const VE_MODULE_MISSING: &str = "VE-MODULE-MISSING";
pub const VE_VIRTUAL_SUPER_UNRESOLVED: &str = "VE-VIRTUAL-SUPER-UNRESOLVED";
pub const VE_CORRUPT_CHILDREN: &str = "VE-CORRUPT-CHILDREN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    None,
    Info,
    Warning,
    Error,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub args: Vec<String>,
    /// Constant the diagnostic is about, when there is one.
    pub source: Option<ConstantId>,
}

impl Diagnostic {
    pub fn new(severity: Severity, code: &'static str) -> Self {
        Self {
            severity,
            code,
            args: Vec::new(),
            source: None,
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn with_source(mut self, source: ConstantId) -> Self {
        self.source = Some(source);
        self
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?} {}", self.severity, self.code)?;
        if !self.args.is_empty() {
            write!(f, ": {}", self.args.join(", "))?;
        }
        Ok(())
    }
}

pub trait ErrorListener: Send {
    /// Record a diagnostic. Returns true when the caller should abort.
    fn log(&mut self, diagnostic: Diagnostic) -> bool;

    fn is_abort_desired(&self) -> bool;
}

/// Forwards every diagnostic to `tracing` and never asks to abort.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl ErrorListener for TracingListener {
    fn log(&mut self, diagnostic: Diagnostic) -> bool {
        match diagnostic.severity {
            Severity::None | Severity::Info => {
                tracing::info!(code = diagnostic.code, args = ?diagnostic.args, "diagnostic")
            }
            Severity::Warning => {
                tracing::warn!(code = diagnostic.code, args = ?diagnostic.args, "diagnostic")
            }
            Severity::Error | Severity::Fatal => {
                tracing::error!(code = diagnostic.code, args = ?diagnostic.args, "diagnostic")
            }
        }
        false
    }

    fn is_abort_desired(&self) -> bool {
        false
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlackHole;

impl ErrorListener for BlackHole {
    fn log(&mut self, _diagnostic: Diagnostic) -> bool {
        false
    }

    fn is_abort_desired(&self) -> bool {
        false
    }
}

/// Records diagnostics into a buffer shared by all clones of the listener, so a
/// handle kept by the caller can inspect what a structure reported.
#[derive(Debug, Clone)]
pub struct CollectingListener {
    entries: Arc<Mutex<Vec<Diagnostic>>>,
    abort_at: Severity,
}

impl Default for CollectingListener {
    fn default() -> Self {
        Self::new(Severity::Fatal)
    }
}

impl CollectingListener {
    pub fn new(abort_at: Severity) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            abort_at,
        }
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|d| d.code == code)
    }

    pub fn worst_severity(&self) -> Severity {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|d| d.severity)
            .max()
            .unwrap_or(Severity::None)
    }
}

impl ErrorListener for CollectingListener {
    fn log(&mut self, diagnostic: Diagnostic) -> bool {
        let abort = diagnostic.severity >= self.abort_at;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
        abort
    }

    fn is_abort_desired(&self) -> bool {
        self.worst_severity() >= self.abort_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_is_ordered() {
        assert!(Severity::None < Severity::Info);
        assert!(Severity::Warning < Severity::Error);
        assert!(Severity::Error < Severity::Fatal);
    }

    #[test]
    fn collecting_listener_shares_its_buffer() {
        let handle = CollectingListener::new(Severity::Error);
        let mut sink: Box<dyn ErrorListener> = Box::new(handle.clone());

        assert!(!sink.log(Diagnostic::new(Severity::Warning, VE_TOO_MANY_TYPE_PARAMS)));
        assert!(!sink.is_abort_desired());
        assert!(sink.log(Diagnostic::new(Severity::Error, VE_CYCLICAL_CONTRIBUTION).with_arg("A")));
        assert!(sink.is_abort_desired());

        assert_eq!(handle.diagnostics().len(), 2);
        assert!(handle.has_code(VE_CYCLICAL_CONTRIBUTION));
        assert_eq!(handle.worst_severity(), Severity::Error);
    }

    #[test]
    fn display_lists_arguments() {
        let d = Diagnostic::new(Severity::Error, VE_MODULE_MISSING).with_arg("lib.example.org");
        assert_eq!(d.to_string(), "Error VE-MODULE-MISSING: lib.example.org");
    }

    #[test]
    fn black_hole_never_aborts() {
        let mut sink = BlackHole;
        assert!(!sink.log(Diagnostic::new(Severity::Fatal, VE_MODULE_MISSING)));
        assert!(!sink.is_abort_desired());
    }
}
