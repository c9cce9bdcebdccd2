// src/errors/mod.rs
//! Structured errors for assembling and disassembling module files.
//!
//! Each family has its own code range: A1xxx for the binary format, A2xxx for
//! the constant pool and A3xxx for the component tree. [`AsmError`] wraps all
//! three for the file-level entry points.

pub mod format;
pub mod pool;
pub mod report;
pub mod structure;

use miette::Diagnostic;
use thiserror::Error;

pub use format::FormatError;
pub use pool::PoolError;
pub use report::render_to_string;
pub use structure::StructureError;

#[derive(Error, Debug, Diagnostic, Clone)]
pub enum AsmError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Format(#[from] FormatError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Structure(#[from] StructureError),
}

impl From<std::io::Error> for AsmError {
    fn from(err: std::io::Error) -> Self {
        AsmError::Format(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn umbrella_keeps_inner_code() {
        let err: AsmError = PoolError::UnresolvedConstant {
            name: "Widget".into(),
        }
        .into();
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("A2003"));
        assert_eq!(err.to_string(), "unresolved name 'Widget' is still referenced");
    }

    #[test]
    fn io_errors_become_format_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err: AsmError = io.into();
        assert!(matches!(err, AsmError::Format(FormatError::Io { .. })));
    }

    #[test]
    fn rendered_report_names_code() {
        let err = StructureError::MultipleVersionLabels { count: 2 };
        let rendered = render_to_string(&err);
        assert!(rendered.contains("A3005"));
        assert!(rendered.contains("2 version labels"));
    }
}
