//! Error taxonomy and the single-sink error-reporting contract.
//!
//! Grounded on `original_source/render/ri.cpp`'s `CqBasicError` severity
//! levels and on the ambient `thiserror`/`log` pairing used by `myth` and
//! `oxidized` in the retrieval pack — the teacher crate itself has no error
//! type (a software rasterizer library has no IO surface to fail), so this
//! module's *shape* is grounded in the pack rather than in `euc`.

use std::fmt;

/// Severity associated with a reported [`RenderError`].
///
/// Only [`Severity::Fatal`] aborts the frame; [`Severity::Error`] means
/// rendering continues but the output is partial.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

/// The taxonomy of errors the core can report.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("texture '{path}' could not be read: {reason}")]
    BadTexture { path: String, reason: String },

    #[error("primitive discarded: {reason}")]
    BadPrimitive { reason: String },

    #[error("non-manifold mesh supplied to subdivision: {reason}")]
    NonManifoldMesh { reason: String },

    #[error("primitive exceeded eye-split limit ({limit}) and was discarded")]
    EyeSplitOverflow { limit: u32 },

    #[error("shader evaluation fault in '{shader}': {reason}")]
    ShaderEvalFault { shader: String, reason: String },

    #[error("incompatible options, falling back to defaults: {reason}")]
    OptionsConflict { reason: String },
}

impl RenderError {
    /// The severity mandated for this error kind by the error-handling table.
    ///
    /// `NonManifoldMesh` and `EyeSplitOverflow` are fatal *for the offending
    /// primitive only*: the frame as a whole continues, but the primitive is
    /// discarded. We surface that as [`Severity::Error`] (render continues,
    /// output is partial for that primitive) rather than [`Severity::Fatal`]
    /// (which aborts the whole frame) — only a caller-driven decision to
    /// treat a frame as unrecoverable should map to `Fatal`; this core never
    /// produces a `Fatal` error on its own.
    pub fn default_severity(&self) -> Severity {
        match self {
            RenderError::BadTexture { .. } => Severity::Warning,
            RenderError::BadPrimitive { .. } => Severity::Warning,
            RenderError::NonManifoldMesh { .. } => Severity::Error,
            RenderError::EyeSplitOverflow { .. } => Severity::Warning,
            RenderError::ShaderEvalFault { .. } => Severity::Warning,
            RenderError::OptionsConflict { .. } => Severity::Warning,
        }
    }
}

/// A single sink for all errors produced by the core.
pub trait ErrorHandler {
    fn report(&self, severity: Severity, err: &RenderError);
}

/// Default [`ErrorHandler`] that routes through the `log` crate at a level
/// matching `severity`. Callers embedding this core behind a façade that
/// already has its own diagnostics sink can supply their own `ErrorHandler`
/// instead.
#[derive(Default)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn report(&self, severity: Severity, err: &RenderError) {
        match severity {
            Severity::Info => log::info!("{err}"),
            Severity::Warning => log::warn!("{err}"),
            Severity::Error => log::error!("{err}"),
            Severity::Fatal => log::error!("fatal: {err}"),
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(s)
    }
}

/// Convenience helper: report `err` at its default severity, returning the
/// severity so callers can decide whether to abort (`Fatal`) or continue.
pub fn report(handler: &dyn ErrorHandler, err: RenderError) -> Severity {
    let severity = err.default_severity();
    handler.report(severity, &err);
    severity
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording(Mutex<Vec<(Severity, String)>>);

    impl ErrorHandler for Recording {
        fn report(&self, severity: Severity, err: &RenderError) {
            self.0.lock().unwrap().push((severity, err.to_string()));
        }
    }

    #[test]
    fn eye_split_overflow_is_non_fatal() {
        let handler = Recording::default();
        let severity = report(&handler, RenderError::EyeSplitOverflow { limit: 10 });
        assert_eq!(severity, Severity::Warning);
        assert_eq!(handler.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn non_manifold_mesh_is_error_not_fatal() {
        assert_eq!(
            RenderError::NonManifoldMesh { reason: "dangling edge".into() }.default_severity(),
            Severity::Error
        );
    }
}
