use crate::types::StageKind;

/// Failures reported by a [`crate::Driver`] outside of compile/link status.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DriverError {
    #[error("driver could not allocate a {0} object")]
    Allocation(&'static str),
    #[error("shader source contains an interior NUL byte at offset {0}")]
    InteriorNul(usize),
    #[error("unsupported GLSL version {0}; expected 440, 450, or 460")]
    UnsupportedVersion(u16),
    #[error("unknown {kind} handle {handle}")]
    UnknownHandle { kind: &'static str, handle: u32 },
}

/// Everything a compile request can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("{stage} shader source is empty")]
    EmptySource { stage: StageKind },
    #[error("expected a {expected} stage but got a {found} stage")]
    StageMismatch {
        expected: StageKind,
        found: StageKind,
    },
    #[error("failed to compile {stage} shader:\n{log}")]
    StageCompile { stage: StageKind, log: String },
    #[error("failed to link program:\n{log}")]
    ProgramLink { log: String },
    #[error("program failed validation:\n{log}")]
    ProgramValidate { log: String },
    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl CompileError {
    /// Stage the diagnostic is attributed to, if any.
    pub fn stage(&self) -> Option<StageKind> {
        match self {
            CompileError::EmptySource { stage } | CompileError::StageCompile { stage, .. } => {
                Some(*stage)
            }
            CompileError::StageMismatch { found, .. } => Some(*found),
            _ => None,
        }
    }

    /// Driver log text attached to the failure; empty for non-driver failures.
    pub fn log(&self) -> &str {
        match self {
            CompileError::StageCompile { log, .. }
            | CompileError::ProgramLink { log }
            | CompileError::ProgramValidate { log } => log,
            _ => "",
        }
    }
}
