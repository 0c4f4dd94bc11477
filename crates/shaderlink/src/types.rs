use std::borrow::Cow;
use std::fmt;
use std::num::NonZeroU32;

/// Pipeline stage a shader object is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    Vertex,
    Fragment,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::Vertex => "vertex",
            StageKind::Fragment => "fragment",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Driver handle for a shader object. Zero is reserved by drivers as "no object".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShaderId(NonZeroU32);

impl ShaderId {
    /// Wraps a raw driver handle, returning `None` for the reserved zero value.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ShaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Driver handle for a program object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(NonZeroU32);

impl ProgramId {
    /// Wraps a raw driver handle, returning `None` for the reserved zero value.
    pub fn new(raw: u32) -> Option<Self> {
        NonZeroU32::new(raw).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Source text tagged with the stage it is meant for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource<'a> {
    pub kind: StageKind,
    pub text: Cow<'a, str>,
}

impl<'a> ShaderSource<'a> {
    pub fn new(kind: StageKind, text: impl Into<Cow<'a, str>>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn vertex(text: impl Into<Cow<'a, str>>) -> Self {
        Self::new(StageKind::Vertex, text)
    }

    pub fn fragment(text: impl Into<Cow<'a, str>>) -> Self {
        Self::new(StageKind::Fragment, text)
    }
}

/// A successfully compiled shader object awaiting linking.
///
/// Stages are single-use: [`crate::ShaderCompiler::link_program`] consumes them
/// and the driver object is deleted whether or not the link succeeds. A stage
/// that is never linked must be handed back through
/// [`crate::ShaderCompiler::release_stage`].
#[derive(Debug, PartialEq, Eq)]
#[must_use = "compiled stages must be linked or released"]
pub struct CompiledStage {
    id: ShaderId,
    kind: StageKind,
}

impl CompiledStage {
    pub(crate) fn new(id: ShaderId, kind: StageKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> ShaderId {
        self.id
    }

    pub fn kind(&self) -> StageKind {
        self.kind
    }
}

/// A linked program owned by the caller.
///
/// The compiler never binds the program; pass [`ShaderProgram::id`] to the
/// draw calls that need it and return the program through
/// [`crate::ShaderCompiler::release_program`] when done.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "linked programs must be released by the caller"]
pub struct ShaderProgram {
    id: ProgramId,
}

impl ShaderProgram {
    pub(crate) fn new(id: ProgramId) -> Self {
        Self { id }
    }

    pub fn id(&self) -> ProgramId {
        self.id
    }
}

/// What the compiler does with the driver's validation step after linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationPolicy {
    /// Do not ask the driver to validate.
    Skip,
    /// Validate and log a warning on failure, but keep the program.
    #[default]
    Warn,
    /// Validate and treat failure as a compile error.
    Enforce,
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationPolicy::Skip => f.write_str("skip"),
            ValidationPolicy::Warn => f.write_str("warn"),
            ValidationPolicy::Enforce => f.write_str("enforce"),
        }
    }
}

/// Options applied to every request made through a [`crate::ShaderCompiler`].
#[derive(Debug, Clone, Default)]
pub struct CompilerOptions {
    pub validation: ValidationPolicy,
}

/// Progress of the most recent [`crate::ShaderCompiler::compile_program`] request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompileState {
    #[default]
    Idle,
    CompilingVertex,
    CompilingFragment,
    Linking,
    Linked,
    Failed,
}

impl CompileState {
    pub fn is_terminal(self) -> bool {
        matches!(self, CompileState::Linked | CompileState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_handles_are_unrepresentable() {
        assert!(ShaderId::new(0).is_none());
        assert!(ProgramId::new(0).is_none());
        assert_eq!(ShaderId::new(7).map(ShaderId::get), Some(7));
    }

    #[test]
    fn stage_kind_display_matches_driver_wording() {
        assert_eq!(StageKind::Vertex.to_string(), "vertex");
        assert_eq!(StageKind::Fragment.to_string(), "fragment");
    }

    #[test]
    fn only_linked_and_failed_are_terminal() {
        assert!(CompileState::Linked.is_terminal());
        assert!(CompileState::Failed.is_terminal());
        assert!(!CompileState::Idle.is_terminal());
        assert!(!CompileState::Linking.is_terminal());
    }
}
