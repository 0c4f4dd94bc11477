//! Shader program compilation for OpenGL-style drivers.
//!
//! ```text
//!   vertex source ──▶ compile_stage ─┐
//!                                    ├─▶ link_program ──▶ validate ──▶ ShaderProgram
//!   fragment source ─▶ compile_stage ┘
//! ```
//!
//! [`ShaderCompiler`] drives any [`Driver`]: [`GlDriver`] for a live OpenGL
//! context or, with the default `naga-glsl` feature, [`NagaDriver`] which
//! compiles GLSL in software. Failures come back as [`CompileError`] carrying
//! the stage and driver log; no shader or program object outlives a failed
//! request.

pub mod builtin;
mod compiler;
pub mod driver;
mod error;
mod types;

pub use compiler::ShaderCompiler;
pub use driver::opengl::GlDriver;
#[cfg(feature = "naga-glsl")]
pub use driver::software::{NagaDriver, DEFAULT_TARGET_VERSION, SUPPORTED_VERSIONS};
pub use driver::Driver;
pub use error::{CompileError, DriverError};
pub use types::{
    CompileState, CompiledStage, CompilerOptions, ProgramId, ShaderId, ShaderProgram,
    ShaderSource, StageKind, ValidationPolicy,
};
