//! The GPU API surface the compiler talks to.
//!
//! `Driver` mirrors the handful of OpenGL entry points needed to build a
//! program: object creation and deletion, source upload, compile, attach,
//! link, validate, and the status/log queries after each step. Two
//! implementations ship with the crate:
//! - `opengl` drives a real context through the `gl` crate's bindings.
//! - `software` compiles GLSL in software with naga's frontend, which lets the
//!   compiler run (and be tested) without a window or GPU.

#[cfg(feature = "naga-glsl")]
mod interface;
pub mod opengl;
#[cfg(feature = "naga-glsl")]
pub mod software;

use crate::error::DriverError;
use crate::types::{ProgramId, ShaderId, StageKind};

pub trait Driver {
    fn create_shader(&mut self, stage: StageKind) -> Result<ShaderId, DriverError>;
    fn shader_source(&mut self, shader: ShaderId, source: &str) -> Result<(), DriverError>;
    fn compile_shader(&mut self, shader: ShaderId);
    fn compile_status(&self, shader: ShaderId) -> bool;
    fn shader_info_log(&self, shader: ShaderId) -> String;
    fn delete_shader(&mut self, shader: ShaderId);

    fn create_program(&mut self) -> Result<ProgramId, DriverError>;
    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId);
    fn link_program(&mut self, program: ProgramId);
    fn link_status(&self, program: ProgramId) -> bool;
    fn validate_program(&mut self, program: ProgramId);
    fn validate_status(&self, program: ProgramId) -> bool;
    fn program_info_log(&self, program: ProgramId) -> String;
    fn delete_program(&mut self, program: ProgramId);
}

impl<D: Driver + ?Sized> Driver for &mut D {
    fn create_shader(&mut self, stage: StageKind) -> Result<ShaderId, DriverError> {
        (**self).create_shader(stage)
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) -> Result<(), DriverError> {
        (**self).shader_source(shader, source)
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        (**self).compile_shader(shader)
    }

    fn compile_status(&self, shader: ShaderId) -> bool {
        (**self).compile_status(shader)
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        (**self).shader_info_log(shader)
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        (**self).delete_shader(shader)
    }

    fn create_program(&mut self) -> Result<ProgramId, DriverError> {
        (**self).create_program()
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        (**self).attach_shader(program, shader)
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        (**self).detach_shader(program, shader)
    }

    fn link_program(&mut self, program: ProgramId) {
        (**self).link_program(program)
    }

    fn link_status(&self, program: ProgramId) -> bool {
        (**self).link_status(program)
    }

    fn validate_program(&mut self, program: ProgramId) {
        (**self).validate_program(program)
    }

    fn validate_status(&self, program: ProgramId) -> bool {
        (**self).validate_status(program)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        (**self).program_info_log(program)
    }

    fn delete_program(&mut self, program: ProgramId) {
        (**self).delete_program(program)
    }
}
