use std::ffi::{c_void, CString};
use std::marker::PhantomData;
use std::ptr;

use gl::types::{GLchar, GLenum, GLint, GLsizei};

use super::Driver;
use crate::error::DriverError;
use crate::types::{ProgramId, ShaderId, StageKind};

/// Driver backed by the process-wide OpenGL function pointers.
///
/// Context creation is left to the windowing library. Once a context is
/// current, build the driver with [`GlDriver::load_with`] and keep it on the
/// thread that owns the context; the type is neither `Send` nor `Sync`.
pub struct GlDriver {
    _context_thread: PhantomData<*const ()>,
}

impl GlDriver {
    /// Loads the GL entry points through the windowing library's proc-address
    /// lookup (e.g. `window.get_proc_address`).
    ///
    /// # Safety
    ///
    /// A GL 2.0+ context must be current on the calling thread for as long as
    /// the returned driver is used, and `loader` must return valid function
    /// pointers for that context.
    pub unsafe fn load_with<F>(loader: F) -> Self
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        Self {
            _context_thread: PhantomData,
        }
    }
}

fn stage_enum(stage: StageKind) -> GLenum {
    match stage {
        StageKind::Vertex => gl::VERTEX_SHADER,
        StageKind::Fragment => gl::FRAGMENT_SHADER,
    }
}

fn source_cstring(source: &str) -> Result<CString, DriverError> {
    CString::new(source).map_err(|err| DriverError::InteriorNul(err.nul_position()))
}

/// Reads an info log of `length` bytes (as reported by `INFO_LOG_LENGTH`,
/// terminator included) into a heap buffer sized to match.
fn read_info_log<F>(length: GLint, fetch: F) -> String
where
    F: FnOnce(GLsizei, *mut GLsizei, *mut GLchar),
{
    if length <= 0 {
        return String::new();
    }

    let mut buffer = vec![0u8; length as usize];
    let mut written: GLsizei = 0;
    fetch(length, &mut written, buffer.as_mut_ptr().cast::<GLchar>());
    buffer.truncate(written.clamp(0, length) as usize);

    String::from_utf8_lossy(&buffer)
        .trim_end_matches('\0')
        .to_string()
}

impl Driver for GlDriver {
    fn create_shader(&mut self, stage: StageKind) -> Result<ShaderId, DriverError> {
        let raw = unsafe { gl::CreateShader(stage_enum(stage)) };
        ShaderId::new(raw).ok_or(DriverError::Allocation("shader"))
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) -> Result<(), DriverError> {
        let source = source_cstring(source)?;
        unsafe {
            gl::ShaderSource(shader.get(), 1, &source.as_ptr(), ptr::null());
        }
        Ok(())
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        unsafe { gl::CompileShader(shader.get()) }
    }

    fn compile_status(&self, shader: ShaderId) -> bool {
        let mut status: GLint = gl::FALSE as GLint;
        unsafe { gl::GetShaderiv(shader.get(), gl::COMPILE_STATUS, &mut status) };
        status != gl::FALSE as GLint
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        let mut length: GLint = 0;
        unsafe { gl::GetShaderiv(shader.get(), gl::INFO_LOG_LENGTH, &mut length) };
        read_info_log(length, |capacity, written, buffer| unsafe {
            gl::GetShaderInfoLog(shader.get(), capacity, written, buffer)
        })
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        unsafe { gl::DeleteShader(shader.get()) }
    }

    fn create_program(&mut self) -> Result<ProgramId, DriverError> {
        let raw = unsafe { gl::CreateProgram() };
        ProgramId::new(raw).ok_or(DriverError::Allocation("program"))
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        unsafe { gl::AttachShader(program.get(), shader.get()) }
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        unsafe { gl::DetachShader(program.get(), shader.get()) }
    }

    fn link_program(&mut self, program: ProgramId) {
        unsafe { gl::LinkProgram(program.get()) }
    }

    fn link_status(&self, program: ProgramId) -> bool {
        let mut status: GLint = gl::FALSE as GLint;
        unsafe { gl::GetProgramiv(program.get(), gl::LINK_STATUS, &mut status) };
        status != gl::FALSE as GLint
    }

    fn validate_program(&mut self, program: ProgramId) {
        unsafe { gl::ValidateProgram(program.get()) }
    }

    fn validate_status(&self, program: ProgramId) -> bool {
        let mut status: GLint = gl::FALSE as GLint;
        unsafe { gl::GetProgramiv(program.get(), gl::VALIDATE_STATUS, &mut status) };
        status != gl::FALSE as GLint
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        let mut length: GLint = 0;
        unsafe { gl::GetProgramiv(program.get(), gl::INFO_LOG_LENGTH, &mut length) };
        read_info_log(length, |capacity, written, buffer| unsafe {
            gl::GetProgramInfoLog(program.get(), capacity, written, buffer)
        })
    }

    fn delete_program(&mut self, program: ProgramId) {
        unsafe { gl::DeleteProgram(program.get()) }
    }
}
