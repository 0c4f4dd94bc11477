use tracing::{debug, trace, warn};

use crate::driver::Driver;
use crate::error::CompileError;
use crate::types::{
    CompileState, CompiledStage, CompilerOptions, ShaderProgram, ShaderSource, StageKind,
    ValidationPolicy,
};

/// Turns vertex/fragment source pairs into linked programs.
///
/// Every driver object the compiler allocates is either handed to the caller
/// (a [`CompiledStage`] or [`ShaderProgram`]) or deleted before the call
/// returns, so failed requests never leak shader or program objects.
pub struct ShaderCompiler<D> {
    driver: D,
    options: CompilerOptions,
    state: CompileState,
}

impl<D: Driver> ShaderCompiler<D> {
    pub fn new(driver: D) -> Self {
        Self::with_options(driver, CompilerOptions::default())
    }

    pub fn with_options(driver: D, options: CompilerOptions) -> Self {
        Self {
            driver,
            options,
            state: CompileState::Idle,
        }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// State reached by the most recent [`ShaderCompiler::compile_program`] call.
    pub fn state(&self) -> CompileState {
        self.state
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn into_driver(self) -> D {
        self.driver
    }

    fn transition(&mut self, next: CompileState) {
        trace!(from = ?self.state, to = ?next, "compile state transition");
        self.state = next;
    }

    /// Compiles a single stage into a live shader object.
    ///
    /// On failure the shader object is deleted and the driver log is returned
    /// in [`CompileError::StageCompile`].
    pub fn compile_stage(
        &mut self,
        kind: StageKind,
        source: &str,
    ) -> Result<CompiledStage, CompileError> {
        if source.trim().is_empty() {
            return Err(CompileError::EmptySource { stage: kind });
        }

        let id = self.driver.create_shader(kind)?;
        if let Err(err) = self.driver.shader_source(id, source) {
            self.driver.delete_shader(id);
            return Err(err.into());
        }
        self.driver.compile_shader(id);

        let log = self.driver.shader_info_log(id);
        if !self.driver.compile_status(id) {
            self.driver.delete_shader(id);
            warn!(stage = %kind, "shader stage failed to compile");
            return Err(CompileError::StageCompile { stage: kind, log });
        }

        let log = log.trim();
        if !log.is_empty() {
            warn!(stage = %kind, shader = id.get(), log, "shader compiled with warnings");
        }
        debug!(stage = %kind, shader = id.get(), "compiled shader stage");
        Ok(CompiledStage::new(id, kind))
    }

    /// Compiles a tagged source; see [`ShaderCompiler::compile_stage`].
    pub fn compile_source(
        &mut self,
        source: &ShaderSource<'_>,
    ) -> Result<CompiledStage, CompileError> {
        self.compile_stage(source.kind, &source.text)
    }

    /// Links two compiled stages into a program, consuming both.
    ///
    /// Both shader objects are detached and deleted after the link attempt
    /// whatever its outcome. A failed link deletes the program as well.
    pub fn link_program(
        &mut self,
        vertex: CompiledStage,
        fragment: CompiledStage,
    ) -> Result<ShaderProgram, CompileError> {
        let mismatch = if vertex.kind() != StageKind::Vertex {
            Some((StageKind::Vertex, vertex.kind()))
        } else if fragment.kind() != StageKind::Fragment {
            Some((StageKind::Fragment, fragment.kind()))
        } else {
            None
        };
        if let Some((expected, found)) = mismatch {
            self.release_stage(vertex);
            self.release_stage(fragment);
            return Err(CompileError::StageMismatch { expected, found });
        }

        let program = match self.driver.create_program() {
            Ok(program) => program,
            Err(err) => {
                self.release_stage(vertex);
                self.release_stage(fragment);
                return Err(err.into());
            }
        };

        let stages = [vertex.id(), fragment.id()];
        for shader in stages {
            self.driver.attach_shader(program, shader);
        }
        self.driver.link_program(program);
        for shader in stages {
            self.driver.detach_shader(program, shader);
            self.driver.delete_shader(shader);
        }

        if !self.driver.link_status(program) {
            let log = self.driver.program_info_log(program);
            self.driver.delete_program(program);
            warn!(program = program.get(), "program failed to link");
            return Err(CompileError::ProgramLink { log });
        }

        match self.options.validation {
            ValidationPolicy::Skip => {}
            policy => {
                self.driver.validate_program(program);
                if !self.driver.validate_status(program) {
                    let log = self.driver.program_info_log(program);
                    if policy == ValidationPolicy::Enforce {
                        self.driver.delete_program(program);
                        warn!(program = program.get(), "program failed validation");
                        return Err(CompileError::ProgramValidate { log });
                    }
                    warn!(
                        program = program.get(),
                        log = log.trim(),
                        "program failed validation; keeping it"
                    );
                }
            }
        }

        debug!(program = program.get(), "linked shader program");
        Ok(ShaderProgram::new(program))
    }

    /// Compiles both stages and links them.
    ///
    /// Stages are compiled before any program object exists, so a stage
    /// failure never allocates a program. If the fragment stage fails, the
    /// already-compiled vertex stage is released before returning.
    pub fn compile_program(
        &mut self,
        vertex_source: &str,
        fragment_source: &str,
    ) -> Result<ShaderProgram, CompileError> {
        self.transition(CompileState::CompilingVertex);
        let vertex = match self.compile_stage(StageKind::Vertex, vertex_source) {
            Ok(stage) => stage,
            Err(err) => return Err(self.fail(err)),
        };

        self.transition(CompileState::CompilingFragment);
        let fragment = match self.compile_stage(StageKind::Fragment, fragment_source) {
            Ok(stage) => stage,
            Err(err) => {
                self.release_stage(vertex);
                return Err(self.fail(err));
            }
        };

        self.transition(CompileState::Linking);
        match self.link_program(vertex, fragment) {
            Ok(program) => {
                self.transition(CompileState::Linked);
                Ok(program)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Like [`ShaderCompiler::compile_program`] but checks the stage tags first.
    pub fn compile_program_from(
        &mut self,
        vertex: &ShaderSource<'_>,
        fragment: &ShaderSource<'_>,
    ) -> Result<ShaderProgram, CompileError> {
        for (source, expected) in [(vertex, StageKind::Vertex), (fragment, StageKind::Fragment)] {
            if source.kind != expected {
                self.transition(CompileState::Failed);
                return Err(CompileError::StageMismatch {
                    expected,
                    found: source.kind,
                });
            }
        }
        self.compile_program(&vertex.text, &fragment.text)
    }

    fn fail(&mut self, err: CompileError) -> CompileError {
        self.transition(CompileState::Failed);
        err
    }

    /// Deletes a stage that will not be linked.
    pub fn release_stage(&mut self, stage: CompiledStage) {
        trace!(stage = %stage.kind(), shader = stage.id().get(), "releasing shader stage");
        self.driver.delete_shader(stage.id());
    }

    /// Deletes a program previously returned to the caller.
    pub fn release_program(&mut self, program: ShaderProgram) {
        trace!(program = program.id().get(), "releasing shader program");
        self.driver.delete_program(program.id());
    }
}
