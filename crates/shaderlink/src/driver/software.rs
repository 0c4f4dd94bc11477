//! Software driver that compiles GLSL with naga instead of a GPU.
//!
//! The driver keeps its own handle tables so it behaves like a GL
//! implementation from the compiler's point of view: handles are non-zero and
//! never reused, deleting a shader that is still attached only flags it until
//! it is detached, and every compile/link step leaves a status plus an info
//! log behind. Logs are formatted like desktop driver logs
//! (`0:<line>: error: <message>`).
//!
//! naga's GLSL frontend only accepts `#version 440`, `450`, or `460` core, so
//! any other version directive is rewritten to the configured target before
//! parsing. Sources without a directive get one prepended and their error
//! line numbers are shifted back to match the caller's text.
//!
//! Varyings declared without `layout(location = N)` are given free locations
//! and matched across stages by name at link time, and plain `uniform`
//! variables without `layout(binding = N)` are given free bindings. What naga
//! still rejects shows up as a compile failure of the stage:
//! - `uniform` blocks need an explicit `layout(binding = N)`.
//! - Combined image samplers (`sampler2D` and friends) do not exist in naga;
//!   declare a `texture2D` and a `sampler` separately.
//! - Uniform arrays must follow std140 stride rules.

use std::borrow::Cow;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;

use naga::front::glsl::{Frontend, Options, ParseErrors};
use naga::valid::{
    Capabilities, EntryPointError, ValidationError, ValidationFlags, Validator, VaryingError,
};
use naga::{Binding, Handle, Module, ScalarKind, ShaderStage, Span, Type, TypeInner, WithSpan};

use super::interface::{self, Placed, Storage};
use super::Driver;
use crate::error::DriverError;
use crate::types::{ProgramId, ShaderId, StageKind};

/// `#version` numbers understood by naga's GLSL frontend.
pub const SUPPORTED_VERSIONS: [u16; 3] = [440, 450, 460];

/// Version substituted for unsupported directives unless configured otherwise.
pub const DEFAULT_TARGET_VERSION: u16 = 450;

/// A user-defined `in`/`out` variable.
#[derive(Debug, Clone, PartialEq)]
struct Varying {
    location: u32,
    /// `false` when the source gave no location, so the variable links by name.
    explicit: bool,
    name: Option<String>,
    ty: Option<TypeInner>,
}

impl Varying {
    fn label(&self) -> String {
        match (&self.name, self.explicit) {
            (Some(name), true) => format!("`{name}` (location {})", self.location),
            (Some(name), false) => format!("`{name}`"),
            (None, _) => format!("location {}", self.location),
        }
    }

    /// Whether `output` feeds this input: by location when both sides gave
    /// one, by name otherwise.
    fn is_fed_by(&self, output: &Varying) -> bool {
        if self.explicit && output.explicit {
            self.location == output.location
        } else {
            self.name.is_some() && self.name == output.name
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
struct StageInterface {
    inputs: Vec<Varying>,
    outputs: Vec<Varying>,
}

impl StageInterface {
    fn of(module: &Module, stage: ShaderStage, placed: &Placed<'_>) -> Self {
        let mut interface = Self::default();
        let Some(entry) = module.entry_points.iter().find(|ep| ep.stage == stage) else {
            return interface;
        };

        for argument in &entry.function.arguments {
            collect_varyings(
                module,
                argument.name.as_deref(),
                argument.ty,
                argument.binding.as_ref(),
                &mut interface.inputs,
            );
        }
        if let Some(result) = &entry.function.result {
            collect_varyings(
                module,
                None,
                result.ty,
                result.binding.as_ref(),
                &mut interface.outputs,
            );
        }

        for (varyings, storage) in [
            (&mut interface.inputs, Storage::Input),
            (&mut interface.outputs, Storage::Output),
        ] {
            for varying in varyings.iter_mut() {
                if let Some(name) = &varying.name {
                    varying.explicit = !placed.is_implicit(storage, name);
                }
            }
        }
        interface
    }
}

fn collect_varyings(
    module: &Module,
    name: Option<&str>,
    ty: Handle<Type>,
    binding: Option<&Binding>,
    out: &mut Vec<Varying>,
) {
    match binding {
        Some(Binding::Location { location, .. }) => out.push(Varying {
            location: *location,
            explicit: true,
            name: name.map(str::to_owned),
            ty: plain_type(&module.types[ty].inner),
        }),
        Some(_) => {}
        None => {
            if let TypeInner::Struct { members, .. } = &module.types[ty].inner {
                for member in members {
                    collect_varyings(
                        module,
                        member.name.as_deref(),
                        member.ty,
                        member.binding.as_ref(),
                        out,
                    );
                }
            }
        }
    }
}

/// Keeps only types whose equality is meaningful across two modules.
fn plain_type(inner: &TypeInner) -> Option<TypeInner> {
    match inner {
        TypeInner::Scalar(_) | TypeInner::Vector { .. } | TypeInner::Matrix { .. } => {
            Some(inner.clone())
        }
        _ => None,
    }
}

struct GlslType<'a>(&'a TypeInner);

impl fmt::Display for GlslType<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            TypeInner::Scalar(scalar) => f.write_str(match scalar.kind {
                ScalarKind::Sint => "int",
                ScalarKind::Uint => "uint",
                ScalarKind::Bool => "bool",
                _ => "float",
            }),
            TypeInner::Vector { size, scalar } => {
                let prefix = match scalar.kind {
                    ScalarKind::Sint => "i",
                    ScalarKind::Uint => "u",
                    ScalarKind::Bool => "b",
                    _ => "",
                };
                write!(f, "{prefix}vec{}", *size as u8)
            }
            TypeInner::Matrix { columns, rows, .. } => {
                write!(f, "mat{}x{}", *columns as u8, *rows as u8)
            }
            other => write!(f, "{other:?}"),
        }
    }
}

struct ShaderObject {
    stage: StageKind,
    source: String,
    compiled: bool,
    interface: StageInterface,
    log: String,
    delete_pending: bool,
}

#[derive(Default)]
struct ProgramObject {
    attached: Vec<ShaderId>,
    linked: bool,
    validated: bool,
    log: String,
}

/// [`Driver`] implementation that needs no GPU context.
pub struct NagaDriver {
    frontend: Frontend,
    target_version: u16,
    last_handle: u32,
    shaders: HashMap<ShaderId, ShaderObject>,
    programs: HashMap<ProgramId, ProgramObject>,
}

impl Default for NagaDriver {
    fn default() -> Self {
        Self {
            frontend: Frontend::default(),
            target_version: DEFAULT_TARGET_VERSION,
            last_handle: 0,
            shaders: HashMap::new(),
            programs: HashMap::new(),
        }
    }
}

impl NagaDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a driver that rewrites unsupported `#version` directives to `version`.
    pub fn with_target_version(version: u16) -> Result<Self, DriverError> {
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(DriverError::UnsupportedVersion(version));
        }
        Ok(Self {
            target_version: version,
            ..Self::default()
        })
    }

    pub fn target_version(&self) -> u16 {
        self.target_version
    }

    /// Shader objects that still exist, including ones flagged for deletion
    /// while attached.
    pub fn live_shaders(&self) -> usize {
        self.shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.programs.len()
    }

    fn next_handle(&mut self, kind: &'static str) -> Result<u32, DriverError> {
        self.last_handle = self
            .last_handle
            .checked_add(1)
            .ok_or(DriverError::Allocation(kind))?;
        Ok(self.last_handle)
    }

    fn is_attached(&self, shader: ShaderId) -> bool {
        self.programs
            .values()
            .any(|program| program.attached.contains(&shader))
    }

    fn collect_if_orphaned(&mut self, shader: ShaderId) {
        let pending = self
            .shaders
            .get(&shader)
            .is_some_and(|object| object.delete_pending);
        if pending && !self.is_attached(shader) {
            self.shaders.remove(&shader);
        }
    }
}

fn naga_stage(stage: StageKind) -> ShaderStage {
    match stage {
        StageKind::Vertex => ShaderStage::Vertex,
        StageKind::Fragment => ShaderStage::Fragment,
    }
}

fn is_supported_directive(directive: &str) -> bool {
    let mut parts = directive
        .trim_start()
        .trim_start_matches("#version")
        .split_whitespace();
    let version = parts.next().and_then(|value| value.parse::<u16>().ok());
    let profile = parts.next().unwrap_or("core");
    matches!(version, Some(v) if SUPPORTED_VERSIONS.contains(&v)) && profile == "core"
}

/// Returns the source naga should parse plus the number of lines prepended to it.
fn normalize_version(source: &str, target: u16) -> (Cow<'_, str>, usize) {
    let mut offset = 0;
    for line in source.split_inclusive('\n') {
        if line.trim_start().starts_with("#version") {
            if is_supported_directive(line) {
                return (Cow::Borrowed(source), 0);
            }
            let mut rewritten = String::with_capacity(source.len());
            rewritten.push_str(&source[..offset]);
            rewritten.push_str(&format!("#version {target} core"));
            if line.ends_with('\n') {
                rewritten.push('\n');
            }
            rewritten.push_str(&source[offset + line.len()..]);
            return (Cow::Owned(rewritten), 0);
        }
        offset += line.len();
    }
    (Cow::Owned(format!("#version {target} core\n{source}")), 1)
}

fn line_of(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end]
        .iter()
        .filter(|byte| **byte == b'\n')
        .count()
        + 1
}

fn located_error(
    source: &str,
    span: Span,
    line_offset: usize,
    message: impl fmt::Display,
) -> String {
    match span.to_range() {
        Some(range) => {
            let line = line_of(source, range.start)
                .saturating_sub(line_offset)
                .max(1);
            format!("0:{line}: error: {message}")
        }
        None => format!("0: error: {message}"),
    }
}

fn parse_log(errors: &ParseErrors, source: &str, line_offset: usize) -> String {
    errors
        .errors
        .iter()
        .map(|error| located_error(source, error.meta, line_offset, &error.kind))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders a validation failure with its whole cause chain, located at the
/// declaration behind a location clash or else at the first span naga recorded.
fn validation_log(
    error: &WithSpan<ValidationError>,
    placed: &Placed<'_>,
    line_offset: usize,
) -> String {
    let mut message = error.to_string();
    let mut line = None;

    let mut cause = error.source();
    while let Some(inner) = cause {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        line = line.or_else(|| collision_line(inner, placed));
        cause = inner.source();
    }

    let line = line.or_else(|| {
        error
            .spans()
            .find_map(|(span, _)| span.to_range())
            .map(|range| line_of(&placed.source, range.start))
    });

    match line {
        Some(line) => {
            let line = line.saturating_sub(line_offset).max(1);
            format!("0:{line}: error: {message}")
        }
        None => format!("0: error: {message}"),
    }
}

fn collision_line(cause: &(dyn Error + 'static), placed: &Placed<'_>) -> Option<usize> {
    match cause.downcast_ref::<EntryPointError>()? {
        EntryPointError::Argument(_, VaryingError::BindingCollision { location }) => {
            placed.line_of_slot(Storage::Input, *location)
        }
        EntryPointError::Result(VaryingError::BindingCollision { location }) => {
            placed.line_of_slot(Storage::Output, *location)
        }
        _ => None,
    }
}

fn compile_module(
    frontend: &mut Frontend,
    stage: StageKind,
    source: &str,
    line_offset: usize,
) -> Result<StageInterface, String> {
    let placed = interface::place(source);
    let stage = naga_stage(stage);
    let module = frontend
        .parse(&Options::from(stage), &placed.source)
        .map_err(|errors| parse_log(&errors, &placed.source, line_offset))?;

    let mut validator = Validator::new(ValidationFlags::all(), Capabilities::all());
    validator
        .validate(&module)
        .map_err(|err| validation_log(&err, &placed, line_offset))?;

    Ok(StageInterface::of(&module, stage, &placed))
}

fn link_stages(
    shaders: &HashMap<ShaderId, ShaderObject>,
    attached: &[ShaderId],
) -> Result<(), String> {
    let mut errors = Vec::new();
    let mut vertex = None;
    let mut fragment = None;

    for id in attached {
        let Some(object) = shaders.get(id) else {
            errors.push(format!("error: attached shader {id} no longer exists"));
            continue;
        };
        if !object.compiled {
            errors.push(format!(
                "error: {} shader {id} has not been compiled successfully",
                object.stage
            ));
            continue;
        }
        let slot = match object.stage {
            StageKind::Vertex => &mut vertex,
            StageKind::Fragment => &mut fragment,
        };
        if slot.replace(&object.interface).is_some() {
            errors.push(format!("error: more than one {} shader attached", object.stage));
        }
    }

    match (vertex, fragment) {
        (Some(vertex), Some(fragment)) => {
            for input in &fragment.inputs {
                let Some(output) = vertex
                    .outputs
                    .iter()
                    .find(|output| input.is_fed_by(output))
                else {
                    errors.push(format!(
                        "error: fragment input {} is not written by the vertex shader",
                        input.label()
                    ));
                    continue;
                };
                if let (Some(expected), Some(found)) = (&input.ty, &output.ty) {
                    if expected != found {
                        errors.push(format!(
                            "error: fragment input {} is {} but the vertex shader writes {}",
                            input.label(),
                            GlslType(expected),
                            GlslType(found)
                        ));
                    }
                }
            }
        }
        (vertex, fragment) => {
            if vertex.is_none() {
                errors.push("error: program has no compiled vertex shader".to_string());
            }
            if fragment.is_none() {
                errors.push("error: program has no compiled fragment shader".to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("\n"))
    }
}

impl Driver for NagaDriver {
    fn create_shader(&mut self, stage: StageKind) -> Result<ShaderId, DriverError> {
        let raw = self.next_handle("shader")?;
        let id = ShaderId::new(raw).ok_or(DriverError::Allocation("shader"))?;
        self.shaders.insert(
            id,
            ShaderObject {
                stage,
                source: String::new(),
                compiled: false,
                interface: StageInterface::default(),
                log: String::new(),
                delete_pending: false,
            },
        );
        Ok(id)
    }

    fn shader_source(&mut self, shader: ShaderId, source: &str) -> Result<(), DriverError> {
        if let Some(position) = source.find('\0') {
            return Err(DriverError::InteriorNul(position));
        }
        let object = self
            .shaders
            .get_mut(&shader)
            .ok_or(DriverError::UnknownHandle {
                kind: "shader",
                handle: shader.get(),
            })?;
        object.source = source.to_owned();
        Ok(())
    }

    fn compile_shader(&mut self, shader: ShaderId) {
        let Some(object) = self.shaders.get_mut(&shader) else {
            tracing::warn!(shader = shader.get(), "compile requested for unknown shader");
            return;
        };

        let result = {
            let (source, line_offset) = normalize_version(&object.source, self.target_version);
            if line_offset > 0 {
                tracing::debug!(
                    shader = shader.get(),
                    version = self.target_version,
                    "no #version directive; prepended target version"
                );
            }
            compile_module(&mut self.frontend, object.stage, &source, line_offset)
        };

        match result {
            Ok(interface) => {
                object.compiled = true;
                object.interface = interface;
                object.log.clear();
            }
            Err(log) => {
                object.compiled = false;
                object.interface = StageInterface::default();
                object.log = log;
            }
        }
    }

    fn compile_status(&self, shader: ShaderId) -> bool {
        self.shaders
            .get(&shader)
            .is_some_and(|object| object.compiled)
    }

    fn shader_info_log(&self, shader: ShaderId) -> String {
        self.shaders
            .get(&shader)
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: ShaderId) {
        if self.is_attached(shader) {
            if let Some(object) = self.shaders.get_mut(&shader) {
                object.delete_pending = true;
            }
        } else {
            self.shaders.remove(&shader);
        }
    }

    fn create_program(&mut self) -> Result<ProgramId, DriverError> {
        let raw = self.next_handle("program")?;
        let id = ProgramId::new(raw).ok_or(DriverError::Allocation("program"))?;
        self.programs.insert(id, ProgramObject::default());
        Ok(id)
    }

    fn attach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if !self.shaders.contains_key(&shader) {
            tracing::warn!(shader = shader.get(), "attach requested for unknown shader");
            return;
        }
        match self.programs.get_mut(&program) {
            Some(object) if !object.attached.contains(&shader) => object.attached.push(shader),
            Some(_) => {}
            None => tracing::warn!(program = program.get(), "attach requested for unknown program"),
        }
    }

    fn detach_shader(&mut self, program: ProgramId, shader: ShaderId) {
        if let Some(object) = self.programs.get_mut(&program) {
            object.attached.retain(|attached| *attached != shader);
        }
        self.collect_if_orphaned(shader);
    }

    fn link_program(&mut self, program: ProgramId) {
        let Some(object) = self.programs.get_mut(&program) else {
            tracing::warn!(program = program.get(), "link requested for unknown program");
            return;
        };
        object.validated = false;
        match link_stages(&self.shaders, &object.attached) {
            Ok(()) => {
                object.linked = true;
                object.log.clear();
            }
            Err(log) => {
                object.linked = false;
                object.log = log;
            }
        }
    }

    fn link_status(&self, program: ProgramId) -> bool {
        self.programs
            .get(&program)
            .is_some_and(|object| object.linked)
    }

    fn validate_program(&mut self, program: ProgramId) {
        let Some(object) = self.programs.get_mut(&program) else {
            tracing::warn!(program = program.get(), "validate requested for unknown program");
            return;
        };
        object.validated = object.linked;
        if !object.linked {
            object.log = "error: program is not successfully linked".to_string();
        }
    }

    fn validate_status(&self, program: ProgramId) -> bool {
        self.programs
            .get(&program)
            .is_some_and(|object| object.validated)
    }

    fn program_info_log(&self, program: ProgramId) -> String {
        self.programs
            .get(&program)
            .map(|object| object.log.clone())
            .unwrap_or_default()
    }

    fn delete_program(&mut self, program: ProgramId) {
        if let Some(object) = self.programs.remove(&program) {
            for shader in object.attached {
                self.collect_if_orphaned(shader);
            }
        }
    }
}
