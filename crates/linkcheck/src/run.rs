use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use shaderlink::{
    builtin, CompileError, CompilerOptions, NagaDriver, ShaderCompiler, StageKind,
    ValidationPolicy, DEFAULT_TARGET_VERSION,
};
use tracing_subscriber::EnvFilter;

use crate::cli::CheckArgs;
use crate::config::LinkConfig;

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Where a stage's source text came from, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Origin {
    Builtin,
    File(PathBuf),
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Builtin => f.write_str("built-in"),
            Origin::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug)]
pub struct LoadedSource {
    pub origin: Origin,
    pub text: String,
}

/// Fully resolved inputs for one check: CLI flags win over the config file,
/// which wins over built-in defaults.
#[derive(Debug)]
pub struct CheckPlan {
    pub vertex: LoadedSource,
    pub fragment: LoadedSource,
    pub validation: ValidationPolicy,
    pub glsl_version: u16,
}

impl CheckPlan {
    fn source(&self, stage: StageKind) -> &LoadedSource {
        match stage {
            StageKind::Vertex => &self.vertex,
            StageKind::Fragment => &self.fragment,
        }
    }
}

pub fn run(args: CheckArgs) -> Result<ExitCode> {
    let config = match args.config.as_deref() {
        Some(path) => load_config(path)?,
        None => LinkConfig::default(),
    };
    let plan = resolve_plan(&args, config)?;
    tracing::debug!(
        vertex = %plan.vertex.origin,
        fragment = %plan.fragment.origin,
        validation = %plan.validation,
        glsl_version = plan.glsl_version,
        "resolved shader pair"
    );

    let mut driver = NagaDriver::with_target_version(plan.glsl_version)
        .context("failed to configure software shader driver")?;
    let mut compiler = ShaderCompiler::with_options(
        &mut driver,
        CompilerOptions {
            validation: plan.validation,
        },
    );

    let code = match compiler.compile_program(&plan.vertex.text, &plan.fragment.text) {
        Ok(program) => {
            println!(
                "linked program {} ({} + {})",
                program.id(),
                plan.vertex.origin,
                plan.fragment.origin
            );
            compiler.release_program(program);
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("{}", describe_failure(&plan, &err));
            ExitCode::FAILURE
        }
    };

    tracing::debug!(
        shaders = driver.live_shaders(),
        programs = driver.live_programs(),
        "driver objects remaining"
    );
    Ok(code)
}

fn describe_failure(plan: &CheckPlan, err: &CompileError) -> String {
    match err.stage() {
        Some(stage) => format!("{}: {err}", plan.source(stage).origin),
        None => format!("{} + {}: {err}", plan.vertex.origin, plan.fragment.origin),
    }
}

pub fn load_config(path: &Path) -> Result<LinkConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config = LinkConfig::from_toml_str(&contents)
        .with_context(|| format!("failed to load config file at {}", path.display()))?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    Ok(config.resolve_paths(base))
}

pub fn resolve_plan(args: &CheckArgs, config: LinkConfig) -> Result<CheckPlan> {
    let vertex_path = args.vertex.clone().or(config.shaders.vertex);
    let fragment_path = args.fragment.clone().or(config.shaders.fragment);

    Ok(CheckPlan {
        vertex: load_source(StageKind::Vertex, vertex_path)?,
        fragment: load_source(StageKind::Fragment, fragment_path)?,
        validation: args
            .validation
            .or(config.validation.map(ValidationPolicy::from))
            .unwrap_or_default(),
        glsl_version: args
            .glsl_version
            .or(config.glsl_version)
            .unwrap_or(DEFAULT_TARGET_VERSION),
    })
}

fn load_source(stage: StageKind, path: Option<PathBuf>) -> Result<LoadedSource> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(&path).with_context(|| {
                format!("failed to read {stage} shader at {}", path.display())
            })?;
            Ok(LoadedSource {
                origin: Origin::File(path),
                text,
            })
        }
        None => Ok(LoadedSource {
            origin: Origin::Builtin,
            text: builtin::source_for(stage).to_string(),
        }),
    }
}
