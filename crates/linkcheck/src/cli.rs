use std::path::PathBuf;

use clap::{Parser, Subcommand};
use shaderlink::{StageKind, ValidationPolicy, SUPPORTED_VERSIONS};

#[derive(Parser, Debug)]
#[command(
    name = "linkcheck",
    author,
    version,
    about = "Compile and link a GLSL vertex/fragment shader pair"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: CheckArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// Vertex shader source (defaults to the built-in passthrough shader).
    #[arg(long, value_name = "FILE")]
    pub vertex: Option<PathBuf>,

    /// Fragment shader source (defaults to the built-in solid red shader).
    #[arg(long, value_name = "FILE")]
    pub fragment: Option<PathBuf>,

    /// TOML configuration file; can also be supplied via the `LINKCHECK_CONFIG` env var.
    #[arg(long, env = "LINKCHECK_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// What to do when the linked program fails validation: `skip`, `warn`, or `enforce`.
    #[arg(long, value_name = "MODE", value_parser = parse_validation)]
    pub validation: Option<ValidationPolicy>,

    /// GLSL version substituted for directives naga cannot parse (440, 450, or 460).
    #[arg(long, value_name = "VERSION", value_parser = parse_glsl_version)]
    pub glsl_version: Option<u16>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print a built-in shader to stdout.
    Builtin {
        #[arg(value_name = "STAGE", value_parser = parse_stage)]
        stage: StageKind,
    },
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_validation(value: &str) -> Result<ValidationPolicy, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("validation mode must not be empty".to_string());
    }

    let normalized = trimmed.to_ascii_lowercase();
    match normalized.as_str() {
        "skip" | "off" | "none" => Ok(ValidationPolicy::Skip),
        "warn" | "default" => Ok(ValidationPolicy::Warn),
        "enforce" | "strict" => Ok(ValidationPolicy::Enforce),
        other => Err(format!(
            "unknown validation mode '{other}'; expected skip, warn, or enforce"
        )),
    }
}

pub fn parse_glsl_version(value: &str) -> Result<u16, String> {
    let version: u16 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid GLSL version '{}'", value.trim()))?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(format!(
            "unsupported GLSL version {version}; supported values are 440, 450, or 460"
        ));
    }
    Ok(version)
}

pub fn parse_stage(value: &str) -> Result<StageKind, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "vertex" | "vert" | "vs" => Ok(StageKind::Vertex),
        "fragment" | "frag" | "fs" => Ok(StageKind::Fragment),
        other => Err(format!("unknown stage '{other}'; expected vertex or fragment")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_validation_aliases() {
        assert_eq!(parse_validation("skip").unwrap(), ValidationPolicy::Skip);
        assert_eq!(parse_validation(" Warn ").unwrap(), ValidationPolicy::Warn);
        assert_eq!(
            parse_validation("strict").unwrap(),
            ValidationPolicy::Enforce
        );
        assert!(parse_validation("").is_err());
        assert!(parse_validation("sometimes").is_err());
    }

    #[test]
    fn glsl_version_must_be_supported_by_naga() {
        assert_eq!(parse_glsl_version("460").unwrap(), 460);
        assert!(parse_glsl_version("330").is_err());
        assert!(parse_glsl_version("latest").is_err());
    }

    #[test]
    fn parses_builtin_subcommand() {
        let cli = Cli::try_parse_from(["linkcheck", "builtin", "frag"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Builtin {
                stage: StageKind::Fragment
            })
        ));
    }

    #[test]
    fn parses_check_flags() {
        let cli = Cli::try_parse_from([
            "linkcheck",
            "--vertex",
            "quad.vert",
            "--validation",
            "enforce",
            "--glsl-version",
            "440",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.vertex, Some(PathBuf::from("quad.vert")));
        assert_eq!(cli.run.fragment, None);
        assert_eq!(cli.run.validation, Some(ValidationPolicy::Enforce));
        assert_eq!(cli.run.glsl_version, Some(440));
    }
}
