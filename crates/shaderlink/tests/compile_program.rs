#![cfg(feature = "naga-glsl")]

use shaderlink::builtin::{PASSTHROUGH_VERTEX, SOLID_RED_FRAGMENT};
use shaderlink::{
    CompileError, CompileState, CompilerOptions, NagaDriver, ShaderCompiler, ShaderSource,
    StageKind, ValidationPolicy,
};

const UNBALANCED_VERTEX: &str = r"#version 330 core

layout(location = 0) in vec4 position;

void main()
{
    gl_Position = position;
";

const UNDECLARED_FRAGMENT: &str = r"#version 330 core

layout(location = 0) out vec4 color;

void main()
{
    color = vec4(missing, 0.0, 0.0, 1.0);
}
";

const TINTED_VERTEX: &str = r"#version 450

layout(location = 0) in vec4 position;
layout(location = 0) out vec3 tint;

void main()
{
    tint = position.xyz;
    gl_Position = position;
}
";

const TINTED_FRAGMENT: &str = r"#version 450

layout(location = 0) in vec3 tint;
layout(location = 0) out vec4 color;

void main()
{
    color = vec4(tint, 1.0);
}
";

const NAMED_VERTEX: &str = r"#version 330 core

layout(location = 0) in vec4 position;
out vec3 vColor;
out vec2 vUv;

void main()
{
    vColor = position.xyz;
    vUv = position.xy;
    gl_Position = position;
}
";

const NAMED_FRAGMENT: &str = r"#version 330 core

in vec2 vUv;
in vec3 vColor;
out vec4 color;

void main()
{
    color = vec4(vColor * vUv.x, 1.0);
}
";

fn compiler() -> ShaderCompiler<NagaDriver> {
    ShaderCompiler::new(NagaDriver::new())
}

#[test]
fn builtin_pair_links_to_nonzero_program() {
    let mut compiler = compiler();
    let program = compiler
        .compile_program(PASSTHROUGH_VERTEX, SOLID_RED_FRAGMENT)
        .expect("builtin shaders should link");

    assert!(program.id().get() > 0);
    assert_eq!(compiler.state(), CompileState::Linked);
    assert_eq!(compiler.driver().live_shaders(), 0);
    assert_eq!(compiler.driver().live_programs(), 1);

    compiler.release_program(program);
    assert_eq!(compiler.driver().live_programs(), 0);
}

#[test]
fn unbalanced_vertex_braces_fail_vertex_stage() {
    let mut compiler = compiler();
    let err = compiler
        .compile_program(UNBALANCED_VERTEX, SOLID_RED_FRAGMENT)
        .unwrap_err();

    assert!(matches!(
        err,
        CompileError::StageCompile {
            stage: StageKind::Vertex,
            ..
        }
    ));
    assert!(err.log().contains("error"), "log was: {}", err.log());
    assert_eq!(compiler.state(), CompileState::Failed);
    assert_eq!(compiler.driver().live_shaders(), 0);
    assert_eq!(compiler.driver().live_programs(), 0);
}

#[test]
fn undeclared_fragment_variable_releases_vertex_stage() {
    let mut compiler = compiler();
    let err = compiler
        .compile_program(PASSTHROUGH_VERTEX, UNDECLARED_FRAGMENT)
        .unwrap_err();

    assert_eq!(err.stage(), Some(StageKind::Fragment));
    assert!(err.log().contains("error"), "log was: {}", err.log());
    assert!(err.to_string().starts_with("failed to compile fragment shader"));
    assert_eq!(compiler.driver().live_shaders(), 0);
    assert_eq!(compiler.driver().live_programs(), 0);
}

#[test]
fn identical_sources_produce_independent_programs() {
    let mut compiler = compiler();
    let first = compiler
        .compile_program(PASSTHROUGH_VERTEX, SOLID_RED_FRAGMENT)
        .unwrap();
    let second = compiler
        .compile_program(PASSTHROUGH_VERTEX, SOLID_RED_FRAGMENT)
        .unwrap();

    assert_ne!(first.id(), second.id());
    assert_eq!(compiler.driver().live_programs(), 2);

    compiler.release_program(first);
    compiler.release_program(second);
    assert_eq!(compiler.driver().live_programs(), 0);
}

#[test]
fn each_stage_compile_allocates_one_shader() {
    let mut compiler = compiler();
    let vertex = compiler
        .compile_stage(StageKind::Vertex, PASSTHROUGH_VERTEX)
        .unwrap();
    assert_eq!(compiler.driver().live_shaders(), 1);
    let fragment = compiler
        .compile_stage(StageKind::Fragment, SOLID_RED_FRAGMENT)
        .unwrap();
    assert_eq!(compiler.driver().live_shaders(), 2);

    let program = compiler.link_program(vertex, fragment).unwrap();
    assert_eq!(compiler.driver().live_shaders(), 0);
    compiler.release_program(program);
}

#[test]
fn matching_varyings_link() {
    let mut compiler = compiler();
    let program = compiler
        .compile_program(TINTED_VERTEX, TINTED_FRAGMENT)
        .expect("varyings at the same location should link");
    compiler.release_program(program);
    assert_eq!(compiler.driver().live_programs(), 0);
}

#[test]
fn unwritten_fragment_input_fails_link() {
    let fragment = TINTED_FRAGMENT.replace("location = 0) in", "location = 1) in");
    let mut compiler = compiler();
    let err = compiler
        .compile_program(TINTED_VERTEX, &fragment)
        .unwrap_err();

    assert!(matches!(err, CompileError::ProgramLink { .. }));
    assert!(err.log().contains("location 1"), "log was: {}", err.log());
    assert_eq!(compiler.state(), CompileState::Failed);
    assert_eq!(compiler.driver().live_shaders(), 0);
    assert_eq!(compiler.driver().live_programs(), 0);
}

#[test]
fn mismatched_varying_types_fail_link() {
    let vertex = TINTED_VERTEX
        .replace("out vec3 tint", "out vec4 tint")
        .replace("tint = position.xyz", "tint = position");
    let mut compiler = compiler();
    let err = compiler
        .compile_program(&vertex, TINTED_FRAGMENT)
        .unwrap_err();

    assert!(matches!(err, CompileError::ProgramLink { .. }));
    assert!(err.log().contains("is vec3 but the vertex shader writes vec4"));
}

#[test]
fn missing_version_reports_caller_line_numbers() {
    let vertex = "layout(location = 0) in vec4 position;\n\nvoid main()\n{\n    gl_Position = positon;\n}\n";
    let mut compiler = compiler();
    let err = compiler
        .compile_stage(StageKind::Vertex, vertex)
        .unwrap_err();

    assert!(err.log().contains("0:5:"), "log was: {}", err.log());
    assert_eq!(compiler.driver().live_shaders(), 0);
}

#[test]
fn tagged_sources_compile_through_the_same_path() {
    let mut compiler = ShaderCompiler::with_options(
        NagaDriver::with_target_version(460).unwrap(),
        CompilerOptions {
            validation: ValidationPolicy::Enforce,
        },
    );
    let program = compiler
        .compile_program_from(
            &ShaderSource::vertex(PASSTHROUGH_VERTEX),
            &ShaderSource::fragment(SOLID_RED_FRAGMENT),
        )
        .unwrap();
    compiler.release_program(program);

    let driver = compiler.into_driver();
    assert_eq!(driver.live_shaders(), 0);
    assert_eq!(driver.live_programs(), 0);
}

#[test]
fn unlocated_varyings_link_by_name() {
    let mut compiler = compiler();
    let program = compiler
        .compile_program(NAMED_VERTEX, NAMED_FRAGMENT)
        .expect("varyings declared without locations should link by name");
    assert_eq!(compiler.state(), CompileState::Linked);
    compiler.release_program(program);
}

#[test]
fn renamed_unlocated_varying_fails_link() {
    let fragment = NAMED_FRAGMENT
        .replace("in vec3 vColor", "in vec3 vTint")
        .replace("vColor * vUv.x", "vTint * vUv.x");
    let mut compiler = compiler();
    let err = compiler
        .compile_program(NAMED_VERTEX, &fragment)
        .unwrap_err();

    assert!(matches!(err, CompileError::ProgramLink { .. }));
    assert!(
        err.log()
            .contains("fragment input `vTint` is not written by the vertex shader"),
        "log was: {}",
        err.log()
    );
    assert_eq!(compiler.driver().live_shaders(), 0);
    assert_eq!(compiler.driver().live_programs(), 0);
}

#[test]
fn colliding_output_locations_name_the_cause_and_line() {
    let vertex = "#version 450\n\
                  layout(location = 0) in vec4 position;\n\
                  layout(location = 0) out vec3 a;\n\
                  layout(location = 0) out vec2 b;\n\
                  void main()\n\
                  {\n    a = position.xyz;\n    b = position.xy;\n    gl_Position = position;\n}\n";
    let mut compiler = compiler();
    let err = compiler
        .compile_stage(StageKind::Vertex, vertex)
        .unwrap_err();

    let log = err.log();
    assert!(log.starts_with("0:4: error: "), "log was: {log}");
    assert!(
        log.contains("Multiple bindings at location 0 are present"),
        "log was: {log}"
    );
}

#[test]
fn plain_uniform_compiles_without_binding() {
    let fragment = "#version 330 core\n\
                    uniform vec4 u_Color;\n\
                    layout(location = 0) out vec4 color;\n\
                    void main()\n{\n    color = u_Color;\n}\n";
    let mut compiler = compiler();
    let program = compiler
        .compile_program(PASSTHROUGH_VERTEX, fragment)
        .expect("a plain uniform should compile");
    compiler.release_program(program);
}

#[test]
fn uniform_block_without_binding_fails_fragment_stage() {
    let fragment = "#version 330 core\n\
                    uniform Tint { vec4 value; } tint;\n\
                    layout(location = 0) out vec4 color;\n\
                    void main()\n{\n    color = tint.value;\n}\n";
    let mut compiler = compiler();
    let err = compiler
        .compile_program(PASSTHROUGH_VERTEX, fragment)
        .unwrap_err();

    assert_eq!(err.stage(), Some(StageKind::Fragment));
    assert!(err.log().contains("layout(binding"), "log was: {}", err.log());
    assert_eq!(compiler.driver().live_shaders(), 0);
}
