//! The red quad shader pair: positions pass straight through and every
//! fragment is solid red.

use crate::types::StageKind;

/// Forwards the attribute at location 0 as the clip-space position.
pub const PASSTHROUGH_VERTEX: &str = r"#version 330 core

layout(location = 0) in vec4 position;

void main()
{
    gl_Position = position;
}
";

/// Writes opaque red to colour attachment 0.
pub const SOLID_RED_FRAGMENT: &str = r"#version 330 core

layout(location = 0) out vec4 color;

void main()
{
    color = vec4(1.0, 0.0, 0.0, 1.0);
}
";

pub fn source_for(stage: StageKind) -> &'static str {
    match stage {
        StageKind::Vertex => PASSTHROUGH_VERTEX,
        StageKind::Fragment => SOLID_RED_FRAGMENT,
    }
}
