//! Pick-ID assignment and selection highlight.
//!
//! Each instance owns `ids_per_instance` consecutive pick IDs starting at
//! `pick_base + instance_index * ids_per_instance`; part 0 is the whole
//! object. Resolvers may set the private `pick_part` to report a sub-part
//! (a cone's end caps); the fragment stage writes the sum into target 1.
//! `selected_index` holds an absolute pick ID, so any part of an instance
//! selects the whole of it.

use super::builder::{MainPhase, ShaderBuilder, ShaderConfigError, WgslType};

/// `selected_index` value meaning nothing is selected.
pub const NO_SELECTION: u32 = u32::MAX;

fn pick_source(ids_per_instance: u32, highlight: &[&str]) -> String {
    let mut source = format!(
        "fn highlight(color: vec4<f32>) -> vec4<f32> {{\n    \
         return vec4<f32>(mix(color.rgb, vec3<f32>(1.0), u.highlight_mix), \
         color.a);\n}}\n\n\
         fn assign_pick_id(part: u32) {{\n    \
         let first = u.pick_base + instance_index * {ids_per_instance}u;\n    \
         v_pick_id = first + part;\n    \
         if u.selected_index != {NO_SELECTION}u \
         && u.selected_index >= first \
         && u.selected_index - first < {ids_per_instance}u {{\n"
    );
    for varying in highlight {
        source.push_str(&format!(
            "        v_{varying} = highlight(v_{varying});\n"
        ));
    }
    source.push_str("    }\n}\n");
    source
}

/// Instance and part owning `pick_id` in a batch drawn from `pick_base`.
///
/// `None` for the background and for IDs before `pick_base`.
#[must_use]
pub fn decode_pick_id(
    pick_id: u32,
    pick_base: u32,
    ids_per_instance: u32,
) -> Option<(u32, u32)> {
    if pick_id == 0 || ids_per_instance == 0 {
        return None;
    }
    let offset = pick_id.checked_sub(pick_base)?;
    Some((offset / ids_per_instance, offset % ids_per_instance))
}

/// Contribute pick-ID code. Runs after property overrides so the
/// highlight mixes the final colour of every varying in `highlight`.
///
/// # Errors
///
/// A pick uniform or varying conflicts with an earlier contribution.
pub fn declare_pick(
    builder: &mut ShaderBuilder,
    ids_per_instance: u32,
    highlight: &[&str],
) -> Result<(), ShaderConfigError> {
    builder.add_uniform("pick_base", WgslType::U32)?;
    builder.add_uniform("selected_index", WgslType::U32)?;
    builder.add_uniform("highlight_mix", WgslType::F32)?;
    builder.add_varying("pick_id", WgslType::U32)?;
    builder.add_private("pick_part", WgslType::U32)?;
    builder.add_code("pick", &pick_source(ids_per_instance, highlight))?;
    builder.add_main("assign_pick_id", MainPhase::Pick, "assign_pick_id(0u);")?;
    builder.add_main(
        "write_pick_id",
        MainPhase::Output,
        "frag_pick_id = v_pick_id + pick_part;",
    )
}
