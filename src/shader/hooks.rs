//! Per-instance property override hooks.
//!
//! Every optional property of a shape owns a setter function. Style code
//! always calls through the setter, so a program composed without the
//! property still links: the setter simply has an empty body and no
//! attribute feeds it.

use std::collections::BTreeSet;

use super::builder::{MainPhase, ShaderBuilder, ShaderConfigError, VertexSlot};
use crate::annotation::PropertyId;

/// Setter contract for one optional property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyHook {
    /// Property the setter consumes.
    pub property: PropertyId,
    /// WGSL function name.
    pub setter: &'static str,
    /// Body of the real setter; reads its argument as `value`.
    pub body: &'static str,
}

impl PropertyHook {
    /// WGSL for the setter, real or null.
    #[must_use]
    pub fn setter_source(&self, active: bool) -> String {
        let ty = self.property.ty();
        if active {
            format!(
                "fn {}(value: {ty}) {{\n    {}\n}}\n",
                self.setter, self.body
            )
        } else {
            format!("fn {}(value: {ty}) {{}}\n", self.setter)
        }
    }
}

/// Contribute setters for every hook, plus attributes and invocations for
/// the active ones.
///
/// Property attributes are declared in [`PropertyId`] order, matching how
/// instance batches pack their property stream.
///
/// # Errors
///
/// A setter or attribute conflicts with an earlier contribution.
pub fn declare_hooks(
    builder: &mut ShaderBuilder,
    hooks: &[PropertyHook],
    active: &BTreeSet<PropertyId>,
) -> Result<(), ShaderConfigError> {
    let mut ordered = hooks.to_vec();
    ordered.sort_by_key(|hook| hook.property);

    for hook in &ordered {
        let enabled = active.contains(&hook.property);
        builder.add_code(hook.setter, &hook.setter_source(enabled))?;
        if enabled {
            let name = hook.property.name();
            builder.add_attribute(
                name,
                hook.property.ty(),
                VertexSlot::Properties,
            )?;
            builder.add_main(
                hook.setter,
                MainPhase::Overrides,
                &format!("{}(a_{name});", hook.setter),
            )?;
        }
    }
    Ok(())
}
