//! Producer/consumer varying matching.

use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use log::{debug, trace};
use lpc_glir::{InterpQualifier, Shader, ShaderStage, Type, Var, VariableData, VariableMode};

use crate::{
    error::{InfoLog, LinkError},
    options::UnmatchedInputPolicy,
};

/// Placement priority within a packing class. Vec4s go first so that they
/// stay slot aligned; vec3s go last so that their spill-over lands at the
/// end of the class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PackingOrder {
    Vec4,
    Vec2,
    Scalar,
    Vec3,
}

impl PackingOrder {
    fn of(ty: &Type) -> Self {
        match ty.innermost_element().component_slots() % 4 {
            0 => PackingOrder::Vec4,
            2 => PackingOrder::Vec2,
            1 => PackingOrder::Scalar,
            _ => PackingOrder::Vec3,
        }
    }
}

/// A producer output paired with the consumer input it feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VaryingMatch {
    pub producer_var: Var,
    /// `None` for outputs only captured by transform feedback
    pub consumer_var: Option<Var>,
    pub num_components: u32,
    /// Varyings of different classes never share a slot
    pub packing_class: u32,
    pub packing_order: PackingOrder,
    /// Vector width of the innermost element (rows for matrices)
    pub element_width: u32,
}

/// Packing class: `centroid * 4 + interpolation`.
pub fn packing_class(data: &VariableData) -> u32 {
    (data.centroid as u32) * 4 + data.interpolation as u32
}

/// Match records in the order they were found.
#[derive(Debug, Clone, Default)]
pub struct VaryingMatches {
    disable_varying_packing: bool,
    matches: Vec<VaryingMatch>,
}

impl VaryingMatches {
    pub fn new(disable_varying_packing: bool) -> Self {
        Self {
            disable_varying_packing,
            matches: Vec::new(),
        }
    }

    pub fn packing_disabled(&self) -> bool {
        self.disable_varying_packing
    }

    /// Record a pair. Outputs that already have a location (built-ins with
    /// a fixed layout) or that were recorded before are ignored.
    pub fn record(&mut self, producer: &Shader, producer_var: Var, consumer_var: Option<Var>) {
        let data = &producer.vars[producer_var];
        if data.location.is_some() || self.contains_producer(producer_var) {
            return;
        }

        let num_components = if self.disable_varying_packing {
            4 * whole_slots(&data.ty)
        } else {
            data.ty.component_slots()
        };
        let record = VaryingMatch {
            producer_var,
            consumer_var,
            num_components,
            packing_class: packing_class(data),
            packing_order: PackingOrder::of(&data.ty),
            element_width: data.ty.innermost_element().vector_elements(),
        };
        trace!(
            "match {} class {} {:?} ({} components)",
            data.name,
            record.packing_class,
            record.packing_order,
            num_components
        );
        self.matches.push(record);
    }

    pub fn contains_producer(&self, var: Var) -> bool {
        self.matches.iter().any(|m| m.producer_var == var)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> core::slice::Iter<'_, VaryingMatch> {
        self.matches.iter()
    }

    pub fn as_slice(&self) -> &[VaryingMatch] {
        &self.matches
    }
}

/// Slots taken by a varying when every column or element gets its own slot.
fn whole_slots(ty: &Type) -> u32 {
    if ty.contains_record() {
        return (ty.component_slots() + 3) / 4;
    }
    match ty {
        Type::Array(element, length) => length * element.matrix_columns(),
        _ => ty.matrix_columns(),
    }
}

fn has_or_lacks(flag: bool) -> &'static str {
    if flag {
        "has"
    } else {
        "lacks"
    }
}

fn interpolation_value(interp: InterpQualifier) -> String {
    let mut value = "specifies ".to_string();
    value.push_str(interp.keyword().unwrap_or("no"));
    value
}

/// Check one output/input pair, appending every problem found.
fn validate_pair(
    producer: &Shader,
    consumer: &Shader,
    output: &VariableData,
    input: &VariableData,
    errors: &mut Vec<LinkError>,
) {
    let (producer_stage, consumer_stage) = (producer.stage, consumer.stage);

    // Geometry inputs carry an extra per-vertex array dimension.
    let input_ty = match (&input.ty, consumer_stage) {
        (Type::Array(element, _), ShaderStage::Geometry) => &**element,
        (_, ShaderStage::Geometry) => {
            errors.push(type_mismatch(producer_stage, consumer_stage, output, input));
            return;
        }
        (ty, _) => ty,
    };
    if &output.ty != input_ty {
        // Built-in arrays may be redeclared with different sizes.
        if output.ty.is_array() && output.is_builtin() {
            trace!("accepting resized built-in {}", output.name);
        } else if let (Type::Array(out_elem, out_len), Type::Array(in_elem, in_len)) =
            (&output.ty, input_ty)
        {
            if out_elem == in_elem {
                errors.push(LinkError::ArraySizeMismatch {
                    producer: producer_stage,
                    consumer: consumer_stage,
                    name: output.name.clone(),
                    producer_size: *out_len,
                    consumer_size: *in_len,
                });
                return;
            }
            errors.push(type_mismatch(producer_stage, consumer_stage, output, input));
            return;
        } else {
            errors.push(type_mismatch(producer_stage, consumer_stage, output, input));
            return;
        }
    }

    let qualifier = |qualifier: &'static str, producer_value: String, consumer_value: String| {
        LinkError::QualifierMismatch {
            producer: producer_stage,
            consumer: consumer_stage,
            name: output.name.clone(),
            qualifier,
            producer_value,
            consumer_value,
        }
    };
    if output.centroid != input.centroid {
        errors.push(qualifier(
            "centroid",
            has_or_lacks(output.centroid).to_string(),
            has_or_lacks(input.centroid).to_string(),
        ));
    }
    if output.invariant != input.invariant {
        errors.push(qualifier(
            "invariant",
            has_or_lacks(output.invariant).to_string(),
            has_or_lacks(input.invariant).to_string(),
        ));
    }
    if output.interpolation != input.interpolation {
        errors.push(qualifier(
            "interpolation",
            interpolation_value(output.interpolation),
            interpolation_value(input.interpolation),
        ));
    }
}

fn type_mismatch(
    producer: ShaderStage,
    consumer: ShaderStage,
    output: &VariableData,
    input: &VariableData,
) -> LinkError {
    LinkError::TypeMismatch {
        producer,
        consumer,
        name: output.name.clone(),
        producer_type: output.ty.to_string(),
        consumer_type: input.ty.to_string(),
    }
}

/// Fragment color inputs fed by the two-sided color outputs.
const COLOR_ALIASES: [(&str, [&str; 2]); 2] = [
    ("gl_Color", ["gl_FrontColor", "gl_BackColor"]),
    (
        "gl_SecondaryColor",
        ["gl_FrontSecondaryColor", "gl_BackSecondaryColor"],
    ),
];

/// Verify that every consumer input with a same-named producer output has a
/// compatible type and qualifiers. All problems are reported.
pub fn cross_validate_outputs_to_inputs(
    producer: &Shader,
    consumer: &Shader,
) -> Result<(), Vec<LinkError>> {
    let mut errors = Vec::new();

    for input in consumer.interface_vars() {
        let input = &consumer.vars[input];
        if input.mode != VariableMode::ShaderIn {
            continue;
        }
        if let Some(output) = producer.find_var(&input.name, VariableMode::ShaderOut) {
            validate_pair(producer, consumer, &producer.vars[output], input, &mut errors);
        }
    }

    for (input_name, output_names) in COLOR_ALIASES {
        let Some(input) = consumer.find_var(input_name, VariableMode::ShaderIn) else {
            continue;
        };
        for output_name in output_names {
            let Some(output) = producer.find_var(output_name, VariableMode::ShaderOut) else {
                continue;
            };
            if producer.is_var_referenced(output) {
                validate_pair(
                    producer,
                    consumer,
                    &producer.vars[output],
                    &consumer.vars[input],
                    &mut errors,
                );
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Pair unassigned producer outputs with same-named unassigned consumer
/// inputs.
pub fn match_varyings(producer: &Shader, consumer: Option<&Shader>, matches: &mut VaryingMatches) {
    let Some(consumer) = consumer else {
        return;
    };
    let outputs: Vec<Var> = producer
        .interface_vars()
        .filter(|var| {
            let data = &producer.vars[*var];
            data.mode == VariableMode::ShaderOut && data.location.is_none()
        })
        .collect();
    for output in outputs {
        let name = &producer.vars[output].name;
        let input = consumer
            .find_var(name, VariableMode::ShaderIn)
            .filter(|input| consumer.vars[*input].location.is_none());
        if let Some(input) = input {
            debug!("matched varying {}", name);
            matches.record(producer, output, Some(input));
        }
    }
}

/// Register flattened struct leaves. Leaves pair by their full dotted name.
pub fn record_flattened_pairs(
    producer: &Shader,
    producer_leaves: &[Var],
    consumer: &Shader,
    consumer_leaves: &[Var],
    matches: &mut VaryingMatches,
) {
    for &output in producer_leaves {
        let name = &producer.vars[output].name;
        if let Some(&input) = consumer_leaves
            .iter()
            .find(|input| &consumer.vars[**input].name == name)
        {
            debug!("matched flattened varying {}", name);
            matches.record(producer, output, Some(input));
        }
    }
}

/// Turn producer outputs that received no location into ordinary globals.
/// Returns how many were demoted.
pub fn demote_unmatched_outputs(producer: &mut Shader) -> usize {
    let dead: Vec<Var> = producer
        .interface_vars()
        .filter(|var| {
            let data = &producer.vars[*var];
            data.mode == VariableMode::ShaderOut && data.location.is_none()
        })
        .collect();
    for &var in &dead {
        debug!("demoting unused output {}", producer.vars[var].name);
        producer.vars[var].mode = VariableMode::Auto;
    }
    dead.len()
}

/// Handle consumer inputs that received no location.
///
/// Unreferenced inputs are always demoted. Referenced ones are link errors
/// under [`UnmatchedInputPolicy::Strict`]; under
/// [`UnmatchedInputPolicy::DefaultFill`] they are demoted with a warning.
pub fn demote_unmatched_inputs(
    consumer: &mut Shader,
    producer_stage: Option<ShaderStage>,
    policy: UnmatchedInputPolicy,
    log: &mut InfoLog,
) -> Result<(), Vec<LinkError>> {
    let unmatched: Vec<Var> = consumer
        .interface_vars()
        .filter(|var| {
            let data = &consumer.vars[*var];
            data.mode == VariableMode::ShaderIn && data.location.is_none()
        })
        .collect();

    let mut errors = Vec::new();
    for var in unmatched {
        let referenced = consumer.is_var_referenced(var);
        let name = &consumer.vars[var].name;
        match (referenced, policy) {
            (true, UnmatchedInputPolicy::Strict) => {
                errors.push(LinkError::UnmatchedInput {
                    producer: producer_stage,
                    consumer: consumer.stage,
                    name: name.clone(),
                });
                continue;
            }
            (true, UnmatchedInputPolicy::DefaultFill) => {
                log.warning(format_args!(
                    "{} shader input {} is not written by any previous stage and reads as zero",
                    consumer.stage, name
                ));
            }
            (false, _) => {}
        }
        debug!("demoting unmatched input {}", name);
        consumer.vars[var].mode = VariableMode::Auto;
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
