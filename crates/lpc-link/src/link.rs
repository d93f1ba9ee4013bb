//! Link driver: the full varying assignment sequence for one
//! producer/consumer pair.

use alloc::vec::Vec;

use log::debug;
use lpc_glir::{Shader, ShaderStage, VariableMode};

use crate::{
    error::{InfoLog, LinkError, LinkResult},
    lower_clip_distance::lower_clip_distance,
    lower_packed::lower_packed_varyings,
    lower_structs::lower_varying_structs,
    matching::{
        cross_validate_outputs_to_inputs, demote_unmatched_inputs, demote_unmatched_outputs,
        match_varyings, record_flattened_pairs, VaryingMatches,
    },
    options::{ClipDistanceLowering, LinkOptions, TransformFeedbackOptions},
    packing::assign_locations,
    tfeedback::{parse_tfeedback_decls, store_tfeedback_info, TfeedbackDecl, TransformFeedbackInfo},
};

/// Outcome of [`link_varyings`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinkedVaryings {
    /// Generic slots used, counted from the generic varying base
    pub slots_used: u32,
    pub tfeedback: TransformFeedbackInfo,
}

fn report(log: &mut InfoLog, error: LinkError) -> LinkError {
    log.error(&error);
    error
}

/// Log every error; fail with the first one.
fn report_all(log: &mut InfoLog, errors: Vec<LinkError>) -> LinkResult<()> {
    let mut first = None;
    for error in errors {
        log.error(&error);
        first.get_or_insert(error);
    }
    match first {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

/// Clip distance handling that applies to `producer`: only vertex and
/// geometry shaders write clip distances.
fn clip_distance_for(producer: &Shader, options: &LinkOptions) -> ClipDistanceLowering {
    match producer.stage {
        ShaderStage::Vertex | ShaderStage::Geometry => options.clip_distance,
        ShaderStage::Fragment => ClipDistanceLowering::Native,
    }
}

/// Assign locations to every varying between `producer` and `consumer`.
///
/// `consumer` is `None` when the producer's outputs are only captured by
/// transform feedback. Every error is appended to `log`; the first
/// one is returned. Returns the number of generic slots used.
pub fn assign_varying_locations(
    producer: &mut Shader,
    mut consumer: Option<&mut Shader>,
    tfeedback_decls: &mut [TfeedbackDecl],
    options: &LinkOptions,
    tfeedback_options: &TransformFeedbackOptions,
    log: &mut InfoLog,
) -> LinkResult<u32> {
    let consumer_stage = consumer.as_deref().map(|consumer| consumer.stage);
    if clip_distance_for(producer, options).is_lowered() {
        lower_clip_distance(producer).map_err(|e| report(log, e))?;
    }

    if let Some(consumer) = consumer.as_deref() {
        cross_validate_outputs_to_inputs(producer, consumer)
            .or_else(|errors| report_all(log, errors))?;
    }

    let mut matches = VaryingMatches::new(options.disable_varying_packing);
    if options.lower_varying_structs {
        let outputs =
            lower_varying_structs(producer, VariableMode::ShaderOut).map_err(|e| report(log, e))?;
        if let Some(consumer) = consumer.as_deref_mut() {
            let inputs = lower_varying_structs(consumer, VariableMode::ShaderIn)
                .map_err(|e| report(log, e))?;
            record_flattened_pairs(producer, &outputs, consumer, &inputs, &mut matches);
        }
    }

    match_varyings(producer, consumer.as_deref(), &mut matches);

    // Captured outputs need a location even when nothing reads them.
    for decl in tfeedback_decls.iter().filter(|decl| decl.is_varying()) {
        let var = decl.find_output_var(producer).map_err(|e| report(log, e))?;
        matches.record(producer, var, None);
    }

    let layout = assign_locations(&matches);
    let slots_used = layout.slots_used();
    if slots_used > options.max_varying_slots {
        return Err(report(
            log,
            LinkError::TooManyVaryings {
                slots: slots_used,
                max: options.max_varying_slots,
            },
        ));
    }
    layout.store(
        &matches,
        producer,
        consumer.as_deref_mut(),
        options.generic_varying_base,
    );

    let demoted = demote_unmatched_outputs(producer);
    if demoted > 0 {
        debug!("{} unused {} outputs demoted", demoted, producer.stage);
    }
    if let Some(consumer) = consumer.as_deref_mut() {
        demote_unmatched_inputs(consumer, Some(producer.stage), options.unmatched_inputs, log)
            .or_else(|errors| report_all(log, errors))?;
    }

    for decl in tfeedback_decls.iter_mut().filter(|decl| decl.is_varying()) {
        let var = decl.find_output_var(producer).map_err(|e| report(log, e))?;
        decl.assign_location(
            producer,
            var,
            tfeedback_options,
            options.disable_varying_packing,
        )
        .map_err(|e| report(log, e))?;
    }

    if options.lower_packed_varyings && !options.disable_varying_packing {
        let base = options.generic_varying_base;
        lower_packed_varyings(producer, VariableMode::ShaderOut, base, slots_used)
            .map_err(|e| report(log, e))?;
        if let Some(consumer) = consumer {
            lower_packed_varyings(consumer, VariableMode::ShaderIn, base, slots_used)
                .map_err(|e| report(log, e))?;
        }
    }

    debug!(
        "{} -> {:?}: {} varyings in {} slots",
        producer.stage,
        consumer_stage,
        matches.len(),
        slots_used
    );
    Ok(slots_used)
}

/// Link the varyings of a producer/consumer pair, including transform
/// feedback capture of `tfeedback_names`.
pub fn link_varyings<S: AsRef<str>>(
    producer: &mut Shader,
    consumer: Option<&mut Shader>,
    tfeedback_names: &[S],
    options: &LinkOptions,
    tfeedback_options: &TransformFeedbackOptions,
    log: &mut InfoLog,
) -> LinkResult<LinkedVaryings> {
    let clip_distance = clip_distance_for(producer, options);
    let mut decls = parse_tfeedback_decls(tfeedback_names, tfeedback_options, clip_distance)
        .map_err(|e| report(log, e))?;
    let slots_used = assign_varying_locations(
        producer,
        consumer,
        &mut decls,
        options,
        tfeedback_options,
        log,
    )?;
    let tfeedback = store_tfeedback_info(&decls, tfeedback_options).map_err(|e| report(log, e))?;
    Ok(LinkedVaryings {
        slots_used,
        tfeedback,
    })
}
