//! Interface linker between GLSL shader stages.
//!
//! This crate takes a producer stage and the consumer stage that follows it
//! and:
//! - records which interface components each stage actually uses
//!   ([`set_program_inouts`])
//! - validates and pairs producer outputs with consumer inputs
//! - packs the pairs into hardware slots
//! - lowers struct varyings and non-vec4 varyings for backends that need it
//! - parses and lays out transform feedback captures
//!
//! [`link_varyings`] runs the whole sequence.

#![no_std]

extern crate alloc;

mod error;
mod inouts;
mod link;
mod lower_clip_distance;
mod lower_packed;
mod lower_structs;
mod mask;
mod matching;
mod options;
mod packing;
mod tfeedback;

pub use error::{InfoLog, InternalFault, LinkError, LinkResult};
pub use inouts::{set_program_inouts, ProgramInterface};
pub use link::{assign_varying_locations, link_varyings, LinkedVaryings};
pub use lower_clip_distance::lower_clip_distance;
pub use lower_packed::{lower_packed_varyings, needs_lowering};
pub use lower_structs::lower_varying_structs;
pub use mask::ComponentMask;
pub use matching::{
    cross_validate_outputs_to_inputs, demote_unmatched_inputs, demote_unmatched_outputs,
    match_varyings, packing_class, record_flattened_pairs, PackingOrder, VaryingMatch,
    VaryingMatches,
};
pub use options::{
    BufferMode, ClipDistanceLowering, LinkOptions, TransformFeedbackOptions, UnmatchedInputPolicy,
};
pub use packing::{assign_locations, PackedLayout, Placement};
pub use tfeedback::{
    parse_tfeedback_decls, store_tfeedback_info, TfeedbackDecl, TfeedbackOutput, TfeedbackVarying,
    TransformFeedbackInfo,
};
