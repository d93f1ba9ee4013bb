//! Link configuration.

/// What to do with a consumer input that no producer output writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnmatchedInputPolicy {
    /// Referenced unmatched inputs are link errors
    #[default]
    Strict,
    /// Referenced unmatched inputs become ordinary globals (reading zero)
    /// and a warning is logged
    DefaultFill,
}

/// How the producer's `gl_ClipDistance` reaches the hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClipDistanceLowering {
    /// `gl_ClipDistance` stays a float array
    #[default]
    Native,
    /// `gl_ClipDistance` is packed into `gl_ClipDistanceMESA`, a vec4 array.
    /// `array_size` is the declared float count, which transform feedback
    /// reports verbatim.
    Lower { array_size: u32 },
}

impl ClipDistanceLowering {
    pub fn is_lowered(self) -> bool {
        matches!(self, ClipDistanceLowering::Lower { .. })
    }
}

/// Options for [`assign_varying_locations`](crate::assign_varying_locations).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// Give every varying whole, slot-aligned slots
    pub disable_varying_packing: bool,
    /// Rewrite non-vec4 varyings into dense `packed<N>` vec4s after
    /// assignment
    pub lower_packed_varyings: bool,
    /// Flatten struct varyings into one varying per leaf field
    pub lower_varying_structs: bool,
    pub unmatched_inputs: UnmatchedInputPolicy,
    /// First slot available to user-defined varyings
    pub generic_varying_base: u32,
    /// Number of slots available to user-defined varyings
    pub max_varying_slots: u32,
    pub clip_distance: ClipDistanceLowering,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            disable_varying_packing: false,
            lower_packed_varyings: true,
            lower_varying_structs: true,
            unmatched_inputs: UnmatchedInputPolicy::Strict,
            generic_varying_base: 32,
            max_varying_slots: 32,
            clip_distance: ClipDistanceLowering::Native,
        }
    }
}

/// Transform feedback buffer layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BufferMode {
    /// All captures go to one buffer, or several split by `NextBuffer`
    #[default]
    Interleaved,
    /// Each capture goes to its own buffer
    Separate,
}

/// Limits and capabilities for transform feedback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformFeedbackOptions {
    pub buffer_mode: BufferMode,
    /// Accept `NextBuffer` and `SkipComponents{1..4}`
    pub buffer_controls: bool,
    pub max_buffers: u32,
    pub max_outputs_per_buffer: u32,
    pub max_separate_components: u32,
    pub max_interleaved_components: u32,
}

impl Default for TransformFeedbackOptions {
    fn default() -> Self {
        Self {
            buffer_mode: BufferMode::Interleaved,
            buffer_controls: true,
            max_buffers: 4,
            max_outputs_per_buffer: 64,
            max_separate_components: 4,
            max_interleaved_components: 64,
        }
    }
}
