//! Transform feedback capture declarations.
//!
//! A capture list names producer outputs (`foo`, `foo[2]`) and, with buffer
//! controls enabled, the pseudo-declarations `NextBuffer` and
//! `SkipComponents1`..`SkipComponents4` (with or without a `gl_` prefix).
//! Declarations are parsed up front, resolved against the producer once its
//! outputs have locations, and finally stored as per-buffer output tables.

use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use log::debug;
use lpc_glir::{Shader, Type, Var, VariableMode};

use crate::{
    error::{InternalFault, LinkError, LinkResult},
    options::{BufferMode, ClipDistanceLowering, TransformFeedbackOptions},
};

/// One entry of a transform feedback capture list.
#[derive(Debug, Clone, PartialEq)]
pub struct TfeedbackDecl {
    orig_name: String,
    var_name: String,
    array_subscript: Option<u32>,
    /// Declared `gl_ClipDistance` size when the producer packs clip
    /// distances into vec4s; the capture size is then taken verbatim
    clip_distance_size: Option<u32>,
    /// Every column or array element sits at the start of its own slot, as
    /// the assigner lays varyings out with packing disabled
    slot_per_column: bool,
    location: Option<u32>,
    location_frac: u32,
    vector_elements: u32,
    matrix_columns: u32,
    ty: Type,
    size: u32,
    skip_components: u32,
    next_buffer_separator: bool,
}

/// One captured slot range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TfeedbackOutput {
    /// First component within `output_register`
    pub component_offset: u32,
    pub output_register: u32,
    pub num_components: u32,
    pub output_buffer: u32,
    /// Offset in components from the start of a buffer record
    pub dst_offset: u32,
}

/// A captured variable as reported back to the application.
#[derive(Debug, Clone, PartialEq)]
pub struct TfeedbackVarying {
    pub name: String,
    pub ty: Type,
    pub size: u32,
}

/// Final transform feedback layout of a program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformFeedbackInfo {
    pub outputs: Vec<TfeedbackOutput>,
    pub varyings: Vec<TfeedbackVarying>,
    /// Components per record, per buffer
    pub buffer_strides: Vec<u32>,
    pub num_buffers: u32,
}

impl TransformFeedbackInfo {
    pub fn buffer_stride(&self, buffer: u32) -> u32 {
        self.buffer_strides
            .get(buffer as usize)
            .copied()
            .unwrap_or(0)
    }

    fn stride_mut(&mut self, buffer: u32) -> &mut u32 {
        let index = buffer as usize;
        if index >= self.buffer_strides.len() {
            self.buffer_strides.resize(index + 1, 0);
        }
        &mut self.buffer_strides[index]
    }

    fn outputs_in_buffer(&self, buffer: u32) -> u32 {
        self.outputs
            .iter()
            .filter(|o| o.output_buffer == buffer)
            .count() as u32
    }
}

/// Split `name[123]` into its base name and subscript.
fn parse_subscript(name: &str) -> Option<(&str, Option<u32>)> {
    let Some(open) = name.rfind('[') else {
        return (!name.contains(']')).then_some((name, None));
    };
    let digits = name[open + 1..].strip_suffix(']')?;
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || (digits.len() > 1 && digits.starts_with('0'))
    {
        return None;
    }
    Some((&name[..open], Some(digits.parse().ok()?)))
}

/// Identifiers may contain `.` so that flattened struct members can be
/// captured.
fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

impl TfeedbackDecl {
    fn empty(name: &str) -> Self {
        Self {
            orig_name: name.to_string(),
            var_name: String::new(),
            array_subscript: None,
            clip_distance_size: None,
            slot_per_column: false,
            location: None,
            location_frac: 0,
            vector_elements: 0,
            matrix_columns: 0,
            ty: Type::Void,
            size: 0,
            skip_components: 0,
            next_buffer_separator: false,
        }
    }

    /// Parse one capture name.
    pub fn parse(
        name: &str,
        options: &TransformFeedbackOptions,
        clip_distance: ClipDistanceLowering,
    ) -> LinkResult<Self> {
        let mut decl = Self::empty(name);

        if options.buffer_controls {
            let token = name.strip_prefix("gl_").unwrap_or(name);
            let reserved = || LinkError::TfeedbackReservedName {
                name: name.to_string(),
            };
            if token == "NextBuffer" {
                if options.buffer_mode == BufferMode::Separate {
                    return Err(reserved());
                }
                decl.next_buffer_separator = true;
                return Ok(decl);
            }
            if let Some(count) = token.strip_prefix("SkipComponents") {
                decl.skip_components = match count {
                    "1" => 1,
                    "2" => 2,
                    "3" => 3,
                    "4" => 4,
                    _ => return Err(reserved()),
                };
                if options.buffer_mode == BufferMode::Separate {
                    return Err(reserved());
                }
                return Ok(decl);
            }
        }

        let malformed = || LinkError::TfeedbackParse {
            name: name.to_string(),
        };
        let (var_name, subscript) = parse_subscript(name).ok_or_else(malformed)?;
        if !is_identifier(var_name) {
            return Err(malformed());
        }
        decl.var_name = var_name.to_string();
        decl.array_subscript = subscript;
        if let ClipDistanceLowering::Lower { array_size } = clip_distance {
            if var_name == "gl_ClipDistance" {
                decl.clip_distance_size = Some(array_size);
            }
        }
        Ok(decl)
    }

    /// Whether two declarations capture the same thing.
    pub fn is_same(&self, other: &TfeedbackDecl) -> bool {
        self.var_name == other.var_name && self.array_subscript == other.array_subscript
    }

    /// Whether this declaration names a variable (rather than a separator
    /// or a skip).
    pub fn is_varying(&self) -> bool {
        !self.next_buffer_separator && self.skip_components == 0
    }

    pub fn is_next_buffer_separator(&self) -> bool {
        self.next_buffer_separator
    }

    pub fn skip_components(&self) -> u32 {
        self.skip_components
    }

    /// The name as given by the application.
    pub fn name(&self) -> &str {
        &self.orig_name
    }

    /// Variable part of the name, empty for separators and skips.
    pub fn var_name(&self) -> &str {
        &self.var_name
    }

    pub fn array_subscript(&self) -> Option<u32> {
        self.array_subscript
    }

    pub fn location(&self) -> Option<u32> {
        self.location
    }

    pub fn location_frac(&self) -> u32 {
        self.location_frac
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Reported type: the captured variable, or its array element.
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Name of the producer output backing this declaration.
    fn output_name(&self) -> &str {
        if self.clip_distance_size.is_some() {
            "gl_ClipDistanceMESA"
        } else {
            &self.var_name
        }
    }

    /// Look up the producer output this declaration captures.
    pub fn find_output_var(&self, producer: &Shader) -> LinkResult<Var> {
        producer
            .find_var(self.output_name(), VariableMode::ShaderOut)
            .ok_or_else(|| LinkError::TfeedbackUndeclared {
                name: self.orig_name.clone(),
            })
    }

    /// Resolve location, shape and size from the output variable, which
    /// must already have a location. `disable_varying_packing` must match
    /// the setting the locations were assigned with.
    pub fn assign_location(
        &mut self,
        producer: &Shader,
        var: Var,
        options: &TransformFeedbackOptions,
        disable_varying_packing: bool,
    ) -> LinkResult<()> {
        debug_assert!(self.is_varying());
        let data = &producer.vars[var];
        self.slot_per_column =
            disable_varying_packing && self.clip_distance_size.is_none() && !data.is_builtin();
        let Some(fine_location) = data.fine_location() else {
            return Err(InternalFault::UnassignedCapture {
                name: self.orig_name.clone(),
            }
            .into());
        };
        let mut fine_location = fine_location;

        match &data.ty {
            Type::Array(element, length) => {
                let matrix_columns = element.matrix_columns();
                let vector_elements = element.vector_elements();
                let actual_size = self.clip_distance_size.unwrap_or(*length);
                match self.array_subscript {
                    Some(index) => {
                        if index >= actual_size {
                            return Err(LinkError::TfeedbackIndexOutOfRange {
                                name: self.orig_name.clone(),
                                index,
                                size: actual_size,
                            });
                        }
                        let element_size = if self.clip_distance_size.is_some() {
                            1
                        } else if self.slot_per_column {
                            4 * matrix_columns
                        } else {
                            vector_elements * matrix_columns
                        };
                        fine_location += element_size * index;
                        self.size = 1;
                    }
                    None => self.size = actual_size,
                }
                self.vector_elements = vector_elements;
                self.matrix_columns = matrix_columns;
                self.ty = if self.clip_distance_size.is_some() {
                    Type::FLOAT
                } else {
                    (**element).clone()
                };
            }
            ty => {
                if self.array_subscript.is_some() {
                    return Err(LinkError::TfeedbackNotArray {
                        name: self.orig_name.clone(),
                        var_name: self.var_name.clone(),
                    });
                }
                self.size = 1;
                self.vector_elements = ty.vector_elements();
                self.matrix_columns = ty.matrix_columns();
                self.ty = ty.clone();
            }
        }

        self.location = Some(fine_location / 4);
        self.location_frac = fine_location % 4;

        if options.buffer_mode == BufferMode::Separate
            && self.num_components() > options.max_separate_components
        {
            return Err(LinkError::TfeedbackTooManyComponents {
                name: self.orig_name.clone(),
                components: self.num_components(),
                max: options.max_separate_components,
            });
        }
        debug!(
            "capture {} at {}.{} ({} components)",
            self.orig_name,
            fine_location / 4,
            fine_location % 4,
            self.num_components()
        );
        Ok(())
    }

    /// Total number of captured components. Only valid after
    /// [`assign_location`](Self::assign_location).
    pub fn num_components(&self) -> u32 {
        match self.clip_distance_size {
            Some(_) => self.size,
            None => self.vector_elements * self.matrix_columns * self.size,
        }
    }

    /// Number of slots touched by the capture.
    pub fn num_outputs(&self) -> u32 {
        if !self.is_varying() {
            0
        } else if self.slot_per_column {
            self.matrix_columns * self.size
        } else {
            (self.num_components() + self.location_frac + 3) / 4
        }
    }

    /// `(register, first component, components)` of each captured range,
    /// starting at slot `location`.
    fn ranges(&self, location: u32) -> Vec<(u32, u32, u32)> {
        if self.slot_per_column {
            return (0..self.matrix_columns * self.size)
                .map(|column| (location + column, self.location_frac, self.vector_elements))
                .collect();
        }
        let mut ranges = Vec::new();
        let (mut location, mut location_frac) = (location, self.location_frac);
        let mut remaining = self.num_components();
        while remaining > 0 {
            let size = remaining.min(4 - location_frac);
            ranges.push((location, location_frac, size));
            remaining -= size;
            location += 1;
            location_frac = 0;
        }
        ranges
    }

    /// Append this declaration's outputs for `buffer` to `info`.
    pub fn store(
        &self,
        info: &mut TransformFeedbackInfo,
        buffer: u32,
        options: &TransformFeedbackOptions,
    ) -> LinkResult<()> {
        debug_assert!(!self.next_buffer_separator);
        if self.skip_components > 0 {
            *info.stride_mut(buffer) += self.skip_components;
            return Ok(());
        }

        let Some(location) = self.location else {
            return Err(InternalFault::UnassignedCapture {
                name: self.orig_name.clone(),
            }
            .into());
        };
        if options.buffer_mode == BufferMode::Interleaved
            && info.buffer_stride(buffer) + self.num_components() > options.max_interleaved_components
        {
            return Err(LinkError::TfeedbackTooManyInterleavedComponents {
                buffer,
                max: options.max_interleaved_components,
            });
        }

        for (register, component_offset, num_components) in self.ranges(location) {
            if info.outputs_in_buffer(buffer) >= options.max_outputs_per_buffer {
                return Err(LinkError::TfeedbackTooManyOutputs {
                    buffer,
                    max: options.max_outputs_per_buffer,
                });
            }
            let dst_offset = info.buffer_stride(buffer);
            info.outputs.push(TfeedbackOutput {
                component_offset,
                output_register: register,
                num_components,
                output_buffer: buffer,
                dst_offset,
            });
            *info.stride_mut(buffer) += num_components;
        }

        info.varyings.push(TfeedbackVarying {
            name: self.orig_name.clone(),
            ty: self.ty.clone(),
            size: self.size,
        });
        Ok(())
    }
}

/// Parse a capture list, rejecting duplicate captures.
pub fn parse_tfeedback_decls<S: AsRef<str>>(
    names: &[S],
    options: &TransformFeedbackOptions,
    clip_distance: ClipDistanceLowering,
) -> LinkResult<Vec<TfeedbackDecl>> {
    let mut decls: Vec<TfeedbackDecl> = Vec::with_capacity(names.len());
    for name in names {
        let decl = TfeedbackDecl::parse(name.as_ref(), options, clip_distance)?;
        if decl.is_varying()
            && decls
                .iter()
                .any(|prev| prev.is_varying() && prev.is_same(&decl))
        {
            return Err(LinkError::TfeedbackDuplicate {
                name: decl.orig_name,
            });
        }
        decls.push(decl);
    }
    Ok(decls)
}

/// Lay resolved declarations out into buffers.
///
/// In interleaved mode every declaration goes into the current buffer and
/// `NextBuffer` moves on to the next one; in separate mode each declaration
/// gets a buffer of its own.
pub fn store_tfeedback_info(
    decls: &[TfeedbackDecl],
    options: &TransformFeedbackOptions,
) -> LinkResult<TransformFeedbackInfo> {
    let mut info = TransformFeedbackInfo::default();
    if decls.is_empty() {
        return Ok(info);
    }

    let mut num_buffers = 0;
    match options.buffer_mode {
        BufferMode::Separate => {
            for decl in decls {
                decl.store(&mut info, num_buffers, options)?;
                num_buffers += 1;
            }
        }
        BufferMode::Interleaved => {
            for decl in decls {
                if decl.is_next_buffer_separator() {
                    num_buffers += 1;
                    continue;
                }
                decl.store(&mut info, num_buffers, options)?;
            }
            num_buffers += 1;
        }
    }

    if num_buffers > options.max_buffers {
        return Err(LinkError::TfeedbackTooManyBuffers {
            buffers: num_buffers,
            max: options.max_buffers,
        });
    }
    info.num_buffers = num_buffers;
    Ok(info)
}
