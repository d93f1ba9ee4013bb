//! Error types for interface linking.

use alloc::string::String;
use core::fmt;

use lpc_glir::ShaderStage;

/// Result type for linking operations.
pub type LinkResult<T> = Result<T, LinkError>;

/// Internal consistency faults.
///
/// These indicate a defect upstream of the linker (a pass ran out of order,
/// or the front end produced IR it should have rejected). They are returned
/// rather than panicking so that a host never crashes on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalFault {
    /// `discard` in a shader that is not a fragment shader
    DiscardOutsideFragment,
    /// A struct-typed varying reached vector packing before struct flattening
    RecordInPackedVarying { name: String },
    /// The shader has no `main` function
    MissingMain,
    /// A varying without a scalar base type reached vector packing
    UnexpectedPackedType { name: String },
    /// A captured output was resolved before it received a location
    UnassignedCapture { name: String },
}

impl fmt::Display for InternalFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InternalFault::DiscardOutsideFragment => {
                write!(f, "discard used outside of a fragment shader")
            }
            InternalFault::RecordInPackedVarying { name } => {
                write!(f, "struct varying `{}' reached vector packing", name)
            }
            InternalFault::MissingMain => write!(f, "shader has no main function"),
            InternalFault::UnexpectedPackedType { name } => {
                write!(f, "unexpected varying type while packing `{}'", name)
            }
            InternalFault::UnassignedCapture { name } => {
                write!(f, "captured varying `{}' has no location", name)
            }
        }
    }
}

/// Error that can occur while linking shader interfaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Capture name is not an identifier with an optional `[n]` subscript
    TfeedbackParse { name: String },
    /// Capture name looks like a reserved token but is not one
    TfeedbackReservedName { name: String },
    TfeedbackDuplicate { name: String },
    TfeedbackUndeclared { name: String },
    /// Subscript applied to a variable that is not an array
    TfeedbackNotArray { name: String, var_name: String },
    TfeedbackIndexOutOfRange {
        name: String,
        index: u32,
        size: u32,
    },
    TfeedbackTooManyComponents {
        name: String,
        components: u32,
        max: u32,
    },
    TfeedbackTooManyOutputs { buffer: u32, max: u32 },
    TfeedbackTooManyBuffers { buffers: u32, max: u32 },
    TfeedbackTooManyInterleavedComponents { buffer: u32, max: u32 },
    TypeMismatch {
        producer: ShaderStage,
        consumer: ShaderStage,
        name: String,
        producer_type: String,
        consumer_type: String,
    },
    ArraySizeMismatch {
        producer: ShaderStage,
        consumer: ShaderStage,
        name: String,
        producer_size: u32,
        consumer_size: u32,
    },
    QualifierMismatch {
        producer: ShaderStage,
        consumer: ShaderStage,
        name: String,
        qualifier: &'static str,
        producer_value: String,
        consumer_value: String,
    },
    /// Consumer input read by code but never written by the producer
    UnmatchedInput {
        producer: Option<ShaderStage>,
        consumer: ShaderStage,
        name: String,
    },
    TooManyVaryings { slots: u32, max: u32 },
    Internal(InternalFault),
}

impl LinkError {
    /// Whether this error is an internal consistency fault rather than a
    /// problem with the linked program.
    pub fn is_internal(&self) -> bool {
        matches!(self, LinkError::Internal(_))
    }
}

impl From<InternalFault> for LinkError {
    fn from(fault: InternalFault) -> Self {
        LinkError::Internal(fault)
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkError::TfeedbackParse { name } => {
                write!(f, "Transform feedback varying `{}' is malformed", name)
            }
            LinkError::TfeedbackReservedName { name } => write!(
                f,
                "Transform feedback varying `{}' uses a reserved name",
                name
            ),
            LinkError::TfeedbackDuplicate { name } => write!(
                f,
                "Transform feedback varying {} specified more than once",
                name
            ),
            LinkError::TfeedbackUndeclared { name } => {
                write!(f, "Transform feedback varying {} undeclared", name)
            }
            LinkError::TfeedbackNotArray { name, var_name } => write!(
                f,
                "Transform feedback varying {} requested, but {} is not an array",
                name, var_name
            ),
            LinkError::TfeedbackIndexOutOfRange { name, index, size } => write!(
                f,
                "Transform feedback varying {} has index {}, but the array size is {}",
                name, index, size
            ),
            LinkError::TfeedbackTooManyComponents {
                name,
                components,
                max,
            } => write!(
                f,
                "Transform feedback varying {} has {} components, exceeding MAX_TRANSFORM_FEEDBACK_SEPARATE_COMPONENTS ({})",
                name, components, max
            ),
            LinkError::TfeedbackTooManyOutputs { buffer, max } => write!(
                f,
                "Transform feedback buffer {} needs more than {} outputs",
                buffer, max
            ),
            LinkError::TfeedbackTooManyBuffers { buffers, max } => write!(
                f,
                "Transform feedback uses {} buffers, but at most {} are supported",
                buffers, max
            ),
            LinkError::TfeedbackTooManyInterleavedComponents { buffer, max } => write!(
                f,
                "The MAX_TRANSFORM_FEEDBACK_INTERLEAVED_COMPONENTS limit ({}) has been exceeded in buffer {}",
                max, buffer
            ),
            LinkError::TypeMismatch {
                producer,
                consumer,
                name,
                producer_type,
                consumer_type,
            } => write!(
                f,
                "{} shader output `{}' declared as type `{}', but {} shader input declared as type `{}'",
                producer, name, producer_type, consumer, consumer_type
            ),
            LinkError::ArraySizeMismatch {
                producer,
                consumer,
                name,
                producer_size,
                consumer_size,
            } => write!(
                f,
                "{} shader output `{}' declared with array size {}, but {} shader input declared with array size {}",
                producer, name, producer_size, consumer, consumer_size
            ),
            LinkError::QualifierMismatch {
                producer,
                consumer,
                name,
                qualifier,
                producer_value,
                consumer_value,
            } => write!(
                f,
                "{} shader output `{}' {} {} qualifier, but {} shader input {} {} qualifier",
                producer, name, producer_value, qualifier, consumer, consumer_value, qualifier
            ),
            LinkError::UnmatchedInput {
                producer: Some(producer),
                consumer,
                name,
            } => write!(
                f,
                "{} shader varying {} not written by {} shader",
                consumer, name, producer
            ),
            LinkError::UnmatchedInput {
                producer: None,
                consumer,
                name,
            } => write!(
                f,
                "{} shader varying {} not written by any previous stage",
                consumer, name
            ),
            LinkError::TooManyVaryings { slots, max } => write!(
                f,
                "Too many varyings: {} slots used, but only {} are available",
                slots, max
            ),
            LinkError::Internal(fault) => write!(f, "Internal linker fault: {}", fault),
        }
    }
}

impl core::error::Error for LinkError {}

/// Accumulated link log.
///
/// Each entry is one line prefixed with `error: ` or `warning: `.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoLog {
    text: String,
    errors: usize,
    warnings: usize,
}

impl InfoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error(&mut self, error: &LinkError) {
        self.push("error", format_args!("{}", error));
        self.errors += 1;
    }

    pub fn warning(&mut self, message: fmt::Arguments<'_>) {
        self.push("warning", message);
        self.warnings += 1;
    }

    fn push(&mut self, prefix: &str, message: fmt::Arguments<'_>) {
        use core::fmt::Write;
        // Writing into a String cannot fail.
        let _ = writeln!(self.text, "{}: {}", prefix, message);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }
}

impl fmt::Display for InfoLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use alloc::{format, string::ToString};

    use super::*;

    #[test]
    fn test_info_log_lines() {
        let mut log = InfoLog::new();
        log.error(&LinkError::TfeedbackUndeclared {
            name: "foo".to_string(),
        });
        log.warning(format_args!("input {} defaults to zero", "bar"));
        assert_eq!(
            log.as_str(),
            "error: Transform feedback varying foo undeclared\n\
             warning: input bar defaults to zero\n"
        );
        assert_eq!(log.error_count(), 1);
        assert_eq!(log.warning_count(), 1);
        assert!(log.has_errors());
    }

    #[test]
    fn test_qualifier_message_names_both_stages() {
        let err = LinkError::QualifierMismatch {
            producer: ShaderStage::Vertex,
            consumer: ShaderStage::Fragment,
            name: "uv".to_string(),
            qualifier: "centroid",
            producer_value: "has".to_string(),
            consumer_value: "lacks".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "vertex shader output `uv' has centroid qualifier, but fragment shader input lacks centroid qualifier"
        );
    }

    #[test]
    fn test_internal_fault_conversion() {
        let err: LinkError = InternalFault::MissingMain.into();
        assert!(err.is_internal());
        assert!(!LinkError::TooManyVaryings { slots: 40, max: 32 }.is_internal());
    }
}
