//! Variable declarations and their interface qualifiers.

use alloc::string::String;

use crate::types::Type;

/// Storage class of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableMode {
    /// Ordinary global or local
    Auto,
    /// Compiler-generated local
    Temporary,
    Uniform,
    /// Stage input (varying read by this stage)
    ShaderIn,
    /// Stage output (varying written by this stage)
    ShaderOut,
    /// Value supplied by fixed-function hardware (gl_FrontFacing, ...)
    SystemValue,
    FunctionIn,
    FunctionOut,
}

impl VariableMode {
    /// Whether variables of this mode occupy interface locations.
    pub fn is_interface(self) -> bool {
        matches!(
            self,
            VariableMode::ShaderIn | VariableMode::ShaderOut | VariableMode::SystemValue
        )
    }

    /// Keyword used by the text form; `None` for `Auto`.
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            VariableMode::Auto => None,
            VariableMode::Temporary => Some("temporary"),
            VariableMode::Uniform => Some("uniform"),
            VariableMode::ShaderIn => Some("in"),
            VariableMode::ShaderOut => Some("out"),
            VariableMode::SystemValue => Some("sysval"),
            VariableMode::FunctionIn => Some("param"),
            VariableMode::FunctionOut => Some("param_out"),
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "temporary" => VariableMode::Temporary,
            "uniform" => VariableMode::Uniform,
            "in" => VariableMode::ShaderIn,
            "out" => VariableMode::ShaderOut,
            "sysval" => VariableMode::SystemValue,
            "param" => VariableMode::FunctionIn,
            "param_out" => VariableMode::FunctionOut,
            _ => return None,
        })
    }
}

/// Interpolation qualifier. The discriminants are the values stored in the
/// fragment program's per-component interpolation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum InterpQualifier {
    #[default]
    None = 0,
    Smooth = 1,
    Flat = 2,
    NoPerspective = 3,
}

impl InterpQualifier {
    pub fn keyword(self) -> Option<&'static str> {
        match self {
            InterpQualifier::None => None,
            InterpQualifier::Smooth => Some("smooth"),
            InterpQualifier::Flat => Some("flat"),
            InterpQualifier::NoPerspective => Some("noperspective"),
        }
    }

    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "smooth" => Some(InterpQualifier::Smooth),
            "flat" => Some(InterpQualifier::Flat),
            "noperspective" => Some(InterpQualifier::NoPerspective),
            _ => None,
        }
    }
}

/// A declared variable.
///
/// The linker only ever changes `location`, `location_frac` and, when it
/// turns an interface variable into an ordinary global, `mode`.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableData {
    pub name: String,
    pub ty: Type,
    pub mode: VariableMode,
    /// Assigned slot, `None` until the linker (or a fixed built-in layout)
    /// places the variable
    pub location: Option<u32>,
    /// First component used within `location` (0-3)
    pub location_frac: u32,
    /// Dual-source blend index, added to `location`
    pub index: u32,
    pub interpolation: InterpQualifier,
    pub centroid: bool,
    pub invariant: bool,
}

impl VariableData {
    pub fn new(name: impl Into<String>, ty: Type, mode: VariableMode) -> Self {
        Self {
            name: name.into(),
            ty,
            mode,
            location: None,
            location_frac: 0,
            index: 0,
            interpolation: InterpQualifier::None,
            centroid: false,
            invariant: false,
        }
    }

    pub fn with_location(mut self, location: u32, location_frac: u32) -> Self {
        self.location = Some(location);
        self.location_frac = location_frac;
        self
    }

    pub fn with_interpolation(mut self, interpolation: InterpQualifier) -> Self {
        self.interpolation = interpolation;
        self
    }

    pub fn with_centroid(mut self, centroid: bool) -> Self {
        self.centroid = centroid;
        self
    }

    /// Fine location: `location * 4 + location_frac`. `None` when unassigned
    /// or not representable.
    pub fn fine_location(&self) -> Option<u32> {
        self.location?
            .checked_mul(4)
            .and_then(|fine| fine.checked_add(self.location_frac))
    }

    /// Whether this is a built-in (`gl_` prefixed) variable.
    pub fn is_builtin(&self) -> bool {
        self.name.starts_with("gl_")
    }

    /// Copy the interpolation-related qualifiers from another variable.
    pub fn copy_qualifiers_from(&mut self, other: &VariableData) {
        self.interpolation = other.interpolation;
        self.centroid = other.centroid;
        self.invariant = other.invariant;
    }
}
