//! Concrete signal types.
//!
//! The frontend type surface is deliberately closed: every type the core can
//! see is one of the [`Ty`] variants, and supplies the full contract the
//! elaborator and simulator need — bit width, a reset value, composite
//! decomposition, value normalization, waveform formatting, and semantic
//! change detection.

use std::fmt::Display;

use crate::{Const, ElabError};

/// A concrete signal type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Ty {
    /// A plain bit vector of known width.
    Bits { width: usize },
    /// An enumeration encoded in `width` bits; variant `i` is encoded as the
    /// unsigned value `i`.
    Enum { name: String, width: usize, variants: Vec<String> },
    /// A record of named member types.
    Struct { fields: Vec<(String, Ty)> },
}

impl Ty {
    pub fn bits(width: usize) -> Ty {
        Ty::Bits { width }
    }

    pub fn bit() -> Ty {
        Ty::Bits { width: 1 }
    }

    /// Total bit width; for a struct, the sum of its member widths.
    pub fn width(&self) -> usize {
        match self {
            Ty::Bits { width } => *width,
            Ty::Enum { width, .. } => *width,
            Ty::Struct { fields } => fields.iter().map(|(_, ty)| ty.width()).sum(),
        }
    }

    /// The default/reset value of this type.
    pub fn default_value(&self) -> Const {
        Const::zero(self.width())
    }

    /// Named member decomposition; empty for non-composite types.
    pub fn members(&self) -> &[(String, Ty)] {
        match self {
            Ty::Struct { fields } => fields,
            _ => &[],
        }
    }

    pub fn is_composite(&self) -> bool {
        !self.members().is_empty()
    }

    /// Validates an arbitrary value against this type, returning the internal
    /// representation used on nets of this type.
    pub fn normalize(&self, value: Const) -> Result<Const, ElabError> {
        if value.len() != self.width() {
            return Err(ElabError::BadValue { ty: self.to_string(), value: value.to_string() });
        }
        if let Ty::Enum { variants, .. } = self {
            if let Some(index) = value.as_u64() {
                if index as usize >= variants.len() {
                    return Err(ElabError::BadValue { ty: self.to_string(), value: value.to_string() });
                }
            }
        }
        Ok(value)
    }

    /// Semantic change detection. Two values of the same type compare trit
    /// by trit; representations play no role.
    pub fn is_different(&self, old: &Const, new: &Const) -> bool {
        old != new
    }

    /// Renders a value of this type for a waveform trace.
    pub fn wave_format(&self, value: &Const) -> String {
        match self {
            Ty::Enum { variants, .. } => match value.as_u64() {
                Some(index) if (index as usize) < variants.len() => variants[index as usize].clone(),
                _ => value.to_string(),
            },
            _ => value.to_string(),
        }
    }
}

impl Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Ty::Bits { width } => write!(f, "bits({width})"),
            Ty::Enum { name, width, .. } => write!(f, "enum {name}({width})"),
            Ty::Struct { fields } => {
                write!(f, "struct {{")?;
                for (index, (name, ty)) in fields.iter().enumerate() {
                    if index != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {ty}")?;
                }
                write!(f, "}}")
            }
        }
    }
}
