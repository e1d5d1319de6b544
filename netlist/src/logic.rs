//! Signal values: single trits and constant bit vectors.

use std::fmt::{Debug, Display};

/// The state of a single signal: `0`, `1`, or undefined (`x`).
///
/// Undefined values appear on nets that have not yet been driven, and
/// propagate through combinational operations.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Trit {
    Undef,
    Zero,
    One,
}

impl Trit {
    pub fn from_char(ch: char) -> Option<Trit> {
        match ch {
            'x' | 'X' => Some(Trit::Undef),
            '0' => Some(Trit::Zero),
            '1' => Some(Trit::One),
            _ => None,
        }
    }

    pub fn to_char(self) -> char {
        match self {
            Trit::Undef => 'x',
            Trit::Zero => '0',
            Trit::One => '1',
        }
    }

    pub fn is_undef(self) -> bool {
        self == Trit::Undef
    }

    pub fn and(self, other: Trit) -> Trit {
        match (self, other) {
            (Trit::Zero, _) | (_, Trit::Zero) => Trit::Zero,
            (Trit::One, Trit::One) => Trit::One,
            _ => Trit::Undef,
        }
    }

    pub fn or(self, other: Trit) -> Trit {
        match (self, other) {
            (Trit::One, _) | (_, Trit::One) => Trit::One,
            (Trit::Zero, Trit::Zero) => Trit::Zero,
            _ => Trit::Undef,
        }
    }

    pub fn xor(self, other: Trit) -> Trit {
        match (self, other) {
            (Trit::Undef, _) | (_, Trit::Undef) => Trit::Undef,
            (lft, rgt) if lft == rgt => Trit::Zero,
            _ => Trit::One,
        }
    }
}

impl From<bool> for Trit {
    fn from(value: bool) -> Self {
        match value {
            false => Trit::Zero,
            true => Trit::One,
        }
    }
}

impl std::ops::Not for Trit {
    type Output = Trit;

    fn not(self) -> Self::Output {
        match self {
            Trit::Undef => Trit::Undef,
            Trit::Zero => Trit::One,
            Trit::One => Trit::Zero,
        }
    }
}

impl Debug for Trit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Trit::Undef => write!(f, "Trit::Undef"),
            Trit::Zero => write!(f, "Trit::Zero"),
            Trit::One => write!(f, "Trit::One"),
        }
    }
}

impl Display for Trit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_char())
    }
}

/// A constant is a (possibly empty) sequence of [`Trit`]s, least significant
/// first.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Const {
    trits: Vec<Trit>,
}

impl Const {
    /// Creates an empty constant.
    pub fn new() -> Self {
        Const { trits: Vec::new() }
    }

    /// Creates an all-`x` constant of given width.
    pub fn undef(width: usize) -> Self {
        Const { trits: vec![Trit::Undef; width] }
    }

    /// Creates an all-`0` constant of given width.
    pub fn zero(width: usize) -> Self {
        Const { trits: vec![Trit::Zero; width] }
    }

    /// Creates an all-`1` constant of given width.
    pub fn ones(width: usize) -> Self {
        Const { trits: vec![Trit::One; width] }
    }

    /// Creates a constant of given width from the low bits of `value`.
    pub fn from_u64(value: u64, width: usize) -> Self {
        Const::from_iter((0..width).map(|bit| {
            if bit < u64::BITS as usize {
                Trit::from(value >> bit & 1 != 0)
            } else {
                Trit::Zero
            }
        }))
    }

    /// Interprets the constant as an unsigned integer; [`None`] if any trit
    /// is undefined or the width exceeds 64 bits.
    pub fn as_u64(&self) -> Option<u64> {
        if self.len() > u64::BITS as usize {
            return None;
        }
        let mut result = 0u64;
        for (bit, trit) in self.iter().enumerate() {
            match trit {
                Trit::Undef => return None,
                Trit::Zero => (),
                Trit::One => result |= 1 << bit,
            }
        }
        Some(result)
    }

    pub fn len(&self) -> usize {
        self.trits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trits.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = Trit> + ExactSizeIterator + '_ {
        self.trits.iter().copied()
    }

    pub fn push(&mut self, trit: Trit) {
        self.trits.push(trit);
    }

    pub fn lsb(&self) -> Trit {
        self[0]
    }

    pub fn msb(&self) -> Trit {
        self[self.len() - 1]
    }

    pub fn has_undef(&self) -> bool {
        self.iter().any(|trit| trit == Trit::Undef)
    }

    pub fn is_zero(&self) -> bool {
        self.iter().all(|trit| trit == Trit::Zero)
    }

    pub fn concat(&self, other: &Const) -> Const {
        Const::from_iter(self.iter().chain(other.iter()))
    }

    pub fn slice(&self, range: std::ops::Range<usize>) -> Const {
        Const::from_iter(self.trits[range].iter().copied())
    }

    pub fn not(&self) -> Const {
        Const::from_iter(self.iter().map(|trit| !trit))
    }

    pub fn and(&self, other: &Const) -> Const {
        assert_eq!(self.len(), other.len());
        Const::from_iter(self.iter().zip(other.iter()).map(|(lft, rgt)| lft.and(rgt)))
    }

    pub fn or(&self, other: &Const) -> Const {
        assert_eq!(self.len(), other.len());
        Const::from_iter(self.iter().zip(other.iter()).map(|(lft, rgt)| lft.or(rgt)))
    }

    pub fn xor(&self, other: &Const) -> Const {
        assert_eq!(self.len(), other.len());
        Const::from_iter(self.iter().zip(other.iter()).map(|(lft, rgt)| lft.xor(rgt)))
    }

    /// Adds `addend`, wrapping at the constant's width. An undefined input
    /// yields an all-`x` result.
    pub fn add_u64(&self, addend: u64) -> Const {
        match self.as_u64() {
            Some(value) => Const::from_u64(value.wrapping_add(addend), self.len()),
            None => Const::undef(self.len()),
        }
    }
}

impl Default for Const {
    fn default() -> Self {
        Const::new()
    }
}

impl From<Trit> for Const {
    fn from(trit: Trit) -> Self {
        Const { trits: vec![trit] }
    }
}

impl From<bool> for Const {
    fn from(value: bool) -> Self {
        Const::from(Trit::from(value))
    }
}

impl FromIterator<Trit> for Const {
    fn from_iter<T: IntoIterator<Item = Trit>>(iter: T) -> Self {
        Const { trits: iter.into_iter().collect() }
    }
}

impl std::ops::Index<usize> for Const {
    type Output = Trit;

    fn index(&self, index: usize) -> &Self::Output {
        &self.trits[index]
    }
}

impl Debug for Const {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Const::from_iter([")?;
        for (index, trit) in self.iter().enumerate() {
            if index != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{trit:?}")?;
        }
        write!(f, "])")
    }
}

impl Display for Const {
    /// Most significant trit first, as in a Verilog literal body.
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "()");
        }
        for trit in self.iter().rev() {
            write!(f, "{trit}")?;
        }
        Ok(())
    }
}
