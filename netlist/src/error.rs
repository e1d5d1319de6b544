//! The closed error taxonomy for design construction and elaboration.
//!
//! Every variant of [`ElabError`] is a design-author mistake: the design as
//! described cannot be elaborated. Bugs in the elaboration machinery itself
//! are asserted unconditionally instead, since there is no sensible recovery
//! from them.

use std::fmt::Display;

/// A structural or typing error detected while building or elaborating a
/// design. Entities are named by their fully qualified hierarchical path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElabError {
    /// A port, wire, or instance was declared with a reserved identifier of
    /// one of the supported textual targets.
    ReservedName { name: String },
    /// Two explicitly chosen names collide within one scope.
    NameCollision { scope: String, name: String },
    /// A port was declared after the instance's interface was frozen.
    PortAfterFreeze { instance: String, name: String },
    /// A binding was attempted from the wrong side of a module boundary.
    BindDirection { junction: String, reason: &'static str },
    /// A junction that already has a source was bound again.
    MultipleDrivers { junction: String },
    /// A wire has sinks but was never given a source.
    WireWithoutSource { wire: String },
    /// Fixed-point type propagation stalled; the named inputs could not be
    /// concretely typed.
    UnresolvedTypes { inputs: Vec<String>, total: usize },
    /// An output is driven, but both it and its source remain untyped.
    UntypedDrivenOutput { output: String },
    /// An auto-discoverable input found no identically named junction in the
    /// instantiating scope and is not optional.
    UnboundAutoInput { input: String },
    /// The combinational dependency graph contains a true cycle. The chain
    /// lists the XNet diagnostic names traversed to reach the repeat.
    CombLoop { chain: Vec<String> },
    /// A port failed to join any XNet after elaboration.
    Unassociated { junction: String, cause: &'static str },
    /// No conversion is defined between the bound types.
    NoConversion { sink: String, from: String, to: String },
    /// A value failed validation against its net's type.
    BadValue { ty: String, value: String },
    /// A named port does not exist on the instance.
    NoSuchPort { instance: String, name: String },
}

/// How many offending inputs an unresolved-types report names before
/// eliding the middle.
const UNRESOLVED_SAMPLE: usize = 5;

impl Display for ElabError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ElabError::ReservedName { name } => {
                write!(f, "name {name:?} is a reserved word of a target language")
            }
            ElabError::NameCollision { scope, name } => {
                write!(f, "explicit name {name:?} is used twice within scope {scope}")
            }
            ElabError::PortAfterFreeze { instance, name } => {
                write!(f, "port {name:?} declared on {instance} after its interface was frozen")
            }
            ElabError::BindDirection { junction, reason } => {
                write!(f, "illegal binding of {junction}: {reason}")
            }
            ElabError::MultipleDrivers { junction } => {
                write!(f, "{junction} is bound to more than one source")
            }
            ElabError::WireWithoutSource { wire } => {
                write!(f, "wire {wire} is used without a source")
            }
            ElabError::UnresolvedTypes { inputs, total } => {
                write!(f, "type inference stalled; {total} input(s) remain untyped: ")?;
                if inputs.len() <= UNRESOLVED_SAMPLE {
                    write!(f, "{}", inputs.join(", "))
                } else {
                    let head = &inputs[..UNRESOLVED_SAMPLE - 2];
                    let tail = &inputs[inputs.len() - 2..];
                    write!(f, "{}, ... {}", head.join(", "), tail.join(", "))
                }
            }
            ElabError::UntypedDrivenOutput { output } => {
                write!(f, "output {output} is driven but its type cannot be inferred")
            }
            ElabError::UnboundAutoInput { input } => {
                write!(f, "input {input} is unbound and no identically named junction exists in the instantiating scope")
            }
            ElabError::CombLoop { chain } => {
                write!(f, "combinational loop through: {}", chain.join(" -> "))
            }
            ElabError::Unassociated { junction, cause } => {
                write!(f, "{junction} is not part of any net: {cause}")
            }
            ElabError::NoConversion { sink, from, to } => {
                write!(f, "no conversion from {from} to {to} binding {sink}")
            }
            ElabError::BadValue { ty, value } => {
                write!(f, "value {value} is not valid for type {ty}")
            }
            ElabError::NoSuchPort { instance, name } => {
                write!(f, "{instance} has no port named {name:?}")
            }
        }
    }
}

impl std::error::Error for ElabError {}

#[cfg(test)]
mod test {
    use super::ElabError;

    #[test]
    fn test_unresolved_sample_is_bounded() {
        let inputs: Vec<String> = (0..12).map(|index| format!("top.u{index}.d")).collect();
        let err = ElabError::UnresolvedTypes { total: inputs.len(), inputs };
        let text = err.to_string();
        assert!(text.contains("12 input(s)"));
        assert!(text.contains("top.u0.d"));
        assert!(text.contains("..."));
        assert!(text.contains("top.u11.d"));
        assert!(!text.contains("top.u5.d"));
    }
}
