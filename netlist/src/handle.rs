//! Stable integer handles for the arenas owned by a [`Design`].
//!
//! Junctions, instances, XNets and simulation processes are all kept in
//! contiguous arenas and referred to by index. Handles stay valid for the
//! lifetime of the design; entities that become unused are tombstoned in
//! place rather than removed.
//!
//! [`Design`]: crate::Design

macro_rules! def_id {
    ($(#[$attr:meta])* $name:ident, $prefix:literal) => {
        $(#[$attr])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name {
            pub(crate) index: u32,
        }

        impl $name {
            pub fn from_index(index: usize) -> $name {
                assert!(index <= u32::MAX as usize);
                $name { index: index as u32 }
            }

            pub fn index(self) -> usize {
                self.index as usize
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.index)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, concat!($prefix, "{}"), self.index)
            }
        }
    };
}

def_id! {
    /// Identifies a module instance within a design.
    InstanceId, "%i"
}

def_id! {
    /// Identifies a junction (input, output, or wire) within a design.
    JunctionId, "%j"
}

def_id! {
    /// Identifies an XNet, a value-equivalence class of junctions.
    XNetId, "%x"
}

def_id! {
    /// Identifies a reactive process registered with the simulator.
    ProcessId, "%p"
}

#[cfg(test)]
mod test {
    use super::{JunctionId, XNetId};

    #[test]
    fn test_roundtrip() {
        let id = JunctionId::from_index(7);
        assert_eq!(id.index(), 7);
        assert_eq!(format!("{id}"), "%j7");
        assert_eq!(format!("{id:?}"), "JunctionId(7)");
    }

    #[test]
    fn test_ordering() {
        assert!(XNetId::from_index(1) < XNetId::from_index(2));
    }
}
