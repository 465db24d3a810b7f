//! Newtype wrappers for string identifiers.
//!
//! All newtypes serialize/deserialize as plain strings.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// Suffix of the first node slot behind a BMC (`x1000c0s0b0n0` -> `x1000c0s0b0`).
const FIRST_NODE_SUFFIX: &str = "n0";

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl PartialEq<str> for $name {
            fn eq(&self, other: &str) -> bool {
                self.0 == other
            }
        }

        impl PartialEq<&str> for $name {
            fn eq(&self, other: &&str) -> bool {
                self.0 == *other
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }
    };
}

string_newtype!(
    /// Hierarchical hardware identifier of a node or its management controller.
    Xname
);

string_newtype!(
    /// Unique identifier assigned to a resource by the API layer.
    NodeUid
);

impl Xname {
    /// Identifier of the BMC that manages this node.
    ///
    /// Only the first node slot (`n0`) is mapped: the suffix is stripped and the
    /// remainder is taken as the BMC identifier. Any other identifier is
    /// returned unchanged, including nodes in other slots.
    pub fn bmc(&self) -> Xname {
        match self.0.strip_suffix(FIRST_NODE_SUFFIX) {
            Some(parent) if !parent.is_empty() => Xname::new(parent),
            _ => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xname_display_and_as_ref() {
        let x = Xname::new("x1000c0s0b0n0");
        assert_eq!(x.to_string(), "x1000c0s0b0n0");
        assert_eq!(AsRef::<str>::as_ref(&x), "x1000c0s0b0n0");
    }

    #[test]
    fn xname_serializes_as_plain_string() {
        let x = Xname::new("x3000c0s1b0n0");
        assert_eq!(serde_json::to_string(&x).unwrap(), "\"x3000c0s1b0n0\"");
        let back: Xname = serde_json::from_str("\"x3000c0s1b0n0\"").unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn first_node_maps_to_bmc() {
        assert_eq!(Xname::new("x1000c0s0b0n0").bmc(), "x1000c0s0b0");
    }

    #[test]
    fn other_node_slots_are_not_generalized() {
        assert_eq!(Xname::new("x1000c0s0b0n1").bmc(), "x1000c0s0b0n1");
        assert_eq!(Xname::new("x1000c0s0b1").bmc(), "x1000c0s0b1");
    }

    #[test]
    fn bare_suffix_is_left_alone() {
        assert_eq!(Xname::new("n0").bmc(), "n0");
    }

    #[test]
    fn uid_from_string() {
        let uid: NodeUid = String::from("nod-0001").into();
        assert_eq!(uid.into_inner(), "nod-0001");
    }
}
