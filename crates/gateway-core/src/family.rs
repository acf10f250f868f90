//! The array-family tag and its plugin-id alias table.
//!
//! New families are added by extending this enum and [`ArrayFamily::from_alias`];
//! the gateway never reaches for open polymorphism here (see `spec.md` §9,
//! "Dynamic dispatch").

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the three storage-array families the gateway fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrayFamily {
    /// Scale-out block array with session-token auth ("powerflex").
    PowerFlex,
    /// Mainframe-style block array ("powermax").
    PowerMax,
    /// Scale-out NAS ("powerscale").
    PowerScale,
}

impl ArrayFamily {
    /// Canonical lowercase name, as used in policy paths and config keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArrayFamily::PowerFlex => "powerflex",
            ArrayFamily::PowerMax => "powermax",
            ArrayFamily::PowerScale => "powerscale",
        }
    }

    /// Resolve a CSI plugin id (or an already-canonical family name) to a family.
    ///
    /// Returns `None` for anything not in the alias table; callers surface
    /// that as a 502 per `spec.md` §4.2 step 1.
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias {
            "powerflex" | "csi-vxflexos" | "vxflexos" => Some(ArrayFamily::PowerFlex),
            "powermax" | "csi-powermax" => Some(ArrayFamily::PowerMax),
            "powerscale" | "csi-powerscale" | "isilon" => Some(ArrayFamily::PowerScale),
            _ => None,
        }
    }
}

impl fmt::Display for ArrayFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_map_to_exactly_one_family() {
        for alias in ["powerflex", "csi-vxflexos", "vxflexos"] {
            assert_eq!(ArrayFamily::from_alias(alias), Some(ArrayFamily::PowerFlex));
        }
        for alias in ["powermax", "csi-powermax"] {
            assert_eq!(ArrayFamily::from_alias(alias), Some(ArrayFamily::PowerMax));
        }
        for alias in ["powerscale", "csi-powerscale", "isilon"] {
            assert_eq!(ArrayFamily::from_alias(alias), Some(ArrayFamily::PowerScale));
        }
    }

    #[test]
    fn unknown_alias_is_none() {
        assert_eq!(ArrayFamily::from_alias("csi-unknown"), None);
    }
}
