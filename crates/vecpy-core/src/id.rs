//! Stable ID newtype for kernel variables.
//!
//! Expressions and statements reference variables through `VarId` handles
//! rather than owning them; the kernel is the root owner and variables are
//! never destroyed, so a handle never dangles.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Index of a variable within its kernel, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_id_display() {
        assert_eq!(format!("{}", VarId(7)), "7");
    }

    #[test]
    fn var_id_orders_by_index() {
        assert!(VarId(3) < VarId(12));
    }

    #[test]
    fn serde_roundtrip() {
        let id = VarId(42);
        let json = serde_json::to_string(&id).unwrap();
        let back: VarId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }
}
