//! The kernel: the elementwise function after lowering.
//!
//! A [`Kernel`] owns every variable the body references and the root block
//! of the statement tree. Variables live in a creation-ordered table and are
//! never destroyed; the name table maps each name to its newest variable,
//! and literals are deduplicated by numeric value.
//!
//! The variable counter is per-kernel, so generated names (`var007`,
//! `lit002`, `mask011`) are deterministic no matter how many kernels are
//! compiled in one process.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::VarId;
use crate::stmt::Block;
use crate::variable::{LitValue, Role, VarKind, Variable};

/// Default docstring for kernels whose source has none.
pub const DEFAULT_DOCSTRING: &str = "An undocumented (but probably awesome) kernel function.";

/// Argument-table filter. `input`/`output` require the flag; `uniform`/
/// `array` match the kind when set.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArgFilter {
    pub input: bool,
    pub output: bool,
    pub uniform: Option<bool>,
    pub array: Option<bool>,
}

/// Variable-table filter over non-literal variables.
#[derive(Debug, Default, Clone, Copy)]
pub struct VarFilter {
    pub mask: Option<bool>,
    pub uniform: Option<bool>,
    pub array: Option<bool>,
}

/// The elementwise function definition, after lowering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kernel {
    pub name: String,
    pub docstring: String,
    vars: Vec<Variable>,
    /// Name -> newest variable with that name. Insertion-ordered so argument
    /// iteration matches declaration order.
    by_name: IndexMap<String, VarId>,
    literals: HashMap<u64, VarId>,
    pub root: Block,
    mask_true: VarId,
    mask_false: VarId,
}

impl Kernel {
    pub fn new(name: impl Into<String>) -> Self {
        let mut kernel = Kernel {
            name: name.into(),
            docstring: DEFAULT_DOCSTRING.to_string(),
            vars: Vec::new(),
            by_name: IndexMap::new(),
            literals: HashMap::new(),
            root: Block::new(VarId(0)),
            mask_true: VarId(0),
            mask_false: VarId(0),
        };
        kernel.mask_true = kernel.insert(
            Some("MASK_TRUE".to_string()),
            Role::MaskLiteral,
            VarKind::Mask,
            None,
        );
        kernel.mask_false = kernel.insert(
            Some("MASK_FALSE".to_string()),
            Role::MaskLiteral,
            VarKind::Mask,
            None,
        );
        kernel.root = Block::new(kernel.mask_true);
        kernel
    }

    /// The all-ones mask sentinel; predicate of the root block.
    pub fn mask_true(&self) -> VarId {
        self.mask_true
    }

    /// The all-zeros mask sentinel.
    pub fn mask_false(&self) -> VarId {
        self.mask_false
    }

    pub fn set_docstring(&mut self, docstring: impl Into<String>) {
        self.docstring = docstring.into();
    }

    // -----------------------------------------------------------------------
    // Variable creation
    // -----------------------------------------------------------------------

    fn insert(
        &mut self,
        name: Option<String>,
        role: Role,
        kind: VarKind,
        value: Option<LitValue>,
    ) -> VarId {
        let id = VarId(self.vars.len() as u32);
        let name = name.unwrap_or_else(|| {
            let prefix = match (role, kind) {
                (Role::Literal, _) => "lit",
                (_, VarKind::Mask) => "mask",
                _ => "var",
            };
            format!("{}{:03}", prefix, id.0)
        });
        // A name collision replaces the reference; the superseded variable
        // keeps its slot and index.
        self.by_name.insert(name.clone(), id);
        if let Some(value) = value {
            self.literals.entry(value.key()).or_insert(id);
        }
        self.vars.push(Variable {
            id,
            name,
            role,
            kind,
            value,
            input: false,
            output: false,
        });
        id
    }

    /// Register a kernel parameter.
    pub fn add_argument(&mut self, name: &str, kind: VarKind) -> Result<VarId, CoreError> {
        if matches!(kind, VarKind::Mask) {
            return Err(CoreError::MaskArgument { name: name.into() });
        }
        if self
            .get_variable(name)
            .is_some_and(|var| var.is_argument())
        {
            return Err(CoreError::DuplicateArgument { name: name.into() });
        }
        Ok(self.insert(Some(name.to_string()), Role::Argument, kind, None))
    }

    /// Create a named local.
    pub fn add_named(&mut self, name: &str, kind: VarKind) -> VarId {
        self.insert(Some(name.to_string()), Role::Temporary, kind, None)
    }

    /// Create an anonymous temporary with a generated `var`/`mask` name.
    pub fn add_temp(&mut self, kind: VarKind) -> VarId {
        self.insert(None, Role::Temporary, kind, None)
    }

    /// Intern a numeric literal, reusing any existing variable with the same
    /// value.
    pub fn add_literal(&mut self, value: LitValue) -> VarId {
        if let Some(&id) = self.literals.get(&value.key()) {
            return id;
        }
        self.insert(None, Role::Literal, VarKind::Scalar, Some(value))
    }

    /// Intern a well-known literal with a fixed name suffix (`litPI`,
    /// `litE`). Falls back to the existing variable when the value is
    /// already interned.
    pub fn add_literal_suffixed(&mut self, value: LitValue, suffix: &str) -> VarId {
        if let Some(&id) = self.literals.get(&value.key()) {
            return id;
        }
        self.insert(
            Some(format!("lit{}", suffix)),
            Role::Literal,
            VarKind::Scalar,
            Some(value),
        )
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// The variable behind an id. Ids are only minted by this kernel, so the
    /// lookup is direct.
    pub fn var(&self, id: VarId) -> &Variable {
        &self.vars[id.0 as usize]
    }

    /// Emitted name of a variable.
    pub fn name_of(&self, id: VarId) -> &str {
        &self.var(id).name
    }

    pub fn get_variable(&self, name: &str) -> Option<&Variable> {
        self.by_name.get(name).map(|&id| self.var(id))
    }

    pub fn get_literal(&self, value: LitValue) -> Option<&Variable> {
        self.literals.get(&value.key()).map(|&id| self.var(id))
    }

    /// Record that an argument is read by the body.
    pub fn mark_input(&mut self, id: VarId) {
        self.vars[id.0 as usize].input = true;
    }

    /// Record that an argument is written by the body.
    pub fn mark_output(&mut self, id: VarId) {
        self.vars[id.0 as usize].output = true;
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Arguments matching the filter, in declaration order.
    pub fn arguments(&self, filter: ArgFilter) -> Vec<&Variable> {
        let mut args: Vec<&Variable> = self
            .vars
            .iter()
            .filter(|var| var.is_argument())
            .filter(|var| !filter.input || var.input)
            .filter(|var| !filter.output || var.output)
            .filter(|var| filter.uniform.is_none_or(|want| var.is_uniform() == want))
            .filter(|var| filter.array.is_none_or(|want| var.is_array() == want))
            .collect();
        args.sort_by_key(|var| var.id);
        args
    }

    /// Numeric literals, sorted by value.
    pub fn literals(&self) -> Vec<&Variable> {
        let mut lits: Vec<&Variable> = self.vars.iter().filter(|var| var.is_literal()).collect();
        lits.sort_by_key(|var| var.value);
        lits
    }

    /// Non-literal variables (arguments and temporaries) matching the
    /// filter, sorted by index.
    pub fn variables(&self, filter: VarFilter) -> Vec<&Variable> {
        self.vars
            .iter()
            .filter(|var| matches!(var.role, Role::Argument | Role::Temporary))
            .filter(|var| filter.mask.is_none_or(|want| var.is_mask() == want))
            .filter(|var| filter.uniform.is_none_or(|want| var.is_uniform() == want))
            .filter(|var| filter.array.is_none_or(|want| var.is_array() == want))
            .collect()
    }
}


#[cfg(test)]
mod properties {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn literal_interning_is_stable(values in proptest::collection::vec(-1e6f64..1e6, 1..32)) {
            let mut k = Kernel::new("prop");
            let ids: Vec<VarId> = values.iter().map(|&v| k.add_literal(LitValue::new(v))).collect();
            // Interning the same values again resolves to the same variables.
            for (&v, &id) in values.iter().zip(&ids) {
                prop_assert_eq!(k.add_literal(LitValue::new(v)), id);
            }
            // One variable per distinct value.
            let mut keys: Vec<u64> = values.iter().map(|&v| LitValue::new(v).key()).collect();
            keys.sort_unstable();
            keys.dedup();
            prop_assert_eq!(k.literals().len(), keys.len());
        }

        #[test]
        fn variable_indices_are_monotonic(count in 1usize..64) {
            let mut k = Kernel::new("prop");
            let mut last = None;
            for _ in 0..count {
                let id = k.add_temp(VarKind::Scalar);
                if let Some(prev) = last {
                    prop_assert!(id > prev);
                }
                last = Some(id);
            }
        }
    }
}
