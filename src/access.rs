// SPDX-License-Identifier: BSD-3-Clause
//! The variable-access model. An [`Access`] describes which variable an
//! instruction touches: a scalar SSA value, a field of a record, or an
//! element of array-like memory. Identity deliberately ignores array
//! indices and field selectors: two writes into the same array are the
//! same variable as far as the downstream analysis is concerned.

use std::fmt;
use std::hash::{Hash, Hasher};

use inkwell::values::BasicValueEnum;

use crate::llvm::ValueToken;

#[derive(Clone)]
pub enum Access<'ctx> {
    /// A local allocation, a mutable global, a call result, or (as an
    /// accessor only) a constant.
    Scalar(BasicValueEnum<'ctx>),
    /// A field access: base record plus the field selector.
    Structural(Box<Access<'ctx>>, Box<Access<'ctx>>),
    /// An element access: base memory plus the index variables, if any.
    /// Pure-constant indices are omitted, so the list may be empty.
    ArrayLike(Box<Access<'ctx>>, Vec<Access<'ctx>>),
}

impl<'ctx> Access<'ctx> {
    pub fn scalar(value: BasicValueEnum<'ctx>) -> Self {
        Access::Scalar(value)
    }

    pub fn structural(base: Access<'ctx>, field: Access<'ctx>) -> Self {
        Access::Structural(Box::new(base), Box::new(field))
    }

    pub fn array_like(base: Access<'ctx>, indices: Vec<Access<'ctx>>) -> Self {
        Access::ArrayLike(Box::new(base), indices)
    }

    /// The scalar's SSA value. `None` on non-scalar kinds.
    pub fn value(&self) -> Option<BasicValueEnum<'ctx>> {
        match self {
            Access::Scalar(value) => Some(*value),
            _ => None,
        }
    }

    /// The base of a composite access. `None` on scalars.
    pub fn base(&self) -> Option<&Access<'ctx>> {
        match self {
            Access::Scalar(_) => None,
            Access::Structural(base, _) | Access::ArrayLike(base, _) => Some(base),
        }
    }

    /// The scalar value, or the scalar at the bottom of the base chain.
    pub fn value_or_base(&self) -> BasicValueEnum<'ctx> {
        match self {
            Access::Scalar(value) => *value,
            Access::Structural(base, _) | Access::ArrayLike(base, _) => base.value_or_base(),
        }
    }

    /// Identity token of [`Self::value_or_base`], the key the repository's
    /// value-id table uses.
    pub fn token(&self) -> ValueToken {
        ValueToken::of(&self.value_or_base())
    }
}

/// Equality interrogates only the kind and the base chain. Scalars compare
/// by SSA-value identity; accessors and indices are not part of identity.
impl PartialEq for Access<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Access::Scalar(a), Access::Scalar(b)) => ValueToken::of(a) == ValueToken::of(b),
            (Access::Structural(a, _), Access::Structural(b, _)) => a == b,
            (Access::ArrayLike(a, _), Access::ArrayLike(b, _)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Access<'_> {}

impl Hash for Access<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Access::Scalar(value) => ValueToken::of(value).hash(state),
            Access::Structural(base, _) | Access::ArrayLike(base, _) => base.hash(state),
        }
    }
}

// Rendered in the style the analyzer's own data model uses: `%id`,
// `base.field`, `base[i, j]`. Scalar numbers are assigned in order of
// first appearance within one rendering, so the same value prints as the
// same small id and no value handle leaks into the output.
impl fmt::Debug for Access<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_numbered(f, &mut Vec::new())
    }
}

impl<'ctx> Access<'ctx> {
    fn fmt_numbered(
        &self,
        f: &mut fmt::Formatter<'_>,
        numbered: &mut Vec<ValueToken>,
    ) -> fmt::Result {
        match self {
            Access::Scalar(value) => {
                let token = ValueToken::of(value);
                let id = match numbered.iter().position(|seen| *seen == token) {
                    Some(position) => position + 1,
                    None => {
                        numbered.push(token);
                        numbered.len()
                    }
                };
                write!(f, "%{}", id)
            }
            Access::Structural(base, field) => {
                base.fmt_numbered(f, numbered)?;
                write!(f, ".")?;
                field.fmt_numbered(f, numbered)
            }
            Access::ArrayLike(base, indices) => {
                base.fmt_numbered(f, numbered)?;
                if indices.is_empty() {
                    return write!(f, "[]");
                }
                write!(f, "[")?;
                indices[0].fmt_numbered(f, numbered)?;
                for index in indices.iter().skip(1) {
                    write!(f, ", ")?;
                    index.fmt_numbered(f, numbered)?;
                }
                write!(f, "]")
            }
        }
    }
}

/// A set of accesses that remembers insertion order.
///
/// Use-sets reach the artifact bytes, and hashing an [`Access`] involves the
/// addresses of SSA values, which change from run to run. Keeping the members
/// in first-insertion order makes iteration a pure function of the input IR,
/// which a hash-ordered set cannot be.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AccessSet<'ctx> {
    items: Vec<Access<'ctx>>,
}

impl<'ctx> AccessSet<'ctx> {
    pub fn new() -> Self {
        AccessSet { items: Vec::new() }
    }

    /// Inserts an access, returning whether it was new. Membership follows
    /// `Access` equality, so an indexed access into an already-present base
    /// is rejected as a duplicate.
    pub fn insert(&mut self, access: Access<'ctx>) -> bool {
        if self.items.contains(&access) {
            return false;
        }
        self.items.push(access);
        true
    }

    pub fn contains(&self, access: &Access<'ctx>) -> bool {
        self.items.contains(access)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Access<'ctx>> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl<'ctx> IntoIterator for AccessSet<'ctx> {
    type Item = Access<'ctx>;
    type IntoIter = std::vec::IntoIter<Access<'ctx>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, 'ctx> IntoIterator for &'a AccessSet<'ctx> {
    type Item = &'a Access<'ctx>;
    type IntoIter = std::slice::Iter<'a, Access<'ctx>>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
