//! The backend-independent half of the compiler.
//!
//! Parameter names are resolved against entity schemas ([`path`]), turned
//! into condition trees ([`condition`]) and compiled through a [`Backend`]
//! by the [`FilterBuilder`], which also handles order criteria. Totals
//! directives are parsed here and assembled by each backend.

pub mod backend;
pub mod builder;
pub mod condition;
pub mod joins;
pub mod ops;
pub mod order;
pub mod path;
pub mod totals;

#[cfg(test)]
pub(crate) mod test_utils;

pub use backend::{Backend, Leaf, Operand, OrderKey, Target, Terminal};
pub use builder::FilterBuilder;
pub use condition::{Condition, LogicalOp};
pub use joins::{JoinAlias, JoinRegistry, JoinStep};
pub use ops::{BaseOp, Operator};
pub use order::OrderCriterion;
pub use path::{Conjunction, Hop, Mode, PathKind, ResolvedPath, Resolver, SEPARATOR};
pub use totals::{GroupDim, Metric, TotalsSpec};
