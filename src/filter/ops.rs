//! The operator table: textual suffixes to comparison operations.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::FunctionSettings;
use crate::error::{CompileError, CompileResult};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap());

/// Whether `name` may be used as a SQL function name.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Comparison selected by a suffix, before negation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BaseOp {
    Exact,
    Gt,
    Gte,
    Lt,
    Lte,
    Range,
    In,
    Contains,
    IContains,
    Match,
    IExact,
    StartsWith,
    IStartsWith,
    EndsWith,
    IEndsWith,
    HasAll,
    HasAny,
    HasKey,
    Overlap,
    IsNull,
    IsNotNull,
    Year,
    Month,
    Day,
    Func,
    SFunc,
    EFunc,
}

impl BaseOp {
    const ALL: [BaseOp; 27] = [
        BaseOp::Exact,
        BaseOp::Gt,
        BaseOp::Gte,
        BaseOp::Lt,
        BaseOp::Lte,
        BaseOp::Range,
        BaseOp::In,
        BaseOp::Contains,
        BaseOp::IContains,
        BaseOp::Match,
        BaseOp::IExact,
        BaseOp::StartsWith,
        BaseOp::IStartsWith,
        BaseOp::EndsWith,
        BaseOp::IEndsWith,
        BaseOp::HasAll,
        BaseOp::HasAny,
        BaseOp::HasKey,
        BaseOp::Overlap,
        BaseOp::IsNull,
        BaseOp::IsNotNull,
        BaseOp::Year,
        BaseOp::Month,
        BaseOp::Day,
        BaseOp::Func,
        BaseOp::SFunc,
        BaseOp::EFunc,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            BaseOp::Exact => "exact",
            BaseOp::Gt => "gt",
            BaseOp::Gte => "gte",
            BaseOp::Lt => "lt",
            BaseOp::Lte => "lte",
            BaseOp::Range => "range",
            BaseOp::In => "in",
            BaseOp::Contains => "contains",
            BaseOp::IContains => "icontains",
            BaseOp::Match => "match",
            BaseOp::IExact => "iexact",
            BaseOp::StartsWith => "startswith",
            BaseOp::IStartsWith => "istartswith",
            BaseOp::EndsWith => "endswith",
            BaseOp::IEndsWith => "iendswith",
            BaseOp::HasAll => "hasall",
            BaseOp::HasAny => "hasany",
            BaseOp::HasKey => "haskey",
            BaseOp::Overlap => "overlap",
            BaseOp::IsNull => "isnull",
            BaseOp::IsNotNull => "isnotnull",
            BaseOp::Year => "year",
            BaseOp::Month => "month",
            BaseOp::Day => "day",
            BaseOp::Func => "func",
            BaseOp::SFunc => "sfunc",
            BaseOp::EFunc => "efunc",
        }
    }

    fn from_suffix(s: &str) -> Option<BaseOp> {
        BaseOp::ALL.iter().copied().find(|op| op.suffix() == s)
    }

    /// Function-call operators consume the remaining tokens.
    pub fn is_func(&self) -> bool {
        matches!(self, BaseOp::Func | BaseOp::SFunc | BaseOp::EFunc)
    }

    /// The operand is a flag, not a value of the field's type.
    pub fn is_null_test(&self) -> bool {
        matches!(self, BaseOp::IsNull | BaseOp::IsNotNull)
    }

    /// A scalar operand is turned into a one-element list.
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            BaseOp::Range | BaseOp::In | BaseOp::HasAny | BaseOp::HasAll | BaseOp::Overlap
        )
    }

    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            BaseOp::IExact | BaseOp::IContains | BaseOp::IStartsWith | BaseOp::IEndsWith
        )
    }

    fn negatable(&self) -> bool {
        !self.is_null_test() && !self.is_func()
    }
}

/// A parsed operator suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operator {
    pub base: BaseOp,
    pub negated: bool,
}

impl Operator {
    pub const EXACT: Operator = Operator {
        base: BaseOp::Exact,
        negated: false,
    };

    pub fn new(base: BaseOp) -> Self {
        Self {
            base,
            negated: false,
        }
    }

    /// Parse a suffix such as `gte`, `notin` or `isnull`.
    pub fn parse(s: &str) -> Option<Operator> {
        if let Some(base) = BaseOp::from_suffix(s) {
            return Some(Operator::new(base));
        }
        let base = BaseOp::from_suffix(s.strip_prefix("not")?)?;
        base.negatable().then_some(Operator {
            base,
            negated: true,
        })
    }

    pub fn is_operator(s: &str) -> bool {
        Operator::parse(s).is_some()
    }

    pub fn suffix(&self) -> String {
        if self.negated {
            format!("not{}", self.base.suffix())
        } else {
            self.base.suffix().to_string()
        }
    }
}

/// Validate a function name taken from a parameter path.
pub fn check_function_name(
    name: &str,
    policy: &FunctionSettings,
    path: &str,
) -> CompileResult<()> {
    if !is_identifier(name) {
        return Err(CompileError::invalid_attribute(
            path,
            format!("{} is not a valid function name", name),
        ));
    }
    if !policy.is_allowed(name) {
        return Err(CompileError::invalid_attribute(
            path,
            format!("function {} is not allowed", name),
        ));
    }
    Ok(())
}
