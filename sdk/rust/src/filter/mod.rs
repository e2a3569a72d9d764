//! Filter expression model and wire serializer
//!
//! Expressions are immutable persistent trees: every combinator allocates a
//! new node and shares its operands through `Arc`, so an expression stays
//! independently reusable after being combined.
//!
//! Serialization follows the service grammar: `&` for AND, `|` for OR, with
//! AND binding tighter than OR. The only parenthesized form is an OR nested
//! directly inside an AND.

mod parse;
mod value;

pub use parse::parse_filter;
pub use value::FilterValue;

pub(crate) use value::encode_component;

use std::fmt;
use std::sync::Arc;

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Substring-matching operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringOp {
    Contains,
    StartsWith,
    EndsWith,
}

impl StringOp {
    fn name(self) -> &'static str {
        match self {
            Self::Contains => "contains",
            Self::StartsWith => "startswith",
            Self::EndsWith => "endswith",
        }
    }
}

/// Set-membership operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayOp {
    In,
    NotIn,
}

impl ArrayOp {
    fn name(self) -> &'static str {
        match self {
            Self::In => "in",
            Self::NotIn => "notin",
        }
    }
}

#[derive(Debug)]
enum Node {
    Compare {
        field: String,
        op: CompareOp,
        value: FilterValue,
    },
    StringMatch {
        field: String,
        op: StringOp,
        value: String,
    },
    Membership {
        field: String,
        op: ArrayOp,
        values: Vec<FilterValue>,
    },
    And(Arc<Node>, Arc<Node>),
    Or(Arc<Node>, Arc<Node>),
}

/// An immutable filter expression.
#[derive(Debug, Clone)]
pub struct FilterExpr(Arc<Node>);

impl FilterExpr {
    /// Conjunction. Allocates a new node; both operands are shared, not moved.
    pub fn and(self, other: FilterExpr) -> FilterExpr {
        FilterExpr(Arc::new(Node::And(self.0, other.0)))
    }

    /// Disjunction. Allocates a new node; both operands are shared, not moved.
    pub fn or(self, other: FilterExpr) -> FilterExpr {
        FilterExpr(Arc::new(Node::Or(self.0, other.0)))
    }

    /// Renders the expression in the service's wire grammar.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        render(&self.0, &mut out);
        out
    }
}

impl fmt::Display for FilterExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire())
    }
}

fn render(node: &Node, out: &mut String) {
    match node {
        Node::Compare { field, op, value } => {
            out.push_str(field);
            out.push_str(op.symbol());
            out.push_str(&value.to_wire());
        }
        Node::StringMatch { field, op, value } => {
            out.push_str(field);
            out.push('.');
            out.push_str(op.name());
            out.push('(');
            out.push_str(&value::wire_string(value));
            out.push(')');
        }
        Node::Membership { field, op, values } => {
            out.push_str(field);
            out.push('.');
            out.push_str(op.name());
            out.push('(');
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&v.to_wire());
            }
            out.push(')');
        }
        Node::And(left, right) => {
            render_and_operand(left, out);
            out.push('&');
            render_and_operand(right, out);
        }
        Node::Or(left, right) => {
            render(left, out);
            out.push('|');
            render(right, out);
        }
    }
}

// AND binds tighter than OR, so only an Or directly under an And is wrapped.
fn render_and_operand(node: &Node, out: &mut String) {
    if matches!(node, Node::Or(..)) {
        out.push('(');
        render(node, out);
        out.push(')');
    } else {
        render(node, out);
    }
}

/// Factory handed to [`crate::Query::filter`] callbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterBuilder;

impl FilterBuilder {
    pub fn field(&self, name: impl Into<String>) -> Field {
        Field { name: name.into() }
    }
}

/// Shorthand for building a predicate outside a query callback.
pub fn field(name: impl Into<String>) -> Field {
    FilterBuilder.field(name)
}

/// Leaf builder for one field.
#[derive(Debug, Clone)]
pub struct Field {
    name: String,
}

impl Field {
    fn compare(self, op: CompareOp, value: impl Into<FilterValue>) -> FilterExpr {
        FilterExpr(Arc::new(Node::Compare {
            field: self.name,
            op,
            value: value.into(),
        }))
    }

    fn string_match(self, op: StringOp, value: impl Into<String>) -> FilterExpr {
        FilterExpr(Arc::new(Node::StringMatch {
            field: self.name,
            op,
            value: value.into(),
        }))
    }

    fn membership(self, op: ArrayOp, values: Vec<FilterValue>) -> FilterExpr {
        FilterExpr(Arc::new(Node::Membership {
            field: self.name,
            op,
            values,
        }))
    }

    pub fn eq(self, value: impl Into<FilterValue>) -> FilterExpr {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<FilterValue>) -> FilterExpr {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<FilterValue>) -> FilterExpr {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<FilterValue>) -> FilterExpr {
        self.compare(CompareOp::Le, value)
    }

    pub fn gt(self, value: impl Into<FilterValue>) -> FilterExpr {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<FilterValue>) -> FilterExpr {
        self.compare(CompareOp::Ge, value)
    }

    pub fn contains(self, value: impl Into<String>) -> FilterExpr {
        self.string_match(StringOp::Contains, value)
    }

    pub fn starts_with(self, value: impl Into<String>) -> FilterExpr {
        self.string_match(StringOp::StartsWith, value)
    }

    pub fn ends_with(self, value: impl Into<String>) -> FilterExpr {
        self.string_match(StringOp::EndsWith, value)
    }

    pub fn is_in<I, V>(self, values: I) -> FilterExpr
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.membership(ArrayOp::In, values)
    }

    pub fn not_in<I, V>(self, values: I) -> FilterExpr
    where
        I: IntoIterator<Item = V>,
        V: Into<FilterValue>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.membership(ArrayOp::NotIn, values)
    }
}
