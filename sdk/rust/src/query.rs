//! Query compiler
//!
//! Accumulates select/filter/sort/limit/count directives and renders one
//! wire query string. Clause order is fixed at
//! select→filter→sort→limit→count regardless of call order; the order is a
//! wire-compatibility contract.

use crate::filter::{FilterBuilder, FilterExpr};

/// Sort direction for one spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

#[derive(Debug, Clone)]
struct SortSpec {
    field: String,
    direction: SortDirection,
}

/// Accumulated query directives.
///
/// `Clone` yields an independent copy: the list fields are copied and the
/// filter tree is shared by reference, which is safe because expression
/// nodes are immutable.
#[derive(Debug, Clone, Default)]
pub struct Query {
    select: Vec<String>,
    filter: Option<FilterExpr>,
    sort: Vec<SortSpec>,
    limit: Option<u64>,
    count: bool,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends projection fields; never replaces earlier selections.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Builds a filter with a fresh expression factory and AND-combines it
    /// with any prior filter, so repeated calls compose conjunctively.
    pub fn filter<F>(self, build: F) -> Self
    where
        F: FnOnce(&FilterBuilder) -> FilterExpr,
    {
        let expr = build(&FilterBuilder);
        self.filter_expr(expr)
    }

    /// AND-combines an already-built expression (e.g. from
    /// [`crate::filter::parse_filter`]).
    pub fn filter_expr(mut self, expr: FilterExpr) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(expr),
            None => expr,
        });
        self
    }

    /// Appends an ascending sort spec.
    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortSpec {
            field: field.into(),
            direction: SortDirection::Ascending,
        });
        self
    }

    /// Appends a descending sort spec, encoded as a leading `-` on the field.
    pub fn sort_desc(mut self, field: impl Into<String>) -> Self {
        self.sort.push(SortSpec {
            field: field.into(),
            direction: SortDirection::Descending,
        });
        self
    }

    /// Replaces any prior limit; last write wins.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Requests a count instead of records.
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }

    /// Renders the wire query string, or an empty string when no directive
    /// was added.
    pub fn to_query_string(&self) -> String {
        let mut clauses: Vec<String> = Vec::new();
        if !self.select.is_empty() {
            clauses.push(format!("select({})", self.select.join(",")));
        }
        if let Some(filter) = &self.filter {
            clauses.push(filter.to_wire());
        }
        if !self.sort.is_empty() {
            let specs: Vec<String> = self
                .sort
                .iter()
                .map(|s| match s.direction {
                    SortDirection::Ascending => s.field.clone(),
                    SortDirection::Descending => format!("-{}", s.field),
                })
                .collect();
            clauses.push(format!("sort({})", specs.join(",")));
        }
        if let Some(limit) = self.limit {
            clauses.push(format!("limit({limit})"));
        }
        if self.count {
            clauses.push("count()".to_string());
        }
        if clauses.is_empty() {
            String::new()
        } else {
            format!("?{}", clauses.join("&"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_renders_empty_string() {
        assert_eq!(Query::new().to_query_string(), "");
    }

    #[test]
    fn clause_order_is_fixed_regardless_of_call_order() {
        let query = Query::new()
            .count()
            .limit(10)
            .sort_desc("price")
            .filter(|f| f.field("price").gt(5))
            .select(["sku", "price"]);
        assert_eq!(
            query.to_query_string(),
            "?select(sku,price)&price>5&sort(-price)&limit(10)&count()"
        );
    }

    #[test]
    fn select_appends_instead_of_replacing() {
        let query = Query::new().select(["a"]).select(["b", "c"]);
        assert_eq!(query.to_query_string(), "?select(a,b,c)");
    }

    #[test]
    fn repeated_filters_compose_conjunctively() {
        let query = Query::new()
            .filter(|f| f.field("a").eq(1))
            .filter(|f| f.field("b").eq(2));
        assert_eq!(query.to_query_string(), "?a=1&b=2");
    }

    #[test]
    fn limit_is_last_write_wins() {
        let query = Query::new().limit(10).limit(25);
        assert_eq!(query.to_query_string(), "?limit(25)");
    }

    #[test]
    fn sort_specs_accumulate_in_order() {
        let query = Query::new().sort("name").sort_desc("created");
        assert_eq!(query.to_query_string(), "?sort(name,-created)");
    }

    #[test]
    fn clone_is_independent_of_source() {
        let source = Query::new().select(["a"]).limit(10);
        let rendered = source.to_query_string();
        let modified = source.clone().select(["b"]).limit(99).count();
        assert_eq!(source.to_query_string(), rendered);
        assert_eq!(
            modified.to_query_string(),
            "?select(a,b)&limit(99)&count()"
        );
    }
}
