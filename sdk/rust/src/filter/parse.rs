//! Filter-string parsing
//!
//! Turns one human-typed predicate (`status="active"`, `amount>=100`,
//! `name.contains("bob")`, `state.in(open,held)`) into the expression model.
//! Operators are matched longest-first so `<=` wins over `<`; `in`/`notin`
//! argument lists are split with quote-aware, character-by-character escape
//! tracking so commas inside quoted values never split.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::error::Error;

use super::{CompareOp, FilterExpr, FilterValue, StringOp, field};

const SYNTAX_EXAMPLE: &str =
    r#"expected e.g. status="active", amount>=100, or name.contains("bob")"#;

// Two-character operators listed first so they match before their prefixes.
const OPERATORS: &[(&str, CompareOp)] = &[
    ("<=", CompareOp::Le),
    (">=", CompareOp::Ge),
    ("!=", CompareOp::Ne),
    ("=", CompareOp::Eq),
    ("<", CompareOp::Lt),
    (">", CompareOp::Gt),
];

fn method_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<field>[A-Za-z_][A-Za-z0-9_.]*)\.(?P<method>contains|startswith|endswith|in|notin)\((?P<args>.*)\)$",
        )
        .expect("invalid method regex")
    })
}

fn ambiguous_date_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\d{1,4}[/.]\d{1,2}[/.]\d{1,4}|\d{1,2}-\d{1,2}-\d{2,4})$")
            .expect("invalid date regex")
    })
}

/// Parses one predicate into a [`FilterExpr`].
pub fn parse_filter(input: &str) -> Result<FilterExpr, Error> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::FilterSyntax(format!(
            "empty filter expression; {SYNTAX_EXAMPLE}"
        )));
    }
    if let Some(expr) = try_parse_method(input)? {
        return Ok(expr);
    }
    if let Some(expr) = try_parse_comparison(input)? {
        return Ok(expr);
    }
    Err(Error::FilterSyntax(format!(
        "unrecognized filter syntax {input:?}; {SYNTAX_EXAMPLE}"
    )))
}

fn try_parse_method(input: &str) -> Result<Option<FilterExpr>, Error> {
    let Some(caps) = method_re().captures(input) else {
        return Ok(None);
    };
    let field_name = &caps["field"];
    let method = &caps["method"];
    let args = &caps["args"];

    match method {
        "contains" | "startswith" | "endswith" => {
            let value = parse_literal(args.trim())?;
            let FilterValue::Str(s) = value else {
                return Err(Error::FilterSyntax(format!(
                    "{method}() requires a string argument, e.g. name.{method}(\"bob\")"
                )));
            };
            let op = match method {
                "contains" => StringOp::Contains,
                "startswith" => StringOp::StartsWith,
                _ => StringOp::EndsWith,
            };
            Ok(Some(match op {
                StringOp::Contains => field(field_name).contains(s),
                StringOp::StartsWith => field(field_name).starts_with(s),
                StringOp::EndsWith => field(field_name).ends_with(s),
            }))
        }
        "in" | "notin" => {
            let parts = split_args(args)?;
            if parts.is_empty() {
                return Err(Error::FilterSyntax(format!(
                    "{method}() requires at least one value, e.g. state.{method}(\"open\",\"held\")"
                )));
            }
            let values = parts
                .iter()
                .map(|p| parse_literal(p))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(if method == "in" {
                field(field_name).is_in(values)
            } else {
                field(field_name).not_in(values)
            }))
        }
        _ => unreachable!("method alternation is exhaustive"),
    }
}

fn try_parse_comparison(input: &str) -> Result<Option<FilterExpr>, Error> {
    for (i, _) in input.char_indices() {
        for (symbol, op) in OPERATORS {
            if input[i..].starts_with(symbol) {
                let field_name = input[..i].trim();
                let value_str = input[i + symbol.len()..].trim();
                if field_name.is_empty() {
                    return Err(Error::FilterSyntax(format!(
                        "missing field name before {symbol:?}; {SYNTAX_EXAMPLE}"
                    )));
                }
                if value_str.is_empty() {
                    return Err(Error::FilterSyntax(format!(
                        "missing value after {symbol:?}; {SYNTAX_EXAMPLE}"
                    )));
                }
                let value = parse_literal(value_str)?;
                return Ok(Some(field(field_name).compare(*op, value)));
            }
        }
    }
    Ok(None)
}

/// Splits an `in`/`notin` argument list on commas outside quotes.
fn split_args(args: &str) -> Result<Vec<String>, Error> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in args.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if quote.is_some() => {
                current.push(c);
                escaped = true;
            }
            '\'' | '"' => {
                match quote {
                    Some(q) if q == c => quote = None,
                    None => quote = Some(c),
                    Some(_) => {}
                }
                current.push(c);
            }
            ',' if quote.is_none() => {
                parts.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if quote.is_some() || escaped {
        return Err(Error::FilterSyntax(format!(
            "unterminated quoted value in list; {SYNTAX_EXAMPLE}"
        )));
    }
    let last = current.trim().to_string();
    if !last.is_empty() || !parts.is_empty() {
        parts.push(last);
    }
    Ok(parts)
}

fn parse_literal(token: &str) -> Result<FilterValue, Error> {
    if token.is_empty() {
        return Err(Error::FilterSyntax(format!(
            "empty value; {SYNTAX_EXAMPLE}"
        )));
    }
    match token {
        "null" => return Ok(FilterValue::Null),
        "true" => return Ok(FilterValue::Bool(true)),
        "false" => return Ok(FilterValue::Bool(false)),
        _ => {}
    }
    if token.starts_with('\'') || token.starts_with('"') {
        return Ok(FilterValue::Str(unquote(token)?));
    }
    if let Ok(i) = token.parse::<i64>() {
        return Ok(FilterValue::Int(i));
    }
    if let Ok(f) = token.parse::<f64>()
        && f.is_finite()
        && token.starts_with(|c: char| c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Ok(FilterValue::Float(f));
    }
    // Reject ambiguous shapes before chrono gets a chance to guess at them.
    if ambiguous_date_re().is_match(token) {
        return Err(Error::FilterSyntax(format!(
            "ambiguous date {token:?}; use explicit ISO-8601, e.g. 2024-01-15 or 2024-01-15T10:30:00Z"
        )));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(token) {
        return Ok(FilterValue::DateTime(dt.with_timezone(&Utc)));
    }
    if let Ok(d) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Ok(FilterValue::Date(d));
    }
    Ok(FilterValue::Str(token.to_string()))
}

/// Strips matching quotes and resolves backslash escapes.
fn unquote(token: &str) -> Result<String, Error> {
    let mut chars = token.chars();
    let quote = chars.next().expect("caller checked non-empty");
    let mut out = String::new();
    let mut escaped = false;
    let mut closed = false;
    for c in chars {
        if closed {
            return Err(Error::FilterSyntax(format!(
                "unexpected text after closing quote in {token:?}; {SYNTAX_EXAMPLE}"
            )));
        }
        if escaped {
            out.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            c if c == quote => closed = true,
            c => out.push(c),
        }
    }
    if !closed || escaped {
        return Err(Error::FilterSyntax(format!(
            "unterminated string {token:?}; {SYNTAX_EXAMPLE}"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_comparison_operators() {
        assert_eq!(parse_filter("a=1").unwrap().to_wire(), "a=1");
        assert_eq!(parse_filter("a!=1").unwrap().to_wire(), "a!=1");
        assert_eq!(parse_filter("a<1").unwrap().to_wire(), "a<1");
        assert_eq!(parse_filter("a<=1").unwrap().to_wire(), "a<=1");
        assert_eq!(parse_filter("a>1").unwrap().to_wire(), "a>1");
        assert_eq!(parse_filter("a>=1").unwrap().to_wire(), "a>=1");
    }

    #[test]
    fn longest_operator_wins() {
        // "<=" must not parse as "<" with value "=5"
        assert_eq!(parse_filter("price <= 5").unwrap().to_wire(), "price<=5");
    }

    #[test]
    fn quoted_strings_resolve_escapes() {
        let expr = parse_filter(r#"name="O\"Brien""#).unwrap();
        assert_eq!(expr.to_wire(), "name=%22O%5C%22Brien%22");
        let expr = parse_filter("name='bob'").unwrap();
        assert_eq!(expr.to_wire(), "name=%22bob%22");
    }

    #[test]
    fn bare_tokens_are_strings() {
        assert_eq!(
            parse_filter("status=active").unwrap().to_wire(),
            "status=%22active%22"
        );
    }

    #[test]
    fn iso_date_and_datetime_literals() {
        assert_eq!(
            parse_filter("created>=2024-01-15").unwrap().to_wire(),
            "created>=%222024-01-15%22"
        );
        assert_eq!(
            parse_filter("created>=2024-01-15T10:30:00Z").unwrap().to_wire(),
            "created>=%222024-01-15T10%3A30%3A00.000Z%22"
        );
    }

    #[test]
    fn ambiguous_date_is_rejected_with_hint() {
        let err = parse_filter("created>=01/15/2024").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("ISO-8601"), "got: {msg}");

        let err = parse_filter("created>=15.01.2024").unwrap_err();
        assert!(err.to_string().contains("ISO-8601"));

        // Short two-digit forms must not be guessed at either.
        let err = parse_filter("created>=01-02-03").unwrap_err();
        assert!(err.to_string().contains("ISO-8601"));
    }

    #[test]
    fn parses_string_methods() {
        assert_eq!(
            parse_filter(r#"name.contains("bob")"#).unwrap().to_wire(),
            "name.contains(%22bob%22)"
        );
        assert_eq!(
            parse_filter("sku.startswith(A-)").unwrap().to_wire(),
            "sku.startswith(%22A-%22)"
        );
    }

    #[test]
    fn string_method_rejects_non_string_argument() {
        let err = parse_filter("name.contains(42)").unwrap_err();
        assert!(err.to_string().contains("string argument"));
    }

    #[test]
    fn parses_membership_lists() {
        assert_eq!(
            parse_filter("state.in(open,held)").unwrap().to_wire(),
            "state.in(%22open%22,%22held%22)"
        );
        assert_eq!(
            parse_filter("code.notin(1,2,3)").unwrap().to_wire(),
            "code.notin(1,2,3)"
        );
    }

    #[test]
    fn commas_inside_quotes_do_not_split() {
        let expr = parse_filter(r#"tags.in("a,b",c)"#).unwrap();
        assert_eq!(expr.to_wire(), "tags.in(%22a%2Cb%22,%22c%22)");
    }

    #[test]
    fn escaped_quote_inside_list_value_survives() {
        let expr = parse_filter(r#"tags.in("x\",y",z)"#).unwrap();
        assert_eq!(expr.to_wire(), "tags.in(%22x%5C%22%2Cy%22,%22z%22)");
    }

    #[test]
    fn empty_membership_list_is_rejected() {
        let err = parse_filter("state.in()").unwrap_err();
        assert!(err.to_string().contains("at least one value"));
    }

    #[test]
    fn garbage_reports_corrective_example() {
        let err = parse_filter("what even is this").unwrap_err();
        assert!(err.to_string().contains("status=\"active\""));
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        assert!(parse_filter(r#"name="bob"#).is_err());
        assert!(parse_filter(r#"tags.in("a,b)"#).is_err());
    }

    #[test]
    fn literal_keywords() {
        assert_eq!(parse_filter("deleted=null").unwrap().to_wire(), "deleted=null");
        assert_eq!(parse_filter("active=true").unwrap().to_wire(), "active=true");
        assert_eq!(parse_filter("active=false").unwrap().to_wire(), "active=false");
    }
}
