use chrono::{DateTime, NaiveDateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use crate::models::DriveFile;

/// Parsed filter expression. `or` binds looser than `and`; grouping comes
/// from parentheses in the source string.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Leaf(Predicate),
}

/// Atomic condition over a single record field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    NameEq(String),
    NameNe(String),
    NameContains(String),
    InParents(String),
    Trashed(bool),
    MimeTypeEq(String),
    MimeTypeNe(String),
    ModifiedTime(TimeOp, String),
    /// Blank sub-expression or a leaf that matches no known pattern.
    /// Unsupported filters degrade to a no-op instead of erroring.
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOp {
    Gt,
    Lt,
    Ge,
    Le,
    Eq,
}

lazy_static! {
    // Single-quoted literal with backslash-escaped quotes inside.
    static ref NAME_RE: Regex =
        Regex::new(r"^name\s*(!=|=)\s*'((?:[^'\\]|\\.)*)'$").unwrap();
    static ref TITLE_EQ_RE: Regex =
        Regex::new(r"^title\s*=\s*'((?:[^'\\]|\\.)*)'$").unwrap();
    static ref CONTAINS_RE: Regex =
        Regex::new(r"^(?:name|title)\s+contains\s+'((?:[^'\\]|\\.)*)'$").unwrap();
    static ref IN_PARENTS_RE: Regex =
        Regex::new(r"^'((?:[^'\\]|\\.)*)'\s+in\s+parents$").unwrap();
    static ref TRASHED_RE: Regex = Regex::new(r"^trashed\s*=\s*(true|false)$").unwrap();
    static ref MIME_RE: Regex =
        Regex::new(r"^mimeType\s*(!=|=)\s*'((?:[^'\\]|\\.)*)'$").unwrap();
    static ref MODIFIED_RE: Regex =
        Regex::new(r"^modifiedTime\s*(>=|<=|>|<|=)\s*'([^']*)'$").unwrap();
}

/// Evaluate a filter string against a record.
pub fn matches(query: &str, file: &DriveFile) -> bool {
    eval(&parse(query), file)
}

/// Parse a filter string into an expression tree.
///
/// Splitting happens only at parenthesis depth 0, `" or "` before `" and "`
/// (lower precedence splits first), left-to-right at the first occurrence.
/// The scan is deliberately not quote-aware: a quoted literal containing
/// `" and "` splits like the keyword does, and the resulting fragments fall
/// through to `Predicate::Always`.
pub fn parse(query: &str) -> Expr {
    let expr = strip_group(query.trim());
    if expr.is_empty() {
        return Expr::Leaf(Predicate::Always);
    }
    if let Some((left, right)) = split_at_depth_zero(expr, " or ") {
        return Expr::Or(Box::new(parse(left)), Box::new(parse(right)));
    }
    if let Some((left, right)) = split_at_depth_zero(expr, " and ") {
        return Expr::And(Box::new(parse(left)), Box::new(parse(right)));
    }
    Expr::Leaf(parse_leaf(expr))
}

/// Evaluate a parsed expression against a record.
pub fn eval(expr: &Expr, file: &DriveFile) -> bool {
    match expr {
        Expr::Or(left, right) => eval(left, file) || eval(right, file),
        Expr::And(left, right) => eval(left, file) && eval(right, file),
        Expr::Leaf(predicate) => eval_predicate(predicate, file),
    }
}

fn eval_predicate(predicate: &Predicate, file: &DriveFile) -> bool {
    match predicate {
        Predicate::NameEq(value) => file.name == *value,
        Predicate::NameNe(value) => file.name != *value,
        Predicate::NameContains(value) => file.name.contains(value.as_str()),
        Predicate::InParents(id) => file.parents.iter().any(|parent| parent == id),
        Predicate::Trashed(value) => file.trashed == *value,
        Predicate::MimeTypeEq(value) => file.mime_type == *value,
        Predicate::MimeTypeNe(value) => file.mime_type != *value,
        Predicate::ModifiedTime(op, literal) => match parse_instant(literal) {
            Some(instant) => match op {
                TimeOp::Gt => file.modified_time > instant,
                TimeOp::Lt => file.modified_time < instant,
                TimeOp::Ge => file.modified_time >= instant,
                TimeOp::Le => file.modified_time <= instant,
                TimeOp::Eq => file.modified_time == instant,
            },
            // Unparseable instants get the same permissive treatment as
            // unknown leaves.
            None => true,
        },
        Predicate::Always => true,
    }
}

fn parse_leaf(leaf: &str) -> Predicate {
    if let Some(caps) = NAME_RE.captures(leaf) {
        let value = unescape(&caps[2]);
        return match &caps[1] {
            "=" => Predicate::NameEq(value),
            _ => Predicate::NameNe(value),
        };
    }
    if let Some(caps) = TITLE_EQ_RE.captures(leaf) {
        return Predicate::NameEq(unescape(&caps[1]));
    }
    if let Some(caps) = CONTAINS_RE.captures(leaf) {
        return Predicate::NameContains(unescape(&caps[1]));
    }
    if let Some(caps) = IN_PARENTS_RE.captures(leaf) {
        return Predicate::InParents(unescape(&caps[1]));
    }
    if let Some(caps) = TRASHED_RE.captures(leaf) {
        return Predicate::Trashed(&caps[1] == "true");
    }
    if let Some(caps) = MIME_RE.captures(leaf) {
        let value = unescape(&caps[2]);
        return match &caps[1] {
            "=" => Predicate::MimeTypeEq(value),
            _ => Predicate::MimeTypeNe(value),
        };
    }
    if let Some(caps) = MODIFIED_RE.captures(leaf) {
        let op = match &caps[1] {
            ">=" => TimeOp::Ge,
            "<=" => TimeOp::Le,
            ">" => TimeOp::Gt,
            "<" => TimeOp::Lt,
            _ => TimeOp::Eq,
        };
        return Predicate::ModifiedTime(op, caps[2].to_string());
    }
    Predicate::Always
}

/// Strip enclosing parentheses, but only when one matching pair wraps the
/// entire trimmed string.
fn strip_group(expr: &str) -> &str {
    let mut current = expr.trim();
    while wrapped_by_one_group(current) {
        current = current[1..current.len() - 1].trim();
    }
    current
}

fn wrapped_by_one_group(expr: &str) -> bool {
    if !(expr.starts_with('(') && expr.ends_with(')')) {
        return false;
    }
    let mut depth = 0i32;
    for (index, ch) in expr.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return index == expr.len() - 1;
                }
            }
            _ => {}
        }
    }
    false
}

/// Split at the first occurrence of `separator` outside any parentheses.
fn split_at_depth_zero<'a>(expr: &'a str, separator: &str) -> Option<(&'a str, &'a str)> {
    let bytes = expr.as_bytes();
    let sep = separator.as_bytes();
    let mut depth = 0i32;
    for index in 0..bytes.len() {
        match bytes[index] {
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {
                // Byte-wise match; the separator starts with an ASCII
                // space, so a hit is always on a char boundary.
                if depth == 0 && bytes[index..].starts_with(sep) {
                    return Some((&expr[..index], &expr[index + sep.len()..]));
                }
            }
        }
    }
    None
}

fn unescape(literal: &str) -> String {
    literal.replace("\\'", "'")
}

fn parse_instant(literal: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(literal) {
        return Some(instant.with_timezone(&Utc));
    }
    // Offset-less timestamps are taken as UTC.
    literal
        .parse::<NaiveDateTime>()
        .ok()
        .map(|naive| naive.and_utc())
}
