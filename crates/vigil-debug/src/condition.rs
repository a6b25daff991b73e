//! Condition grammar and the two-tier evaluator.
//!
//! Conditions have the shape `<lhs> <op> <literal>`. Tier 1 answers the
//! boolean literals and `hitCount` comparisons from the context alone;
//! tier 2 resolves `<lhs>` through the per-hit evaluation callback and
//! compares the resolved value against the literal. Anything the callback
//! cannot answer fails open: the condition counts as satisfied.

use std::fmt;

use thiserror::Error;

/// Comparison operators the condition grammar accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
        }
    }

    fn matches_ordering(self, ordering: std::cmp::Ordering) -> bool {
        match self {
            CompareOp::Eq => ordering.is_eq(),
            CompareOp::Ne => !ordering.is_eq(),
            CompareOp::Gt => ordering.is_gt(),
            CompareOp::Ge => ordering.is_ge(),
            CompareOp::Lt => ordering.is_lt(),
            CompareOp::Le => ordering.is_le(),
        }
    }

    fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

/// Right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Str(String),
    Bool(bool),
    Null,
}

/// A parsed condition.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub lhs: String,
    pub op: CompareOp,
    pub literal: Literal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionParseError {
    #[error("condition is empty")]
    Empty,
    #[error("no comparison operator in `{0}`")]
    MissingOperator(String),
    #[error("left-hand side `{0}` must start with a letter or underscore")]
    InvalidLhs(String),
    #[error("malformed literal `{0}`")]
    MalformedLiteral(String),
}

/// Parses `<lhs> <op> <literal>` where `op` is one of `==`, `!=`, `>`,
/// `>=`, `<`, `<=`. The operator scan skips double-quoted spans, so a
/// string argument inside the lhs cannot hide the operator, and prefers
/// two-character operators so `>=` never parses as `>`.
///
/// The lhs is free-form (identifier, property path, call expression) but
/// must start with a letter or underscore. Bare hit-count shorthand is a
/// plain comparison to this parser; the evaluator intercepts it first.
pub fn parse_comparison(text: &str) -> Result<Comparison, ConditionParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ConditionParseError::Empty);
    }

    let Some((index, op)) = find_operator(trimmed) else {
        return Err(ConditionParseError::MissingOperator(trimmed.to_owned()));
    };

    let lhs = trimmed[..index].trim();
    if !is_identifier_shaped(lhs) {
        return Err(ConditionParseError::InvalidLhs(lhs.to_owned()));
    }

    let literal = parse_literal(trimmed[index + op.symbol().len()..].trim())?;

    Ok(Comparison {
        lhs: lhs.to_owned(),
        op,
        literal,
    })
}

/// Syntax-only check used at set-time, so malformed conditions are
/// rejected before they are stored. Accepts everything the evaluator can
/// handle: boolean literals, hit-count shorthand, and the general
/// comparison grammar. No callback is consulted.
pub fn validate_condition(text: &str) -> Result<(), ConditionParseError> {
    let trimmed = text.trim();
    if matches!(trimmed, "true" | "false") {
        return Ok(());
    }
    parse_comparison(trimmed).map(|_| ())
}

fn find_operator(text: &str) -> Option<(usize, CompareOp)> {
    let bytes = text.as_bytes();
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'"' {
            in_string = !in_string;
            i += 1;
            continue;
        }
        if in_string {
            i += 1;
            continue;
        }
        let two_char = match (b, bytes.get(i + 1).copied()) {
            (b'=', Some(b'=')) => Some(CompareOp::Eq),
            (b'!', Some(b'=')) => Some(CompareOp::Ne),
            (b'>', Some(b'=')) => Some(CompareOp::Ge),
            (b'<', Some(b'=')) => Some(CompareOp::Le),
            _ => None,
        };
        if let Some(op) = two_char {
            return Some((i, op));
        }
        match b {
            b'>' => return Some((i, CompareOp::Gt)),
            b'<' => return Some((i, CompareOp::Lt)),
            _ => {}
        }
        i += 1;
    }
    None
}

fn is_identifier_shaped(lhs: &str) -> bool {
    lhs.chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
}

fn parse_literal(text: &str) -> Result<Literal, ConditionParseError> {
    match text {
        "" => return Err(ConditionParseError::MalformedLiteral(String::new())),
        "true" => return Ok(Literal::Bool(true)),
        "false" => return Ok(Literal::Bool(false)),
        "null" => return Ok(Literal::Null),
        _ => {}
    }
    if let Some(inner) = text.strip_prefix('"') {
        let Some(inner) = inner.strip_suffix('"') else {
            return Err(ConditionParseError::MalformedLiteral(text.to_owned()));
        };
        // The grammar has no escapes; an interior quote is malformed.
        if inner.contains('"') {
            return Err(ConditionParseError::MalformedLiteral(text.to_owned()));
        }
        return Ok(Literal::Str(inner.to_owned()));
    }
    text.parse::<i64>()
        .map(Literal::Int)
        .map_err(|_| ConditionParseError::MalformedLiteral(text.to_owned()))
}

/// Value produced by the expression-evaluation callback.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl fmt::Display for EvalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalValue::Null => f.write_str("null"),
            EvalValue::Bool(b) => write!(f, "{b}"),
            EvalValue::Int(n) => write!(f, "{n}"),
            EvalValue::Float(x) => write!(f, "{x}"),
            EvalValue::Str(s) => f.write_str(s),
        }
    }
}

/// How the evaluation callback can fail.
///
/// `Unavailable` means the debugger cannot answer right now (not stopped,
/// no frame, detached) and routes to fail-open. `Failed` is a genuine
/// evaluator error and does not: a broken evaluator must not masquerade
/// as a satisfied condition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("evaluation unavailable: {0}")]
    Unavailable(String),
    #[error("evaluation failed: {0}")]
    Failed(String),
}

/// Per-hit callback resolving debuggee expressions. Supplied by the
/// embedding layer on each handler invocation; never owned by this crate.
pub trait ExpressionEvaluator: Send + Sync {
    fn evaluate_expression(&self, expression: &str) -> Result<EvalValue, EvalError>;
}

/// Inputs a condition is evaluated against.
#[derive(Clone, Copy)]
pub struct ConditionContext<'a> {
    /// The hit count the condition is being evaluated for: the ordinal of
    /// the current hit, not the stored count before it.
    pub hit_count: u64,
    pub evaluator: Option<&'a dyn ExpressionEvaluator>,
}

impl<'a> ConditionContext<'a> {
    pub fn new(hit_count: u64) -> Self {
        Self {
            hit_count,
            evaluator: None,
        }
    }

    pub fn with_evaluator(hit_count: u64, evaluator: &'a dyn ExpressionEvaluator) -> Self {
        Self {
            hit_count,
            evaluator: Some(evaluator),
        }
    }
}

/// Outcome of a condition evaluation. `success && value` is "satisfied";
/// `success == false` carries an error and the hit path treats it as not
/// satisfied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionResult {
    pub success: bool,
    pub value: bool,
    pub error: Option<String>,
}

impl ConditionResult {
    pub fn satisfied() -> Self {
        Self {
            success: true,
            value: true,
            error: None,
        }
    }

    pub fn not_satisfied() -> Self {
        Self {
            success: true,
            value: false,
            error: None,
        }
    }

    pub fn is_satisfied(&self) -> bool {
        self.success && self.value
    }

    fn fail_open(expression: &str, reason: &str) -> Self {
        tracing::debug!(
            target = "vigil.debug",
            expression,
            reason,
            "condition unevaluable, failing open"
        );
        Self::satisfied()
    }

    fn syntax_error(err: ConditionParseError) -> Self {
        Self {
            success: false,
            value: false,
            error: Some(err.to_string()),
        }
    }

    fn hard_error(expression: &str, err: &EvalError) -> Self {
        tracing::warn!(
            target = "vigil.debug",
            expression,
            error = %err,
            "condition evaluator reported a hard failure"
        );
        Self {
            success: false,
            value: false,
            error: Some(err.to_string()),
        }
    }
}

/// Evaluates a condition against the context.
///
/// Tier 1 answers `true`/`false` and `hitCount <op> <int>` (matched
/// case-sensitively) without touching the callback. Everything else
/// parses, resolves the lhs through the callback, and compares with
/// type-appropriate semantics. An absent callback, an `Unavailable`
/// answer, or a comparison that makes no sense for the resolved value all
/// fail open; a syntax error or a `Failed` answer does not.
pub fn evaluate_condition(text: &str, ctx: &ConditionContext<'_>) -> ConditionResult {
    let trimmed = text.trim();
    match trimmed {
        "true" => return ConditionResult::satisfied(),
        "false" => return ConditionResult::not_satisfied(),
        _ => {}
    }

    let comparison = match parse_comparison(trimmed) {
        Ok(comparison) => comparison,
        Err(err) => return ConditionResult::syntax_error(err),
    };

    if comparison.lhs == "hitCount" {
        if let Literal::Int(expected) = comparison.literal {
            let actual = i64::try_from(ctx.hit_count).unwrap_or(i64::MAX);
            return if comparison.op.matches_ordering(actual.cmp(&expected)) {
                ConditionResult::satisfied()
            } else {
                ConditionResult::not_satisfied()
            };
        }
    }

    let Some(evaluator) = ctx.evaluator else {
        return ConditionResult::fail_open(&comparison.lhs, "no evaluation callback");
    };

    match evaluator.evaluate_expression(&comparison.lhs) {
        Ok(value) => match compare_value(&value, comparison.op, &comparison.literal) {
            Some(true) => ConditionResult::satisfied(),
            Some(false) => ConditionResult::not_satisfied(),
            None => ConditionResult::fail_open(
                &comparison.lhs,
                "comparison not feasible for the resolved value",
            ),
        },
        Err(EvalError::Unavailable(reason)) => ConditionResult::fail_open(&comparison.lhs, &reason),
        Err(err) => ConditionResult::hard_error(&comparison.lhs, &err),
    }
}

/// Type-appropriate comparison of a resolved value against a literal.
/// `None` means the comparison is infeasible (mismatched types, relational
/// on non-numeric values, NaN) and routes to fail-open.
fn compare_value(value: &EvalValue, op: CompareOp, literal: &Literal) -> Option<bool> {
    match literal {
        // Null identity: a value either is null or it is not.
        Literal::Null => match op {
            CompareOp::Eq => Some(matches!(value, EvalValue::Null)),
            CompareOp::Ne => Some(!matches!(value, EvalValue::Null)),
            _ => None,
        },
        Literal::Int(expected) => match value {
            EvalValue::Int(actual) => Some(op.matches_ordering(actual.cmp(expected))),
            EvalValue::Float(actual) => actual
                .partial_cmp(&(*expected as f64))
                .map(|ordering| op.matches_ordering(ordering)),
            EvalValue::Null if op.is_equality() => Some(op == CompareOp::Ne),
            _ => None,
        },
        Literal::Str(expected) => match value {
            EvalValue::Str(actual) if op.is_equality() => {
                Some(op.matches_ordering(actual.as_str().cmp(expected.as_str())))
            }
            EvalValue::Null if op.is_equality() => Some(op == CompareOp::Ne),
            _ => None,
        },
        Literal::Bool(expected) => match value {
            EvalValue::Bool(actual) => match op {
                CompareOp::Eq => Some(actual == expected),
                CompareOp::Ne => Some(actual != expected),
                _ => None,
            },
            EvalValue::Null if op.is_equality() => Some(op == CompareOp::Ne),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEvaluator;

    fn parse(text: &str) -> Comparison {
        parse_comparison(text).unwrap()
    }

    #[test]
    fn parses_every_operator() {
        for (text, op) in [
            ("x == 1", CompareOp::Eq),
            ("x != 1", CompareOp::Ne),
            ("x > 1", CompareOp::Gt),
            ("x >= 1", CompareOp::Ge),
            ("x < 1", CompareOp::Lt),
            ("x <= 1", CompareOp::Le),
        ] {
            let parsed = parse(text);
            assert_eq!(parsed.op, op, "{text}");
            assert_eq!(parsed.lhs, "x");
            assert_eq!(parsed.literal, Literal::Int(1));
        }
    }

    #[test]
    fn two_char_operators_win_over_their_prefix() {
        assert_eq!(parse("x>=3").op, CompareOp::Ge);
        assert_eq!(parse("x<=3").op, CompareOp::Le);
        assert_eq!(parse("x>3").op, CompareOp::Gt);
    }

    #[test]
    fn lhs_may_be_a_path_or_call() {
        assert_eq!(parse("user.name == \"bob\"").lhs, "user.name");
        assert_eq!(parse("items.Count > 10").lhs, "items.Count");
        assert_eq!(parse("_state != null").lhs, "_state");
        assert_eq!(parse("GetTotal() >= 100").lhs, "GetTotal()");
    }

    #[test]
    fn operator_scan_skips_quoted_spans() {
        let parsed = parse("Lookup(\"a<b\") == 3");
        assert_eq!(parsed.lhs, "Lookup(\"a<b\")");
        assert_eq!(parsed.op, CompareOp::Eq);
        assert_eq!(parsed.literal, Literal::Int(3));
    }

    #[test]
    fn parses_each_literal_kind() {
        assert_eq!(parse("x == 42").literal, Literal::Int(42));
        assert_eq!(parse("x == -7").literal, Literal::Int(-7));
        assert_eq!(
            parse("x == \"hi there\"").literal,
            Literal::Str("hi there".to_owned())
        );
        assert_eq!(parse("x == \"\"").literal, Literal::Str(String::new()));
        assert_eq!(parse("x == true").literal, Literal::Bool(true));
        assert_eq!(parse("x == false").literal, Literal::Bool(false));
        assert_eq!(parse("x == null").literal, Literal::Null);
    }

    #[test]
    fn rejects_empty_input() {
        assert_eq!(parse_comparison(""), Err(ConditionParseError::Empty));
        assert_eq!(parse_comparison("   "), Err(ConditionParseError::Empty));
    }

    #[test]
    fn rejects_missing_operator() {
        assert!(matches!(
            parse_comparison("x 5"),
            Err(ConditionParseError::MissingOperator(_))
        ));
        // A single `=` is not an operator.
        assert!(matches!(
            parse_comparison("x = 5"),
            Err(ConditionParseError::MissingOperator(_))
        ));
    }

    #[test]
    fn rejects_non_identifier_lhs() {
        assert!(matches!(
            parse_comparison("5 > 3"),
            Err(ConditionParseError::InvalidLhs(_))
        ));
        assert!(matches!(
            parse_comparison("== 5"),
            Err(ConditionParseError::InvalidLhs(_))
        ));
    }

    #[test]
    fn rejects_malformed_literals() {
        for text in [
            "x == ",
            "x == abc",
            "x == \"unterminated",
            "x == 12.5",
            "x == 'c'",
        ] {
            assert!(
                matches!(
                    parse_comparison(text),
                    Err(ConditionParseError::MalformedLiteral(_))
                ),
                "{text}"
            );
        }
    }

    #[test]
    fn validate_accepts_what_the_evaluator_handles() {
        validate_condition("true").unwrap();
        validate_condition("false").unwrap();
        validate_condition("hitCount == 3").unwrap();
        validate_condition("user.name != \"bob\"").unwrap();
    }

    #[test]
    fn validate_rejects_syntax_errors() {
        assert!(validate_condition("").is_err());
        assert!(validate_condition("x ==").is_err());
        assert!(validate_condition("1 == 1").is_err());
    }

    #[test]
    fn boolean_literals_short_circuit() {
        let ctx = ConditionContext::new(1);
        assert!(evaluate_condition("true", &ctx).is_satisfied());
        assert!(!evaluate_condition("false", &ctx).is_satisfied());
        assert!(evaluate_condition(" true ", &ctx).is_satisfied());
    }

    #[test]
    fn hit_count_shorthand_never_touches_the_callback() {
        let mock = MockEvaluator::new();
        let ctx = ConditionContext::with_evaluator(3, &mock);

        assert!(evaluate_condition("hitCount == 3", &ctx).is_satisfied());
        assert!(!evaluate_condition("hitCount > 5", &ctx).is_satisfied());
        assert!(evaluate_condition("hitCount <= 3", &ctx).is_satisfied());
        assert!(evaluate_condition("hitCount != 2", &ctx).is_satisfied());

        assert!(mock.calls().is_empty());
    }

    #[test]
    fn hit_count_matching_is_case_sensitive() {
        // `hitcount` is an ordinary expression and goes through the
        // callback like any other lhs.
        let mock = MockEvaluator::new();
        mock.set("hitcount", EvalValue::Int(9));
        let ctx = ConditionContext::with_evaluator(3, &mock);

        assert!(evaluate_condition("hitcount == 9", &ctx).is_satisfied());
        assert_eq!(mock.calls(), vec!["hitcount"]);
    }

    #[test]
    fn integer_comparisons_use_numeric_ordering() {
        let mock = MockEvaluator::new();
        mock.set("x", EvalValue::Int(5));
        let ctx = ConditionContext::with_evaluator(1, &mock);

        assert!(evaluate_condition("x == 5", &ctx).is_satisfied());
        assert!(evaluate_condition("x > 3", &ctx).is_satisfied());
        assert!(!evaluate_condition("x < 3", &ctx).is_satisfied());
        assert!(evaluate_condition("x >= 5", &ctx).is_satisfied());
        assert!(!evaluate_condition("x != 5", &ctx).is_satisfied());
    }

    #[test]
    fn float_values_compare_against_integer_literals() {
        let mock = MockEvaluator::new();
        mock.set("ratio", EvalValue::Float(2.5));
        let ctx = ConditionContext::with_evaluator(1, &mock);

        assert!(evaluate_condition("ratio > 2", &ctx).is_satisfied());
        assert!(!evaluate_condition("ratio > 3", &ctx).is_satisfied());
    }

    #[test]
    fn nan_comparisons_fail_open() {
        let mock = MockEvaluator::new();
        mock.set("bad", EvalValue::Float(f64::NAN));
        let ctx = ConditionContext::with_evaluator(1, &mock);

        let result = evaluate_condition("bad > 0", &ctx);
        assert!(result.success);
        assert!(result.value);
    }

    #[test]
    fn string_equality_is_ordinal() {
        let mock = MockEvaluator::new();
        mock.set("name", EvalValue::Str("bob".to_owned()));
        let ctx = ConditionContext::with_evaluator(1, &mock);

        assert!(evaluate_condition("name == \"bob\"", &ctx).is_satisfied());
        assert!(!evaluate_condition("name == \"Bob\"", &ctx).is_satisfied());
        assert!(evaluate_condition("name != \"alice\"", &ctx).is_satisfied());
    }

    #[test]
    fn relational_on_strings_fails_open() {
        let mock = MockEvaluator::new();
        mock.set("name", EvalValue::Str("bob".to_owned()));
        let ctx = ConditionContext::with_evaluator(1, &mock);

        let result = evaluate_condition("name > \"alice\"", &ctx);
        assert!(result.success && result.value);
    }

    #[test]
    fn boolean_values_compare_by_equality() {
        let mock = MockEvaluator::new();
        mock.set("flag", EvalValue::Bool(true));
        let ctx = ConditionContext::with_evaluator(1, &mock);

        assert!(evaluate_condition("flag == true", &ctx).is_satisfied());
        assert!(!evaluate_condition("flag != true", &ctx).is_satisfied());
        assert!(evaluate_condition("flag != false", &ctx).is_satisfied());
    }

    #[test]
    fn null_literal_is_identity() {
        let mock = MockEvaluator::new();
        mock.set("obj", EvalValue::Null);
        mock.set("name", EvalValue::Str("bob".to_owned()));
        let ctx = ConditionContext::with_evaluator(1, &mock);

        assert!(evaluate_condition("obj == null", &ctx).is_satisfied());
        assert!(!evaluate_condition("obj != null", &ctx).is_satisfied());
        assert!(!evaluate_condition("name == null", &ctx).is_satisfied());
        assert!(evaluate_condition("name != null", &ctx).is_satisfied());
    }

    #[test]
    fn null_value_against_non_null_literal_is_inequality() {
        let mock = MockEvaluator::new();
        mock.set("obj", EvalValue::Null);
        let ctx = ConditionContext::with_evaluator(1, &mock);

        assert!(!evaluate_condition("obj == 3", &ctx).is_satisfied());
        assert!(evaluate_condition("obj != 3", &ctx).is_satisfied());
        assert!(evaluate_condition("obj != \"x\"", &ctx).is_satisfied());
    }

    #[test]
    fn mismatched_types_fail_open() {
        let mock = MockEvaluator::new();
        mock.set("name", EvalValue::Str("bob".to_owned()));
        let ctx = ConditionContext::with_evaluator(1, &mock);

        let result = evaluate_condition("name == 3", &ctx);
        assert!(result.success && result.value);
    }

    #[test]
    fn missing_callback_fails_open() {
        let ctx = ConditionContext::new(1);
        let result = evaluate_condition("x == 3", &ctx);
        assert!(result.success);
        assert!(result.value);
        assert!(result.error.is_none());
    }

    #[test]
    fn unavailable_evaluation_fails_open() {
        let mock = MockEvaluator::new();
        mock.set_error(
            "x",
            EvalError::Unavailable("debuggee not stopped".to_owned()),
        );
        let ctx = ConditionContext::with_evaluator(1, &mock);

        let result = evaluate_condition("x == 3", &ctx);
        assert!(result.success);
        assert!(result.value);
    }

    #[test]
    fn hard_evaluator_failure_is_not_fail_open() {
        let mock = MockEvaluator::new();
        mock.set_error("x", EvalError::Failed("internal bug".to_owned()));
        let ctx = ConditionContext::with_evaluator(1, &mock);

        let result = evaluate_condition("x == 3", &ctx);
        assert!(!result.success);
        assert!(!result.value);
        assert!(result.error.unwrap().contains("internal bug"));
    }

    #[test]
    fn syntax_error_is_distinct_from_fail_open() {
        let ctx = ConditionContext::new(1);
        let result = evaluate_condition("!!!", &ctx);
        assert!(!result.success);
        assert!(!result.value);
        assert!(result.error.is_some());
    }
}
