//! Log-message templating for tracepoints.
//!
//! Templates are literal text with `{expression}` spans. Each span is
//! resolved through the evaluation callback; a span that cannot be
//! resolved renders as an inline error marker so one bad expression never
//! suppresses the rest of the message.

use crate::condition::ConditionContext;

/// Renders a tracepoint template. Unmatched braces and empty spans pass
/// through as literal text.
pub fn render_log_message(template: &str, ctx: &ConditionContext<'_>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            // No closing brace: the remainder is literal.
            out.push_str(&rest[open..]);
            return out;
        };
        let expression = after[..close].trim();
        if expression.is_empty() {
            out.push_str(&rest[open..open + close + 2]);
        } else {
            out.push_str(&resolve_span(expression, ctx));
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

fn resolve_span(expression: &str, ctx: &ConditionContext<'_>) -> String {
    let Some(evaluator) = ctx.evaluator else {
        return "<error: no evaluator>".to_owned();
    };
    match evaluator.evaluate_expression(expression) {
        Ok(value) => value.to_string(),
        Err(err) => format!("<error: {err}>"),
    }
}
