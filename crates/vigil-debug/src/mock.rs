//! Scriptable expression evaluator for tests.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::condition::{EvalError, EvalValue, ExpressionEvaluator};

/// Evaluator whose answers are scripted per expression. Unscripted
/// expressions report `Unavailable`, which the condition policy fails
/// open on. Every call is recorded in order.
#[derive(Default)]
pub struct MockEvaluator {
    results: Mutex<HashMap<String, Result<EvalValue, EvalError>>>,
    calls: Mutex<Vec<String>>,
}

impl MockEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, expression: impl Into<String>, value: EvalValue) {
        self.results.lock().insert(expression.into(), Ok(value));
    }

    pub fn set_error(&self, expression: impl Into<String>, error: EvalError) {
        self.results.lock().insert(expression.into(), Err(error));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl ExpressionEvaluator for MockEvaluator {
    fn evaluate_expression(&self, expression: &str) -> Result<EvalValue, EvalError> {
        self.calls.lock().push(expression.to_owned());
        self.results
            .lock()
            .get(expression)
            .cloned()
            .unwrap_or_else(|| {
                Err(EvalError::Unavailable(format!(
                    "no value scripted for `{expression}`"
                )))
            })
    }
}
