#![no_main]

use libfuzzer_sys::fuzz_target;
use vigil_debug::{
    evaluate_condition, parse_comparison, ConditionContext, EvalError, EvalValue, MockEvaluator,
};

fn utf8_prefix(data: &[u8]) -> Option<&str> {
    let capped = &data[..data.len().min(4096)];
    std::str::from_utf8(capped).ok()
}

fn float_from(data: &[u8]) -> f64 {
    let mut bytes = [0u8; 8];
    for (slot, b) in bytes.iter_mut().zip(data) {
        *slot = *b;
    }
    // Arbitrary bit patterns include NaN and the infinities.
    f64::from_bits(u64::from_le_bytes(bytes))
}

// Evaluation must never panic regardless of condition text, hit count, or
// what the callback answers, and a satisfied value always comes with
// success (fail-open is success + satisfied, errors are neither).
fuzz_target!(|data: &[u8]| {
    let Some(text) = utf8_prefix(data) else {
        return;
    };
    let selector = data.first().copied().unwrap_or(0);
    let hit_count = u64::from(selector) * 31;

    let result = evaluate_condition(text, &ConditionContext::new(hit_count));
    assert!(!result.value || result.success);

    let mock = MockEvaluator::new();
    if let Ok(parsed) = parse_comparison(text) {
        let lhs = parsed.lhs.as_str();
        match selector % 6 {
            0 => mock.set(lhs, EvalValue::Int(i64::from(selector))),
            1 => mock.set(lhs, EvalValue::Float(float_from(data))),
            2 => mock.set(lhs, EvalValue::Str(text.to_owned())),
            3 => mock.set(lhs, EvalValue::Null),
            4 => mock.set_error(lhs, EvalError::Unavailable("fuzz".to_owned())),
            _ => mock.set_error(lhs, EvalError::Failed("fuzz".to_owned())),
        }
    }
    let result = evaluate_condition(text, &ConditionContext::with_evaluator(hit_count, &mock));
    assert!(!result.value || result.success);
});
