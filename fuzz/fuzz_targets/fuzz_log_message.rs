#![no_main]

use libfuzzer_sys::fuzz_target;
use vigil_debug::{render_log_message, ConditionContext, EvalValue, MockEvaluator};

fn utf8_prefix(data: &[u8]) -> Option<&str> {
    let capped = &data[..data.len().min(4096)];
    std::str::from_utf8(capped).ok()
}

// Rendering must never panic on any template; a template with no spans
// passes through untouched.
fuzz_target!(|data: &[u8]| {
    let Some(template) = utf8_prefix(data) else {
        return;
    };

    let rendered = render_log_message(template, &ConditionContext::new(1));
    if !template.contains('{') {
        assert_eq!(rendered, template);
    }

    let mock = MockEvaluator::new();
    mock.set("x", EvalValue::Int(1));
    let _ = render_log_message(template, &ConditionContext::with_evaluator(1, &mock));
});
