use std::collections::HashMap;

use stepscope_types::{SemanticStep, StepScope};

/// Write the running context total onto each step, in sequence order.
///
/// Each step adds its originating entry's context tokens (input plus both
/// cache buckets). The main scope starts from zero. A nested scope starts
/// from `baseline` at its first step and keeps its own total, so the main
/// total resumes untouched after a nested run.
pub fn accumulate(steps: &mut [SemanticStep], baseline: u64) {
    let mut totals: HashMap<StepScope, u64> = HashMap::new();

    for step in steps.iter_mut() {
        let total = totals.entry(step.scope.clone()).or_insert(match step.scope {
            StepScope::Main => 0,
            StepScope::Subagent { .. } => baseline,
        });
        *total = total.saturating_add(step.context_tokens());
        step.accumulated_context = *total;
    }
}
