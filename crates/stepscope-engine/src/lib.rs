// Engine - reconstructs an execution trace from parsed log entries
// Sits between the normalized entries (types/providers) and CLI presentation

mod assembler;
pub mod classify;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod linkage;
pub mod metrics;
pub mod parallel;
pub mod segment;
pub mod steps;
pub mod subagent;

pub use assembler::{reconstruct, SessionInput};
pub use classify::{classify, is_interruption, is_trigger};
pub use config::{EngineConfig, LinkageKind};
pub use context::accumulate;
pub use diagnostics::{
    categorize_error, extract_tool_errors, summarize_errors, CategorySummary, ErrorCategory,
    ErrorExample, ErrorSummary, ToolErrorRecord,
};
pub use linkage::link_tool_executions;
pub use parallel::{detect_parallel_groups, group_by_anchor};
pub use segment::{build_segments, Segmentation};
pub use steps::{process_steps, segment_steps, StepExtractor};
pub use subagent::{
    collect_spawn_invocations, linker_for, resolve_subagents, PositionalLinker, ReferenceLinker,
    Resolution, SpawnInvocation, SubagentLinker,
};
