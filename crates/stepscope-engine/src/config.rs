use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which subagent linkage strategy the resolver uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkageKind {
    /// i-th process (by start time) pairs with the i-th spawn (by arrival).
    #[default]
    Positional,
    /// Match on the agent id announced by the spawn result, positional for the rest.
    Reference,
}

impl FromStr for LinkageKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positional" => Ok(LinkageKind::Positional),
            "reference" => Ok(LinkageKind::Reference),
            _ => Err(format!("Unknown linkage strategy: {}", s)),
        }
    }
}

impl fmt::Display for LinkageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkageKind::Positional => write!(f, "positional"),
            LinkageKind::Reference => write!(f, "reference"),
        }
    }
}

/// Tunables for one reconstruction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Max distance from a group's anchor start for a process to join it.
    pub parallel_window_ms: i64,
    /// Tool names whose invocations spawn a subagent process.
    pub spawn_tool_names: Vec<String>,
    /// First-entry content of the warm-up process that must never surface.
    pub warmup_sentinel: String,
    pub linkage: LinkageKind,
    /// Accumulated context value a nested step sequence starts from.
    pub context_baseline: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallel_window_ms: 100,
            spawn_tool_names: vec!["Task".to_string(), "Agent".to_string()],
            warmup_sentinel: "Warmup".to_string(),
            linkage: LinkageKind::default(),
            context_baseline: 0,
        }
    }
}

impl EngineConfig {
    pub fn is_spawn_tool(&self, name: &str) -> bool {
        self.spawn_tool_names.iter().any(|n| n == name)
    }
}
