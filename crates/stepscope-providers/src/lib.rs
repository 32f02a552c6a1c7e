// Error types
pub mod error;

// Session log format
pub mod claude;

pub use claude::{
    default_subagents_dir, discover_subagent_files, load_subagent_logs, parse_session_file,
    parse_session_reader, parse_session_str, process_id_from_path, ParsedLog, SubagentSource,
};

// Error types
pub use error::{Error, Result};
