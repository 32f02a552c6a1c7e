//! Reader for the agent's session log format (JSONL, one record per line).

pub mod discovery;
pub mod io;
mod mapper;
mod schema;

pub use self::discovery::{
    default_subagents_dir, discover_subagent_files, load_subagent_logs, process_id_from_path,
    SubagentSource,
};
pub use self::io::{parse_session_file, parse_session_reader, parse_session_str, ParsedLog};
