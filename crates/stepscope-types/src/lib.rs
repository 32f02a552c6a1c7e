pub mod entry;
pub mod error;
pub mod trace;
pub mod usage;
mod util;

pub use entry::*;
pub use error::{Error, Result};
pub use trace::*;
pub use usage::TokenUsage;
pub use util::*;
