mod read;
mod tail;
mod types;
mod write;

pub use tail::{QueryTail, build_tail};

use super::PostgresRepositories;
