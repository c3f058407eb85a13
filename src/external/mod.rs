//! External tool abstractions
//!
//! This module provides trait-based abstractions for subprocess tools (git
//! and the project's test/build commands), enabling testable code through
//! dependency injection and mock implementations. Pure output parsing lives
//! beside the clients so format assumptions stay unit-tested.

pub mod command;
pub mod diff;
pub mod git;

pub use command::{CommandError, CommandExecutor, CommandOutput, ExecOptions, ProcessCommandExecutor};
pub use git::{GitClient, GitError, GrepMatch, WorktreeEntry};
