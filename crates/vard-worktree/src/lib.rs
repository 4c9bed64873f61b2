pub mod gh;
pub mod git;
pub mod marker;
pub mod proc;
pub mod registry;

pub use gh::GhRemote;
pub use git::GitRegistry;
pub use marker::SessionMarker;
pub use proc::SubprocessError;
pub use registry::{PrRemote, TreeState, Worktree, WorktreeRegistry};
