//! Fail-open / fail-closed policy table.
//!
//! The guard reads advisory state (worktree listing, session markers,
//! repo status, PR lookups) that can be missing or unknowable at any
//! moment. Every category of unknown resolves to exactly one side,
//! chosen by whether acting on the wrong guess is irreversible (fail
//! closed) or merely inconvenient (fail open):
//!
//! | signal                        | on unknown | rationale                                   |
//! |-------------------------------|------------|---------------------------------------------|
//! | worktree listing              | approve    | a missed lock/orphan check is recoverable   |
//! | session marker read error     | block      | deleting a live session's tree is not       |
//! | tree state (dirty/stash/log)  | approve    | worst case is a lost warning                |
//! | PR branch lookup              | approve    | the host re-validates at merge time         |
//!
//! A timed-out subprocess is "unknown" and routes through the same row
//! as a failed call of its category, never as a confirmed negative.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnUnknown {
    Approve,
    Block,
}

pub const REGISTRY_LISTING: OnUnknown = OnUnknown::Approve;
pub const MARKER_READ: OnUnknown = OnUnknown::Block;
pub const TREE_STATE: OnUnknown = OnUnknown::Approve;
pub const PR_LOOKUP: OnUnknown = OnUnknown::Approve;
