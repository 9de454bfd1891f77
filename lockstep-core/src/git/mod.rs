//! Low-level, read-only `git2` helpers. These back [`crate::gateway::Git2Gateway`]'s
//! non-mutating operations; mutating sequencing lives in `gateway.rs` itself,
//! shelled out to the `git` binary.

pub mod branches;

pub use branches::checkout_branch;
