// ── Property storage ──
//
// Per-unit property cache and the change sets that update it.

mod cache;
mod change_set;

pub use cache::PropertyCache;
pub use change_set::ChangeSet;
