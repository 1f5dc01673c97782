//! Filesystem observation: path filtering, typed events, the notify
//! bridge, event dispatch, and the reconciliation scanner.

mod dispatcher;
mod events;
mod filter;
mod scanner;
#[allow(clippy::module_inception)]
mod watcher;

pub use dispatcher::{DispatchStats, DispatchStatsSnapshot, EventDispatcher};
pub use events::FsEvent;
pub use filter::{FilterRules, PathFilter};
pub use scanner::{scan, ScanStats, ScanStatsSnapshot};
pub use watcher::DirectoryWatcher;
