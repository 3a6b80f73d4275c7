//! Quench Invalidator - Dual-Channel Cache Invalidation
//!
//! Two long-running consumers converge on the same effect, deleting the
//! primary collection key, from two independent channels:
//!
//! - the change-log invalidator tails a durable, ordered, replayable event
//!   feed of row-level mutations;
//! - the broadcast invalidator receives administrative purge commands over
//!   a fanout channel with no persistence or replay.
//!
//! Neither channel knows about the other; both deletes are idempotent, so
//! duplicate or unordered delivery across channels is harmless. Each
//! consumer is an explicit task owning its feed, shut down through a watch
//! channel, with a shared bounded-retry bootstrapper for the initial
//! transport connection.

pub mod bootstrap;
pub mod broadcast;
pub mod changelog;
pub mod transport;

pub use bootstrap::{establish, BootstrapError, Connect, ConnectError, RetryPolicy};
pub use broadcast::{broadcast_task, BroadcastConfig, BroadcastMetrics};
pub use changelog::{change_log_task, ChangeLogConfig, ChangeLogMetrics};
pub use transport::{BroadcastHub, EventFeed, FeedError, HubError, PurgeFeed};
