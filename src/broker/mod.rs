//! broker
//!
//! The broker owns all shared event-routing state and the operations on it:
//! - `registry`: authenticated connections and their subjects
//! - `topic`: chat id → subscriber set, with empty topics garbage-collected
//! - `engine`: the process-scoped `Broker` and its lifecycle cleanup
//! - `dispatcher`: `Broker::publish`, the parallel event fan-out
//! - `event`: the event payloads upstream code publishes
//!
//! The transport layer drives it on behalf of clients; upstream application
//! code only ever calls `publish`.

pub mod dispatcher;
pub mod engine;
pub mod event;
pub mod fanout;
pub mod registry;
pub mod topic;

pub use dispatcher::PublishReport;
pub use engine::Broker;
pub use event::{Event, MessagesDeleted, NewMessage};
pub use topic::ChatId;
