//! sqlbridge engine - the data-access layer behind the database client UI
//!
//! - [`StreamingExecutor`] streams one query in batches with backpressure,
//!   a hard timeout and cooperative cancellation
//! - [`MetadataIntrospector`] reads the catalog, caching table lists in a
//!   [`TableListCache`]
//! - [`DataEngine`] ties those to the migration generators and tracks
//!   running streams by session id
//! - [`bridge::serve`] speaks newline-delimited JSON for the `sqlbridge`
//!   binary

pub mod bridge;
mod cache;
mod cancel;
mod config;
mod engine;
mod events;
mod executor;
mod introspector;
pub mod logging;
mod params;
mod session;

pub use cache::TableListCache;
pub use cancel::CancelHandle;
pub use config::EngineConfig;
pub use engine::{BaselineMigration, ConnectionTestResult, DataEngine};
pub use events::{ChannelEventSink, EngineEvent, EventBatchSink, EventSink};
pub use executor::{BatchSink, ExecutorOptions, StreamHandle, StreamSummary, StreamingExecutor};
pub use introspector::MetadataIntrospector;
pub use params::{AlterTableParams, BaselineParams, CreateTableParams, DropTableParams};
pub use session::{SessionState, StreamSession};
