//! Judge Invoker Library
//!
//! The invoker side of the judge: a size-bounded LRU cache of artifacts
//! fetched from storage, epoch fencing of cached state, the set of jobs the
//! master has assigned, and the JSON RPC handler the master talks to.

pub mod cache;
pub mod config;
pub mod epoch;
pub mod handlers;
pub mod invoker;
pub mod jobs;
pub mod logging;
pub mod metrics;
pub mod rpc;
pub mod storage;

pub use cache::{CacheEntry, CacheKey, CacheLoader, CacheStats, Loaded, LruSizeCache};
pub use config::{ConfigError, InvokerConfig};
pub use epoch::EpochHolder;
pub use invoker::Invoker;
pub use jobs::{Admission, JobError, JobRegistry};
pub use rpc::RpcHandler;
pub use storage::{FetchError, FsStorage, InvokerStorage, ResourceFetcher, StorageConnector};
