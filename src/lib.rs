//! # Procwatch
//!
//! Procwatch keeps a live, incrementally updated view of the processes running
//! on a set of remote repositories. It is UI independent: consumers read an
//! indexed tree and follow a stream of fine-grained change events.
//!
//! ## Core Features
//!
//! - **Polling Reconciliation**: Every observed repository is polled on a fixed period and its cached process list is updated in place
//! - **Stable Ordering**: Processes are kept newest first, so insert positions stay meaningful to consumers
//! - **Change Events**: Inserted, removed, changed and structure-changed notifications over a broadcast channel
//! - **Tree Projection**: Root, repositories, processes, stack frames and outputs exposed through index-based accessors
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use procwatch::{ChannelEvent, ChannelOptions, EngineBuilder};
//!
//! let engine = EngineBuilder::new().build()?;
//! engine.launch();
//!
//! engine.add_repository(repository);
//! engine.observe("production");
//!
//! ChannelEvent::channel(engine.channel(), ChannelOptions::with_repository("production"))?.on_inserted(|e| {
//!     println!("inserted {:?}", e.event);
//! });
//! ```

mod builder;
mod cache;
mod common;
mod config;
mod engine;
mod error;
mod events;
pub mod logging;
mod model;
mod runtime;
mod service;
mod tree;
mod utils;

use std::sync::Arc;

use parking_lot::RwLock;

pub use builder::EngineBuilder;
pub use cache::{ProcessListCache, ProcessListState};
pub use common::Queue;
pub use config::{Config, LoggingConfig};
pub use engine::Engine;
pub use error::{ProcwatchError, ServiceError};
pub use events::{Event, Message, TreeEvent, TreePath};
pub use model::*;
pub use runtime::{Channel, ChannelEvent, ChannelOptions};
pub use service::{ProcessService, Repository, RepositoryEvent};
pub use tree::{Placeholder, ProcessTree, TreeNode};

/// Result type alias for Procwatch operations.
pub type Result<T> = std::result::Result<T, ProcwatchError>;

/// Thread-safe shared lock wrapper using Arc<RwLock<T>>.
pub(crate) type ShareLock<T> = Arc<RwLock<T>>;
