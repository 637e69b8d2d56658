//! # taskrunner
//!
//! A minimal in-process task queue: enqueue deferred async actions and run them
//! strictly one at a time, in FIFO order.
//!
//! ## Quick Start
//!
//! ```rust
//! use taskrunner::TaskQueue;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), taskrunner::TaskError> {
//!     let queue = TaskQueue::new();
//!     queue.enqueue(|| async {
//!         tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!         println!("first, even though it is slow");
//!         Ok(())
//!     });
//!     queue.enqueue(|| async {
//!         println!("second");
//!         Ok(())
//!     });
//!
//!     assert_eq!(queue.run_once().await?, 2);
//!     assert!(queue.is_empty());
//!     Ok(())
//! }
//! ```
//!
//! See [`queue`] for continuous mode and failure semantics, and [`config`] for
//! the settings a queue can be built with.

pub mod config;
pub mod queue;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use config::{ConfigError, QueueConfig};
pub use queue::{Action, ActionFuture, TaskError, TaskQueue};
