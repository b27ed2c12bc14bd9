//! # Quire - a client for the Quire content API
//!
//! Quire exposes projects, sessions and session search through a typed,
//! async interface built on `reqwest`. Every call goes through one request
//! executor that bounds attempts with a timeout, retries transient failures
//! with exponential backoff, classifies failures into a closed error
//! taxonomy, revalidates cached reads with ETags and merges concurrent
//! identical `GET`s.
//!
//! ## Quick Start
//!
//! ```no_run
//! use quire::resources::{CreateSession, SearchSessionsInput};
//! use quire::Client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), quire::Error> {
//!     // Reads QUIRE_API_KEY (and QUIRE_BASE_URL, if set) from the environment.
//!     let client = Client::builder()
//!         .timeout(Duration::from_secs(10))
//!         .build()?;
//!
//!     let session = client
//!         .sessions()
//!         .create(
//!             &CreateSession {
//!                 project_id: "p_1".to_string(),
//!                 title: "Weekly sync".to_string(),
//!                 content: None,
//!             },
//!             Some("create-weekly-sync-2026-10-16"),
//!         )
//!         .await?;
//!
//!     // Served from the cache when the server answers 304.
//!     if let Some(current) = client.sessions().get(&session.id, None).await? {
//!         println!("{} (etag {:?})", current.data.title, current.etag);
//!     }
//!
//!     let results = client
//!         .search()
//!         .search_sessions(&SearchSessionsInput::new("sync"))
//!         .await?;
//!     println!("{} matching sessions", results.total);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Every failure is an [`Error`] with a closed [`ErrorKind`]:
//!
//! ```no_run
//! use quire::{Client, ErrorKind};
//!
//! # async fn example(client: Client) {
//! match client.projects().get("p_1").await {
//!     Ok(project) => println!("{}", project.name),
//!     Err(err) => match err.kind() {
//!         ErrorKind::NotFound => println!("no such project"),
//!         ErrorKind::RateLimit { retry_after } => println!("throttled until {:?}", retry_after),
//!         _ => eprintln!("{} ({}): {}", err.code(), err, err.suggestion()),
//!     },
//! }
//! # }
//! ```
//!
//! ## Retries
//!
//! Idempotent methods (`GET`, `PUT`, `DELETE`, `HEAD`) are retried on 408,
//! 429 and 5xx gateway statuses and on transport failures. A `POST` is only
//! retried on 5xx when it carries an idempotency key. `PATCH` is never
//! retried.
//!
//! ```
//! use quire::Backoff;
//! use std::time::Duration;
//!
//! let backoff = Backoff::default().without_jitter();
//! assert_eq!(backoff.delay(0), Duration::from_millis(200));
//! assert_eq!(backoff.delay(3), Duration::from_millis(1600));
//! ```

pub mod cache;
pub mod classify;
mod client;
pub mod conditional;
pub mod config;
pub mod dedup;
mod error;
pub mod graphql;
pub mod observer;
mod request;
pub mod resources;
mod response;
pub mod retry;

pub use classify::classify;
pub use client::{Client, ClientBuilder};
pub use config::{CacheConfig, DebugConfig};
pub use error::{ContextRecord, Error, ErrorContext, ErrorKind, ErrorRecord, Result};
pub use request::RequestDescriptor;
pub use response::{HeadInfo, Response};
pub use retry::Backoff;
