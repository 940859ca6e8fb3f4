//! # Parallel Call Groups for rvoip
//!
//! This crate dials a named group of SIP targets at the same time and keeps
//! the first call that is answered. Every other call of the group is hung up
//! as soon as the winner is established.
//!
//! - **Groups**: named sets of dial targets, managed at runtime
//! - **Dispatcher**: one outbound call per peer; unreachable peers are skipped
//! - **Race resolver**: first `Established` event of a group wins
//! - **Deferred reclaimer**: superseded call records are released on a later
//!   loop turn, never inside the event handler that superseded them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rvoip_parcall_core::prelude::*;
//! use rvoip_parcall_core::testing::RecordingCallControl;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ParCallConfig::new().with_account("sip:alice@example.com");
//!     let identities = Arc::new(config.account_table()?);
//!     let control = Arc::new(RecordingCallControl::new());
//!
//!     let parcall = ParallelCallService::start(config, control, identities)?;
//!     parcall.create_group("sales").await?;
//!     parcall.add_peer("sales", "bob", None).await?;
//!     parcall.add_peer("sales", "sip:carol@example.com", Some("Carol")).await?;
//!
//!     let report = parcall
//!         .start_parallel_call("sales", MediaDirection::SendRecv, MediaDirection::Inactive)
//!         .await?;
//!     println!("{} calls placed", report.placed_count());
//!
//!     // The call engine reports answers through the event sink
//!     parcall.call_events().established(report.placed[0].call_id.clone())?;
//!
//!     parcall.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! All state is owned by a [`ParallelCallCoordinator`] running on a single
//! tokio task. Commands from [`ParallelCallHandle`], call events from the
//! engine and deferred release tickets share one mailbox, so they are handled
//! strictly in arrival order. The call engine itself sits behind the
//! [`CallControl`] trait; local accounts behind [`IdentityDirectory`].

pub mod commands;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod dispatcher;
pub mod dump;
pub mod error;
pub mod events;
pub mod group;
pub mod identity;
pub mod reclaim;
pub mod records;
pub mod resolver;
pub mod service;
pub mod testing;
pub mod types;

// Re-export main types
pub use commands::{CommandOutcome, ParCommand};
pub use config::{HangupPolicy, MediaDefaults, ParCallConfig};
pub use control::{CallControl, CallHandle};
pub use coordinator::ParallelCallCoordinator;
pub use dispatcher::{DispatchReport, PlacedCall};
pub use dump::DebugDump;
pub use error::{CallControlError, ParCallError, ParCallResult};
pub use events::ParCallEvent;
pub use identity::{AccountTable, IdentityDirectory, LocalIdentity};
pub use resolver::Resolution;
pub use service::{CallEventSink, ParallelCallHandle, ParallelCallService};
pub use types::{CallEvent, CallId, GroupId, MediaDirection};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commonly used types
pub mod prelude {
    pub use crate::commands::{CommandOutcome, ParCommand};
    pub use crate::config::ParCallConfig;
    pub use crate::control::{CallControl, CallHandle};
    pub use crate::error::{CallControlError, ParCallError, ParCallResult};
    pub use crate::events::ParCallEvent;
    pub use crate::identity::{AccountTable, IdentityDirectory, LocalIdentity};
    pub use crate::service::{CallEventSink, ParallelCallHandle, ParallelCallService};
    pub use crate::types::{CallEvent, CallId, MediaDirection};
}
