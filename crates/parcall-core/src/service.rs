//! The coordinator loop
//!
//! [`ParallelCallService::start`] moves a [`ParallelCallCoordinator`] into a
//! dedicated tokio task that drains a single unbounded mailbox. Operator
//! commands, call engine events and deferred release tickets all travel
//! through that mailbox, so the order they are dequeued in is the one order
//! every decision is made in. Each dequeued message is one loop turn.
//!
//! ```text
//!   ParallelCallHandle ──Command──┐
//!   CallEventSink ───────Event────┼──► mailbox ──► coordinator task
//!   DeferredReclaimer ──Reclaim───┘
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, debug_span, info, Instrument};

use crate::config::{MediaDefaults, ParCallConfig};
use crate::control::CallControl;
use crate::coordinator::ParallelCallCoordinator;
use crate::dispatcher::DispatchReport;
use crate::dump::DebugDump;
use crate::error::{ParCallError, ParCallResult};
use crate::events::ParCallEvent;
use crate::identity::IdentityDirectory;
use crate::reclaim::ReleaseTicket;
use crate::types::{CallEvent, CallId, GroupId, MediaDirection};

type Reply<T> = oneshot::Sender<ParCallResult<T>>;

/// Operator requests handled by the loop
#[derive(Debug)]
pub enum Command {
    CreateGroup {
        name: String,
        reply: Reply<GroupId>,
    },
    RemoveGroup {
        name: String,
        reply: Reply<()>,
    },
    ClearGroups {
        reply: oneshot::Sender<usize>,
    },
    AddPeer {
        group: String,
        address: String,
        display_name: Option<String>,
        reply: Reply<String>,
    },
    StartParallelCall {
        group: String,
        audio: MediaDirection,
        video: MediaDirection,
        reply: Reply<DispatchReport>,
    },
    HangupGroup {
        name: String,
        reply: Reply<usize>,
    },
    DebugDump {
        reply: oneshot::Sender<DebugDump>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Everything that can occupy one turn of the loop
#[derive(Debug)]
pub enum LoopMessage {
    Command(Command),
    Event(CallEvent),
    Reclaim(ReleaseTicket),
}

impl From<ReleaseTicket> for LoopMessage {
    fn from(ticket: ReleaseTicket) -> Self {
        LoopMessage::Reclaim(ticket)
    }
}

/// Entry point for the call engine's event stream
#[derive(Debug, Clone)]
pub struct CallEventSink {
    tx: mpsc::UnboundedSender<LoopMessage>,
}

impl CallEventSink {
    /// Queue an event behind everything already in the mailbox
    pub fn post(&self, event: CallEvent) -> ParCallResult<()> {
        self.tx
            .send(LoopMessage::Event(event))
            .map_err(|_| ParCallError::ServiceStopped)
    }

    pub fn established(&self, call_id: impl Into<CallId>) -> ParCallResult<()> {
        self.post(CallEvent::established(call_id))
    }

    pub fn closed(&self, call_id: impl Into<CallId>, reason: Option<&str>) -> ParCallResult<()> {
        self.post(CallEvent::closed(call_id, reason))
    }
}

/// Spawns the coordinator loop
pub struct ParallelCallService;

impl ParallelCallService {
    /// Validate `config`, build the coordinator and run it on its own task
    pub fn start(
        config: ParCallConfig,
        control: Arc<dyn CallControl>,
        identities: Arc<dyn IdentityDirectory>,
    ) -> ParCallResult<ParallelCallHandle> {
        let (tx, rx) = mpsc::unbounded_channel::<LoopMessage>();
        let media = config.media;

        // The loop must not keep its own mailbox open
        let scheduler = Box::new(tx.downgrade());
        let coordinator = ParallelCallCoordinator::new(config, control, identities, scheduler)?;
        let events = coordinator.events().clone();

        tokio::spawn(run_loop(coordinator, rx));
        info!("✅ Parallel call service started");

        Ok(ParallelCallHandle { tx, events, media })
    }
}

async fn run_loop(
    mut coordinator: ParallelCallCoordinator,
    mut rx: mpsc::UnboundedReceiver<LoopMessage>,
) {
    while let Some(message) = rx.recv().await {
        let turn = coordinator.begin_turn();
        match message {
            LoopMessage::Command(Command::Shutdown { reply }) => {
                rx.close();
                coordinator.shutdown();
                let _ = reply.send(());
                return;
            }
            LoopMessage::Command(command) => {
                handle_command(&mut coordinator, command)
                    .instrument(debug_span!("parcall", turn))
                    .await
            }
            LoopMessage::Event(event) => {
                debug!("Turn {}: {:?}", turn, event);
                coordinator
                    .handle_call_event(event)
                    .instrument(debug_span!("parcall", turn))
                    .await;
            }
            LoopMessage::Reclaim(ticket) => {
                coordinator.reclaim(ticket);
            }
        }
    }

    // Every handle and sink is gone
    coordinator.shutdown();
}

async fn handle_command(coordinator: &mut ParallelCallCoordinator, command: Command) {
    // A dropped reply receiver means the caller stopped waiting
    match command {
        Command::CreateGroup { name, reply } => {
            let _ = reply.send(coordinator.create_group(&name));
        }
        Command::RemoveGroup { name, reply } => {
            let _ = reply.send(coordinator.remove_group(&name));
        }
        Command::ClearGroups { reply } => {
            let _ = reply.send(coordinator.clear_groups());
        }
        Command::AddPeer {
            group,
            address,
            display_name,
            reply,
        } => {
            let _ = reply.send(coordinator.add_peer(&group, &address, display_name.as_deref()));
        }
        Command::StartParallelCall {
            group,
            audio,
            video,
            reply,
        } => {
            let _ = reply.send(coordinator.start_parallel_call(&group, audio, video).await);
        }
        Command::HangupGroup { name, reply } => {
            let _ = reply.send(coordinator.hangup_group(&name).await);
        }
        Command::DebugDump { reply } => {
            let _ = reply.send(coordinator.debug_dump());
        }
        Command::Shutdown { reply } => {
            let _ = reply.send(());
        }
    }
}

/// Cloneable client of a running coordinator loop
#[derive(Debug, Clone)]
pub struct ParallelCallHandle {
    tx: mpsc::UnboundedSender<LoopMessage>,
    events: crate::events::EventPublisher,
    media: MediaDefaults,
}

impl ParallelCallHandle {
    async fn request<T>(&self, command: Command, rx: oneshot::Receiver<T>) -> ParCallResult<T> {
        self.tx
            .send(LoopMessage::Command(command))
            .map_err(|_| ParCallError::ServiceStopped)?;
        rx.await.map_err(|_| ParCallError::ServiceStopped)
    }

    pub async fn create_group(&self, name: &str) -> ParCallResult<GroupId> {
        let (reply, rx) = oneshot::channel();
        let name = name.to_string();
        self.request(Command::CreateGroup { name, reply }, rx).await?
    }

    pub async fn remove_group(&self, name: &str) -> ParCallResult<()> {
        let (reply, rx) = oneshot::channel();
        let name = name.to_string();
        self.request(Command::RemoveGroup { name, reply }, rx).await?
    }

    /// Remove every group, returning how many there were
    pub async fn clear_groups(&self) -> ParCallResult<usize> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::ClearGroups { reply }, rx).await
    }

    /// Add a peer, returning its canonical target
    pub async fn add_peer(
        &self,
        group: &str,
        address: &str,
        display_name: Option<&str>,
    ) -> ParCallResult<String> {
        let (reply, rx) = oneshot::channel();
        let command = Command::AddPeer {
            group: group.to_string(),
            address: address.to_string(),
            display_name: display_name.map(str::to_string),
            reply,
        };
        self.request(command, rx).await?
    }

    pub async fn start_parallel_call(
        &self,
        group: &str,
        audio: MediaDirection,
        video: MediaDirection,
    ) -> ParCallResult<DispatchReport> {
        let (reply, rx) = oneshot::channel();
        let command = Command::StartParallelCall {
            group: group.to_string(),
            audio,
            video,
            reply,
        };
        self.request(command, rx).await?
    }

    /// Hang up the live calls of a group, returning how many were hung up
    pub async fn hangup_group(&self, name: &str) -> ParCallResult<usize> {
        let (reply, rx) = oneshot::channel();
        let name = name.to_string();
        self.request(Command::HangupGroup { name, reply }, rx).await?
    }

    pub async fn debug_dump(&self) -> ParCallResult<DebugDump> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::DebugDump { reply }, rx).await
    }

    /// Stop the loop. Groups, records and pending releases are dropped.
    pub async fn shutdown(&self) -> ParCallResult<()> {
        let (reply, rx) = oneshot::channel();
        self.request(Command::Shutdown { reply }, rx).await?;
        info!("🛑 Parallel call service stopped");
        Ok(())
    }

    /// Media directions used when a request leaves them out
    pub fn media_defaults(&self) -> MediaDefaults {
        self.media
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ParCallEvent> {
        self.events.subscribe()
    }

    /// Sink the call engine posts `Established` / `Closed` events into
    pub fn call_events(&self) -> CallEventSink {
        CallEventSink {
            tx: self.tx.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        !self.tx.is_closed()
    }
}
