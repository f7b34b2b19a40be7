//! Real-timer adapter around the coordinator.
//!
//! The coordinator itself is a plain state machine driven by
//! `advance(now)`. This runtime gives it a production heartbeat: one tokio
//! task owns the coordinator and multiplexes interval ticks with an mpsc
//! command channel, so every mutation still happens on a single execution
//! context. Command results come back through oneshot replies.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::debug;

use swarmbus_protocol::{
    AgentProfile, CommunicationNode, Message, MessagePriority, NodeId, TaskDefinition,
    VoteDecision,
};
use swarmbus_routing::Transport;

use crate::coordinator::{QueueStatus, SwarmCoordinator};
use crate::error::CoordinatorError;

type Reply<T> = oneshot::Sender<T>;

pub enum Command {
    SubmitTask {
        task: TaskDefinition,
        reply: Reply<String>,
    },
    RegisterAgent {
        profile: AgentProfile,
    },
    RegisterNode {
        node: CommunicationNode,
    },
    Broadcast {
        payload: serde_json::Value,
        priority: MessagePriority,
        reply: Reply<Result<String, CoordinatorError>>,
    },
    Multicast {
        payload: serde_json::Value,
        recipients: Vec<NodeId>,
        priority: MessagePriority,
        reply: Reply<Result<String, CoordinatorError>>,
    },
    Unicast {
        payload: serde_json::Value,
        recipient: NodeId,
        priority: MessagePriority,
        reply: Reply<Result<String, CoordinatorError>>,
    },
    StartGossip {
        key: String,
        data: serde_json::Value,
    },
    InitiateConsensus {
        kind: String,
        value: serde_json::Value,
        participants: Option<Vec<NodeId>>,
        reply: Reply<Result<String, CoordinatorError>>,
    },
    Vote {
        proposal_id: String,
        decision: VoteDecision,
        reasoning: Option<String>,
        reply: Reply<Result<(), CoordinatorError>>,
    },
    CancelTask {
        task_id: String,
        reason: String,
        reply: Reply<bool>,
    },
    ReassignTask {
        task_id: String,
        reason: String,
        reply: Reply<bool>,
    },
    Receive {
        message: Message,
    },
    ReportProgress {
        task_id: String,
        progress: f64,
    },
    CompleteTask {
        task_id: String,
    },
    FailTask {
        task_id: String,
        reason: String,
    },
    QueueStatus {
        reply: Reply<QueueStatus>,
    },
    Shutdown,
}

/// Cloneable handle for submitting commands to a running swarm.
#[derive(Clone)]
pub struct CommandHandle {
    tx: mpsc::Sender<Command>,
}

impl CommandHandle {
    async fn send(&self, command: Command) -> Result<(), CoordinatorError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)
    }

    async fn request<R>(
        &self,
        build: impl FnOnce(Reply<R>) -> Command,
    ) -> Result<R, CoordinatorError> {
        let (reply, rx) = oneshot::channel();
        self.send(build(reply)).await?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }

    pub async fn submit_task(&self, task: TaskDefinition) -> Result<String, CoordinatorError> {
        self.request(|reply| Command::SubmitTask { task, reply }).await
    }

    pub async fn register_agent(&self, profile: AgentProfile) -> Result<(), CoordinatorError> {
        self.send(Command::RegisterAgent { profile }).await
    }

    pub async fn register_node(&self, node: CommunicationNode) -> Result<(), CoordinatorError> {
        self.send(Command::RegisterNode { node }).await
    }

    pub async fn broadcast(
        &self,
        payload: serde_json::Value,
        priority: MessagePriority,
    ) -> Result<String, CoordinatorError> {
        self.request(|reply| Command::Broadcast { payload, priority, reply })
            .await?
    }

    pub async fn unicast(
        &self,
        payload: serde_json::Value,
        recipient: NodeId,
        priority: MessagePriority,
    ) -> Result<String, CoordinatorError> {
        self.request(|reply| Command::Unicast {
            payload,
            recipient,
            priority,
            reply,
        })
        .await?
    }

    pub async fn multicast(
        &self,
        payload: serde_json::Value,
        recipients: Vec<NodeId>,
        priority: MessagePriority,
    ) -> Result<String, CoordinatorError> {
        self.request(|reply| Command::Multicast {
            payload,
            recipients,
            priority,
            reply,
        })
        .await?
    }

    pub async fn start_gossip(
        &self,
        key: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<(), CoordinatorError> {
        self.send(Command::StartGossip { key: key.into(), data }).await
    }

    pub async fn initiate_consensus(
        &self,
        kind: impl Into<String>,
        value: serde_json::Value,
        participants: Option<Vec<NodeId>>,
    ) -> Result<String, CoordinatorError> {
        self.request(|reply| Command::InitiateConsensus {
            kind: kind.into(),
            value,
            participants,
            reply,
        })
        .await?
    }

    pub async fn vote(
        &self,
        proposal_id: impl Into<String>,
        decision: VoteDecision,
        reasoning: Option<String>,
    ) -> Result<(), CoordinatorError> {
        self.request(|reply| Command::Vote {
            proposal_id: proposal_id.into(),
            decision,
            reasoning,
            reply,
        })
        .await?
    }

    pub async fn cancel_task(
        &self,
        task_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<bool, CoordinatorError> {
        self.request(|reply| Command::CancelTask {
            task_id: task_id.into(),
            reason: reason.into(),
            reply,
        })
        .await
    }

    pub async fn reassign_task(
        &self,
        task_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<bool, CoordinatorError> {
        self.request(|reply| Command::ReassignTask {
            task_id: task_id.into(),
            reason: reason.into(),
            reply,
        })
        .await
    }

    pub async fn receive(&self, message: Message) -> Result<(), CoordinatorError> {
        self.send(Command::Receive { message }).await
    }

    pub async fn report_progress(
        &self,
        task_id: impl Into<String>,
        progress: f64,
    ) -> Result<(), CoordinatorError> {
        self.send(Command::ReportProgress {
            task_id: task_id.into(),
            progress,
        })
        .await
    }

    pub async fn complete_task(&self, task_id: impl Into<String>) -> Result<(), CoordinatorError> {
        self.send(Command::CompleteTask {
            task_id: task_id.into(),
        })
        .await
    }

    pub async fn fail_task(
        &self,
        task_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Result<(), CoordinatorError> {
        self.send(Command::FailTask {
            task_id: task_id.into(),
            reason: reason.into(),
        })
        .await
    }

    pub async fn queue_status(&self) -> Result<QueueStatus, CoordinatorError> {
        self.request(|reply| Command::QueueStatus { reply }).await
    }

    pub async fn shutdown(&self) -> Result<(), CoordinatorError> {
        self.send(Command::Shutdown).await
    }
}

pub struct SwarmRuntime;

impl SwarmRuntime {
    /// Move the coordinator onto its own task. Returns the command handle
    /// and the join handle of the driving loop.
    pub fn spawn<T: Transport + 'static>(
        mut coordinator: SwarmCoordinator<T>,
    ) -> (CommandHandle, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<Command>(256);
        let tick_ms = 100;

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(tick_ms));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        coordinator.advance(Utc::now());
                    }
                    command = rx.recv() => {
                        let Some(command) = command else { break };
                        if Self::handle(&mut coordinator, command) {
                            break;
                        }
                    }
                }
            }
            coordinator.shutdown();
            debug!("runtime loop exited");
        });

        (CommandHandle { tx }, join)
    }

    /// Apply one command. Returns true on shutdown.
    fn handle<T: Transport>(coordinator: &mut SwarmCoordinator<T>, command: Command) -> bool {
        match command {
            Command::SubmitTask { task, reply } => {
                let _ = reply.send(coordinator.submit_task(task));
            }
            Command::RegisterAgent { profile } => coordinator.register_agent(profile),
            Command::RegisterNode { node } => coordinator.register_node(node),
            Command::Broadcast { payload, priority, reply } => {
                let _ = reply.send(coordinator.broadcast(payload, priority));
            }
            Command::Multicast { payload, recipients, priority, reply } => {
                let _ = reply.send(coordinator.multicast(payload, recipients, priority));
            }
            Command::Unicast { payload, recipient, priority, reply } => {
                let _ = reply.send(coordinator.unicast(payload, recipient, priority));
            }
            Command::StartGossip { key, data } => coordinator.start_gossip(key, data),
            Command::InitiateConsensus { kind, value, participants, reply } => {
                let _ = reply.send(coordinator.initiate_consensus(kind, value, participants));
            }
            Command::Vote { proposal_id, decision, reasoning, reply } => {
                let _ = reply.send(coordinator.vote(&proposal_id, decision, reasoning));
            }
            Command::CancelTask { task_id, reason, reply } => {
                let _ = reply.send(coordinator.cancel_task(&task_id, &reason));
            }
            Command::ReassignTask { task_id, reason, reply } => {
                let _ = reply.send(coordinator.reassign_task(&task_id, &reason));
            }
            Command::Receive { message } => coordinator.receive(message, Utc::now()),
            Command::ReportProgress { task_id, progress } => {
                coordinator.report_progress(&task_id, progress)
            }
            Command::CompleteTask { task_id } => {
                coordinator.complete_task(&task_id);
            }
            Command::FailTask { task_id, reason } => {
                coordinator.fail_task(&task_id, &reason);
            }
            Command::QueueStatus { reply } => {
                let _ = reply.send(coordinator.queue_status());
            }
            Command::Shutdown => return true,
        }
        false
    }
}
