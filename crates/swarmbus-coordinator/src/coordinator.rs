//! The swarm coordinator.
//!
//! Owns every shared map (nodes, agents, tasks, assignments) and is the
//! only mutator. All periodic work runs from `advance(now)`, which fires
//! whichever loops are due:
//!
//! - message processing (~100ms): drain priority queues, pump inbound
//! - gossip rounds: anti-entropy state exchange
//! - heartbeat + health: liveness decay, stuck tasks, consensus sweep,
//!   workload imbalance
//! - task distribution (~1s): queue to agent assignment
//!
//! Failures inside a loop are isolated per message/task; no error ever
//! propagates out of a tick.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use swarmbus_consensus::{ConsensusConfig, ConsensusEngine, ConsensusPolicy, Proposal, Vote};
use swarmbus_protocol::{
    AgentId, AgentProfile, CommunicationNode, EventBus, Message, MessagePriority, MessageType,
    MetricsSnapshot, NodeId, NodeStatus, SwarmEvent, TaskDefinition, TaskStatus, VoteDecision,
};
use swarmbus_routing::{
    MessageCodec, MessageHandler, MessageRouter, NodeRegistry, RouterConfig, Transport,
    BroadcastTree,
};
use swarmbus_state::{GossipConfig, GossipEngine, GossipState};
use swarmbus_tasks::{
    AssignmentOptimizer, FailureDisposition, FailureHandler, HeuristicPredictor, NoRebalance,
    RebalancePolicy, SuccessPredictor, TaskDecomposer, TaskError, TaskQueue, WorkloadBalancer,
};

use crate::config::CoordinatorConfig;
use crate::error::CoordinatorError;

/// Snapshot of queue and assignment state.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    /// Queued task IDs in drain order.
    pub pending: Vec<String>,
    /// task_id -> agent currently running it.
    pub assignments: HashMap<String, AgentId>,
}

#[derive(Debug, Clone)]
struct TaskRecord {
    def: TaskDefinition,
    status: TaskStatus,
    failed_attempts: u32,
}

/// Tracks when a periodic loop last ran.
struct LoopClock {
    interval_ms: u64,
    last: Option<DateTime<Utc>>,
}

impl LoopClock {
    fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last: None,
        }
    }

    fn due(&mut self, now: DateTime<Utc>) -> bool {
        let fire = match self.last {
            None => true,
            Some(last) => {
                now.signed_duration_since(last).num_milliseconds() >= self.interval_ms as i64
            }
        };
        if fire {
            self.last = Some(now);
        }
        fire
    }
}

pub struct SwarmCoordinator<T: Transport> {
    local_id: NodeId,
    config: CoordinatorConfig,
    bus: EventBus,

    registry: NodeRegistry,
    tree: BroadcastTree,
    router: MessageRouter,
    transport: T,
    gossip: GossipEngine,
    consensus: ConsensusEngine,

    queue: TaskQueue,
    optimizer: AssignmentOptimizer,
    balancer: WorkloadBalancer,
    rebalance_policy: Box<dyn RebalancePolicy>,
    failure: FailureHandler,

    agents: HashMap<AgentId, AgentProfile>,
    agent_order: Vec<AgentId>,
    tasks: HashMap<String, TaskRecord>,
    assignments: HashMap<String, swarmbus_protocol::TaskAssignment>,
    /// Agents excluded per task after reassignment.
    excluded_for: HashMap<String, HashSet<AgentId>>,
    node_status_cache: HashMap<NodeId, NodeStatus>,

    process_clock: LoopClock,
    gossip_clock: LoopClock,
    heartbeat_clock: LoopClock,
    distribution_clock: LoopClock,
}

impl<T: Transport> SwarmCoordinator<T> {
    pub fn new(config: CoordinatorConfig, bus: EventBus, mut transport: T) -> Self {
        let local_id = NodeId::new(
            config
                .node_id
                .clone()
                .unwrap_or_else(|| NodeId::generate().0),
        );

        let mut registry = NodeRegistry::new(config.heartbeat_interval_ms);
        let local_node =
            CommunicationNode::new(local_id.clone(), format!("local:{local_id}"), vec![]);
        registry.register(local_node);
        transport.open_endpoint(&local_id);

        let mut tree = BroadcastTree::new();
        tree.rebuild(&local_id, &registry.sorted_ids());

        let router = MessageRouter::new(
            local_id.clone(),
            RouterConfig {
                max_per_band_per_tick: config.messages_per_band_per_tick,
                history_cap: config.message_history_cap,
            },
            MessageCodec::new(),
            bus.clone(),
        );
        let gossip = GossipEngine::new(
            local_id.clone(),
            GossipConfig {
                fanout: config.gossip_fanout,
                seed: config.gossip_seed,
            },
            bus.clone(),
        );
        let consensus = ConsensusEngine::new(
            local_id.clone(),
            ConsensusConfig {
                timeout_ms: config.consensus_timeout_ms,
                policy: ConsensusPolicy::AlwaysAccept,
            },
            bus.clone(),
        );

        let process_clock = LoopClock::new(config.process_interval_ms);
        let gossip_clock = LoopClock::new(config.gossip_interval_ms);
        let heartbeat_clock = LoopClock::new(config.heartbeat_interval_ms);
        let distribution_clock = LoopClock::new(config.distribution_interval_ms);

        info!(node_id = %local_id, "coordinator initialized");

        Self {
            local_id,
            config,
            bus,
            registry,
            tree,
            router,
            transport,
            gossip,
            consensus,
            queue: TaskQueue::new(),
            optimizer: AssignmentOptimizer::new(Arc::new(HeuristicPredictor)),
            balancer: WorkloadBalancer::new(),
            rebalance_policy: Box::new(NoRebalance),
            failure: FailureHandler::new(),
            agents: HashMap::new(),
            agent_order: Vec::new(),
            tasks: HashMap::new(),
            assignments: HashMap::new(),
            excluded_for: HashMap::new(),
            node_status_cache: HashMap::new(),
            process_clock,
            gossip_clock,
            heartbeat_clock,
            distribution_clock,
        }
    }

    /// Swap the consensus vote policy.
    pub fn set_consensus_policy(&mut self, policy: ConsensusPolicy) {
        self.consensus = ConsensusEngine::new(
            self.local_id.clone(),
            ConsensusConfig {
                timeout_ms: self.config.consensus_timeout_ms,
                policy,
            },
            self.bus.clone(),
        );
    }

    /// Swap the assignment success predictor.
    pub fn set_success_predictor(&mut self, predictor: Arc<dyn SuccessPredictor>) {
        self.optimizer = AssignmentOptimizer::new(predictor);
    }

    /// Swap the rebalancing policy.
    pub fn set_rebalance_policy(&mut self, policy: Box<dyn RebalancePolicy>) {
        self.rebalance_policy = policy;
    }

    pub fn local_id(&self) -> &NodeId {
        &self.local_id
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    // ── Commands ──

    /// Register a peer node. Membership changes rebuild the broadcast tree.
    pub fn register_node(&mut self, node: CommunicationNode) {
        let node_id = node.id.clone();
        self.transport.open_endpoint(&node_id);
        let is_new = self.registry.register(node);
        if is_new {
            self.bus.publish(SwarmEvent::NodeRegistered {
                node_id: node_id.clone(),
            });
            self.bus.publish(SwarmEvent::NodeConnected {
                node_id: node_id.clone(),
            });
            self.node_status_cache.insert(node_id, NodeStatus::Online);
            self.rebuild_tree();
        }
    }

    /// Register a worker agent for task distribution.
    pub fn register_agent(&mut self, profile: AgentProfile) {
        let agent_id = profile.agent_id.clone();
        if !self.agents.contains_key(&agent_id) {
            self.agent_order.push(agent_id.clone());
        }
        info!(agent_id = %agent_id, capabilities = ?profile.capabilities, "agent registered");
        self.agents.insert(agent_id, profile);
    }

    /// Submit a task. Complex/expert tasks are decomposed before queueing;
    /// the returned ID is always the submitted task's own ID.
    pub fn submit_task(&mut self, task: TaskDefinition) -> String {
        let task_id = task.id.clone();
        self.bus.publish(SwarmEvent::TaskSubmitted {
            task_id: task_id.clone(),
        });

        if task.complexity.requires_decomposition() {
            let decomposed = TaskDecomposer::decompose(&task);
            info!(
                task_id = %task_id,
                subtasks = decomposed.subtasks.len(),
                coordination = ?decomposed.coordination,
                "complex task decomposed"
            );
            // The parent tracks overall status but never queues itself.
            self.tasks.insert(
                task_id.clone(),
                TaskRecord {
                    def: task,
                    status: TaskStatus::Queued,
                    failed_attempts: 0,
                },
            );
            for subtask in decomposed.subtasks {
                self.enqueue(subtask);
            }
        } else {
            self.enqueue(task);
        }
        task_id
    }

    fn enqueue(&mut self, task: TaskDefinition) {
        self.tasks.insert(
            task.id.clone(),
            TaskRecord {
                def: task.clone(),
                status: TaskStatus::Queued,
                failed_attempts: 0,
            },
        );
        self.queue.push(task);
    }

    pub fn broadcast(
        &mut self,
        payload: serde_json::Value,
        priority: MessagePriority,
    ) -> Result<String, CoordinatorError> {
        let message = Message::new(MessageType::Broadcast, self.local_id.clone(), vec![], payload)
            .with_priority(priority);
        Ok(self.router.send(message)?)
    }

    pub fn multicast(
        &mut self,
        payload: serde_json::Value,
        recipients: Vec<NodeId>,
        priority: MessagePriority,
    ) -> Result<String, CoordinatorError> {
        let message =
            Message::new(MessageType::Multicast, self.local_id.clone(), recipients, payload)
                .with_priority(priority);
        Ok(self.router.send(message)?)
    }

    pub fn unicast(
        &mut self,
        payload: serde_json::Value,
        recipient: NodeId,
        priority: MessagePriority,
    ) -> Result<String, CoordinatorError> {
        let message =
            Message::new(MessageType::Unicast, self.local_id.clone(), vec![recipient], payload)
                .with_priority(priority);
        Ok(self.router.send(message)?)
    }

    /// Publish gossip state and propagate it immediately.
    pub fn start_gossip(&mut self, key: impl Into<String>, data: serde_json::Value) {
        let now = Utc::now();
        let peers = self.peer_ids(now);
        let messages = self.gossip.start(key, data, &peers, now);
        for message in messages {
            if let Err(e) = self.router.send(message) {
                warn!(error = %e, "gossip propagation send failed");
            }
        }
    }

    /// Start a consensus round over `participants` (default: every peer).
    pub fn initiate_consensus(
        &mut self,
        kind: impl Into<String>,
        value: serde_json::Value,
        participants: Option<Vec<NodeId>>,
    ) -> Result<String, CoordinatorError> {
        let now = Utc::now();
        let participants = participants.unwrap_or_else(|| self.peer_ids(now));
        let (proposal_id, message) = self.consensus.initiate(kind, value, participants, now)?;
        self.router.send(message)?;
        Ok(proposal_id)
    }

    /// Cast this node's vote on a proposal. Votes on our own proposals
    /// tally locally; votes on remote proposals unicast to the proposer.
    pub fn vote(
        &mut self,
        proposal_id: &str,
        decision: VoteDecision,
        reasoning: Option<String>,
    ) -> Result<(), CoordinatorError> {
        let now = Utc::now();
        let vote = Vote {
            proposal_id: proposal_id.to_string(),
            voter: self.local_id.clone(),
            decision,
            reasoning,
            cast_at: now,
        };
        let proposer = self
            .consensus
            .proposer_of(proposal_id)
            .cloned()
            .ok_or_else(|| {
                swarmbus_consensus::ConsensusError::ProposalNotFound(proposal_id.to_string())
            })?;
        self.bus.publish(SwarmEvent::VoteCast {
            proposal_id: proposal_id.to_string(),
            voter: self.local_id.clone(),
            decision,
        });

        if proposer == self.local_id {
            self.consensus.record_vote(vote, self.registry.len())?;
        } else {
            let payload = serde_json::to_value(&vote)
                .map_err(swarmbus_consensus::ConsensusError::Serialization)?;
            let message =
                Message::new(MessageType::Consensus, self.local_id.clone(), vec![proposer], payload)
                    .with_priority(MessagePriority::High);
            self.router.send(message)?;
        }
        Ok(())
    }

    /// Cancel a task. Cancellation of running work is advisory: the agent
    /// gets a control message and local bookkeeping is cleaned up without
    /// waiting for an acknowledgment.
    pub fn cancel_task(&mut self, task_id: &str, reason: &str) -> bool {
        if self.queue.remove(task_id).is_some() {
            if let Some(record) = self.tasks.get_mut(task_id) {
                record.status = TaskStatus::Cancelled;
            }
            self.bus.publish(SwarmEvent::TaskCancelled {
                task_id: task_id.to_string(),
                reason: reason.to_string(),
            });
            return true;
        }

        if let Some(assignment) = self.assignments.remove(task_id) {
            let notice = Message::new(
                MessageType::Control,
                self.local_id.clone(),
                vec![NodeId::new(assignment.agent_id.as_str())],
                serde_json::json!({
                    "action": "cancel_task",
                    "task_id": task_id,
                    "reason": reason,
                }),
            )
            .with_priority(MessagePriority::High);
            if let Err(e) = self.router.send(notice) {
                warn!(task_id, error = %e, "cancellation notice not sent");
            }

            self.release_load(&assignment.agent_id);
            if let Some(record) = self.tasks.get_mut(task_id) {
                record.status = TaskStatus::Cancelled;
            }
            self.bus.publish(SwarmEvent::TaskCancelled {
                task_id: task_id.to_string(),
                reason: reason.to_string(),
            });
            return true;
        }
        false
    }

    /// Pull a running task back from its agent and requeue it. The former
    /// agent is excluded from future attempts at this task.
    pub fn reassign_task(&mut self, task_id: &str, reason: &str) -> bool {
        let Some(assignment) = self.assignments.remove(task_id) else {
            return false;
        };
        let from = assignment.agent_id.clone();
        self.release_load(&from);
        self.excluded_for
            .entry(task_id.to_string())
            .or_default()
            .insert(from.clone());

        if let Some(record) = self.tasks.get_mut(task_id) {
            record.status = TaskStatus::Queued;
            let task = record.def.clone();
            self.queue.push(task);
        }
        info!(task_id, from = %from, reason, "task reassigned");
        self.bus.publish(SwarmEvent::TaskReassigned {
            task_id: task_id.to_string(),
            from,
            reason: reason.to_string(),
        });
        true
    }

    pub fn register_handler(&mut self, message_type: MessageType, handler: MessageHandler) {
        self.router.register_handler(message_type, handler);
    }

    /// Feed an externally received message into the inbound path.
    pub fn receive(&mut self, message: Message, now: DateTime<Utc>) {
        let message_id = message.id.clone();
        match self.router.handle_inbound(message, now) {
            Ok(Some(decoded)) => self.handle_builtin(decoded, now),
            Ok(None) => {}
            Err(e) => {
                warn!(message_id = %message_id, error = %e, "inbound processing failed");
                self.bus.publish(SwarmEvent::MessageFailed {
                    message_id,
                    reason: e.to_string(),
                });
            }
        }
    }

    // ── Agent lifecycle feedback ──

    /// Record a progress report for a running task.
    pub fn report_progress(&mut self, task_id: &str, progress: f64) {
        let now = Utc::now();
        if let Some(assignment) = self.assignments.get_mut(task_id) {
            assignment.last_progress_at = Some(now);
        }
        self.bus.publish(SwarmEvent::TaskProgress {
            task_id: task_id.to_string(),
            progress,
        });
    }

    /// Mark a running task completed, releasing the agent's load.
    pub fn complete_task(&mut self, task_id: &str) -> bool {
        let Some(assignment) = self.assignments.remove(task_id) else {
            return false;
        };
        let agent_id = assignment.agent_id.clone();
        let capabilities = self
            .tasks
            .get(task_id)
            .map(|r| r.def.requirements.capabilities.clone())
            .unwrap_or_default();
        self.record_outcome(&agent_id, &capabilities, true);
        if let Some(record) = self.tasks.get_mut(task_id) {
            record.status = TaskStatus::Completed;
        }
        self.bus.publish(SwarmEvent::TaskCompleted {
            task_id: task_id.to_string(),
            agent_id,
        });
        true
    }

    /// Mark a running task failed. Requeues while retry budget remains,
    /// otherwise the failure is permanent.
    pub fn fail_task(&mut self, task_id: &str, reason: &str) -> bool {
        let Some(assignment) = self.assignments.remove(task_id) else {
            return false;
        };
        let agent_id = assignment.agent_id.clone();
        let capabilities = self
            .tasks
            .get(task_id)
            .map(|r| r.def.requirements.capabilities.clone())
            .unwrap_or_default();
        self.record_outcome(&agent_id, &capabilities, false);

        let Some(record) = self.tasks.get_mut(task_id) else {
            return false;
        };
        record.failed_attempts += 1;
        match self.failure.disposition(&record.def, record.failed_attempts) {
            FailureDisposition::Retry { remaining } => {
                record.status = TaskStatus::Queued;
                let task = record.def.clone();
                debug!(task_id, remaining, "task requeued after failure");
                self.queue.push(task);
                self.bus.publish(SwarmEvent::TaskFailed {
                    task_id: task_id.to_string(),
                    reason: reason.to_string(),
                    permanent: false,
                });
            }
            FailureDisposition::Permanent => {
                record.status = TaskStatus::Failed;
                warn!(task_id, reason, "task permanently failed");
                self.bus.publish(SwarmEvent::TaskFailed {
                    task_id: task_id.to_string(),
                    reason: reason.to_string(),
                    permanent: true,
                });
            }
        }
        true
    }

    // ── Periodic loops ──

    /// Run every loop that is due at `now`. Deterministic: tests pass
    /// explicit timestamps, the runtime passes wall-clock time.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        if self.process_clock.due(now) {
            self.process_messages(now);
        }
        if self.gossip_clock.due(now) {
            self.gossip_round(now);
        }
        if self.heartbeat_clock.due(now) {
            self.heartbeat_and_health(now);
        }
        if self.distribution_clock.due(now) {
            self.distribute_tasks(now);
        }
    }

    fn process_messages(&mut self, now: DateTime<Utc>) {
        self.router
            .process_tick(now, &self.registry, &self.tree, &mut self.transport);
        self.router.purge_expired(now);

        // Pump messages the transport delivered to the local endpoint.
        for message in self.transport.collect(&self.local_id) {
            self.receive(message, now);
        }
    }

    fn gossip_round(&mut self, now: DateTime<Utc>) {
        let peers = self.peer_ids(now);
        let messages = self.gossip.round(&peers);
        for message in messages {
            if let Err(e) = self.router.send(message) {
                warn!(error = %e, "gossip round send failed");
            }
        }
    }

    fn heartbeat_and_health(&mut self, now: DateTime<Utc>) {
        // Our own liveness plus a heartbeat to every reachable peer.
        let local = self.local_id.clone();
        self.registry.heartbeat(&local, now);
        let peers = self.peer_ids(now);
        if !peers.is_empty() {
            let heartbeat = Message::new(
                MessageType::Heartbeat,
                self.local_id.clone(),
                peers,
                serde_json::json!({ "node_id": self.local_id, "at": now }),
            )
            .with_priority(MessagePriority::Background);
            if let Err(e) = self.router.send(heartbeat) {
                warn!(error = %e, "heartbeat send failed");
            }
        }

        // Status decay: emit transitions and rebuild the tree when
        // membership effectively changed.
        let mut membership_changed = false;
        for (node_id, status) in self.registry.statuses(now) {
            let prev = self.node_status_cache.insert(node_id.clone(), status);
            if prev == Some(status) {
                continue;
            }
            match status {
                NodeStatus::Offline => {
                    info!(node_id = %node_id, "node went offline");
                    self.bus.publish(SwarmEvent::NodeDisconnected { node_id });
                    membership_changed = true;
                }
                NodeStatus::Online if matches!(prev, Some(NodeStatus::Offline)) => {
                    self.bus.publish(SwarmEvent::NodeConnected { node_id });
                    membership_changed = true;
                }
                _ => {}
            }
        }
        if membership_changed {
            self.rebuild_tree();
        }

        // Assignments held by unavailable agents go back to the queue.
        let orphaned: Vec<String> = self
            .assignments
            .iter()
            .filter(|(_, assignment)| {
                let agent_offline = self
                    .registry
                    .status_of(&NodeId::new(assignment.agent_id.as_str()), now)
                    .map(|s| s == NodeStatus::Offline)
                    .unwrap_or(false);
                let agent_unavailable = self
                    .agents
                    .get(&assignment.agent_id)
                    .map(|a| !a.available)
                    .unwrap_or(true);
                agent_offline || agent_unavailable
            })
            .map(|(task_id, _)| task_id.clone())
            .collect();
        for task_id in orphaned {
            warn!(task_id = %task_id, "assignee unavailable");
            self.reassign_task(&task_id, "agent_unavailable");
        }

        // Stuck tasks: running past 2x their estimate get force-reassigned.
        let stuck: Vec<String> = self
            .assignments
            .iter()
            .filter(|(task_id, assignment)| {
                self.tasks
                    .get(*task_id)
                    .map(|r| self.failure.is_stuck(assignment, &r.def, now))
                    .unwrap_or(false)
            })
            .map(|(task_id, _)| task_id.clone())
            .collect();
        for task_id in stuck {
            warn!(task_id = %task_id, "stuck task detected");
            self.reassign_task(&task_id, "task_stuck");
        }

        self.consensus.sweep(now);

        let agent_refs: Vec<&AgentProfile> = self
            .agent_order
            .iter()
            .filter_map(|id| self.agents.get(id))
            .collect();
        let report = self.balancer.assess(&agent_refs);
        if report.should_rebalance {
            let actions = self.rebalance_policy.plan(&report, &agent_refs);
            info!(
                severity = report.severity,
                overloaded = report.overloaded.len(),
                underloaded = report.underloaded.len(),
                planned_actions = actions.len(),
                "rebalancing triggered"
            );
        }
    }

    fn distribute_tasks(&mut self, now: DateTime<Utc>) {
        let completed: HashSet<String> = self
            .tasks
            .iter()
            .filter(|(_, r)| r.status == TaskStatus::Completed)
            .map(|(id, _)| id.clone())
            .collect();
        let batch = self.queue.get_next_where(self.config.tasks_per_tick, |task| {
            task.dependencies.iter().all(|dep| completed.contains(dep))
        });

        for task in batch {
            self.try_assign(task, now);
        }

        self.bus.publish(SwarmEvent::MetricsUpdated {
            snapshot: self.metrics(),
        });
    }

    fn try_assign(&mut self, task: TaskDefinition, now: DateTime<Utc>) {
        let empty = HashSet::new();
        let excluded = self.excluded_for.get(&task.id).unwrap_or(&empty);
        let agent_refs: Vec<&AgentProfile> = self
            .agent_order
            .iter()
            .filter_map(|id| self.agents.get(id))
            .collect();

        match self.optimizer.select(&task, &agent_refs, excluded, now) {
            Ok(assignment) => {
                let agent_id = assignment.agent_id.clone();
                if let Some(agent) = self.agents.get_mut(&agent_id) {
                    agent.current_load += 1;
                }
                if let Some(record) = self.tasks.get_mut(&task.id) {
                    record.status = TaskStatus::Assigned;
                }

                let notice = Message::new(
                    MessageType::Data,
                    self.local_id.clone(),
                    vec![NodeId::new(agent_id.as_str())],
                    serde_json::json!({
                        "action": "task_assignment",
                        "task": task,
                        "resources": assignment.resources,
                        "expected_quality": assignment.expected_quality,
                    }),
                )
                .with_priority(MessagePriority::High);
                if let Err(e) = self.router.send(notice) {
                    warn!(task_id = %task.id, error = %e, "assignment notice not sent");
                }

                self.bus.publish(SwarmEvent::TaskAssigned {
                    task_id: task.id.clone(),
                    agent_id,
                    confidence: assignment.confidence,
                });
                self.assignments.insert(task.id.clone(), assignment);
            }
            Err(TaskError::NoEligibleAgent { .. }) => {
                // Capacity shortfall is advisory: requeue and retry on a
                // later tick.
                debug!(task_id = %task.id, "no eligible agent, task requeued");
                self.queue.push(task);
            }
            Err(e) => {
                warn!(task_id = %task.id, error = %e, "assignment error");
                self.queue.push(task);
            }
        }
    }

    // ── Builtin inbound handling ──

    fn handle_builtin(&mut self, message: Message, now: DateTime<Utc>) {
        match message.message_type {
            MessageType::Heartbeat => {
                self.registry.heartbeat(&message.sender, now);
            }
            MessageType::Gossip => {
                match serde_json::from_value::<GossipState>(message.payload.clone()) {
                    Ok(state) => {
                        self.gossip.apply_remote(state);
                    }
                    Err(e) => warn!(message_id = %message.id, error = %e, "malformed gossip state"),
                }
            }
            MessageType::Consensus => self.handle_consensus_message(message, now),
            MessageType::Election => {
                // Leader election is deployment policy; the core only
                // transports these.
                debug!(message_id = %message.id, "election message passed through");
            }
            _ => {}
        }
    }

    fn handle_consensus_message(&mut self, message: Message, now: DateTime<Utc>) {
        if message.payload.get("proposer").is_some() {
            match serde_json::from_value::<Proposal>(message.payload.clone()) {
                Ok(proposal) => match self.consensus.handle_proposal(proposal, now) {
                    Ok((_, reply)) => {
                        if let Err(e) = self.router.send(reply) {
                            warn!(error = %e, "vote reply not sent");
                        }
                    }
                    Err(e) => warn!(error = %e, "proposal handling failed"),
                },
                Err(e) => warn!(message_id = %message.id, error = %e, "malformed proposal"),
            }
        } else if message.payload.get("voter").is_some() {
            match serde_json::from_value::<Vote>(message.payload.clone()) {
                Ok(vote) => {
                    if let Err(e) = self.consensus.record_vote(vote, self.registry.len()) {
                        warn!(error = %e, "vote rejected");
                    }
                }
                Err(e) => warn!(message_id = %message.id, error = %e, "malformed vote"),
            }
        } else {
            warn!(message_id = %message.id, "consensus message with unrecognized payload");
        }
    }

    // ── Introspection ──

    pub fn queue_status(&self) -> QueueStatus {
        QueueStatus {
            pending: self.queue.pending_ids(),
            assignments: self
                .assignments
                .iter()
                .map(|(task_id, a)| (task_id.clone(), a.agent_id.clone()))
                .collect(),
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            known_nodes: self.registry.len(),
            registered_agents: self.agents.len(),
            queued_tasks: self.queue.len(),
            active_assignments: self.assignments.len(),
            messages_in_flight: self.router.queued_len(),
        }
    }

    pub fn agent(&self, agent_id: &AgentId) -> Option<&AgentProfile> {
        self.agents.get(agent_id)
    }

    pub fn task_status(&self, task_id: &str) -> Option<TaskStatus> {
        self.tasks.get(task_id).map(|r| r.status)
    }

    pub fn gossip_state(&self, key: &str) -> Option<&GossipState> {
        self.gossip.get(key)
    }

    pub fn node_status(&self, node_id: &NodeId, now: DateTime<Utc>) -> Option<NodeStatus> {
        self.registry.status_of(node_id, now)
    }

    pub fn heartbeat_from(&mut self, node_id: &NodeId, now: DateTime<Utc>) -> bool {
        self.registry.heartbeat(node_id, now)
    }

    /// Announce shutdown to subscribers. The runtime calls this once before
    /// dropping the coordinator.
    pub fn shutdown(&mut self) {
        info!(node_id = %self.local_id, "coordinator shutting down");
        self.bus.publish(SwarmEvent::Shutdown { at: Utc::now() });
    }

    // ── Helpers ──

    fn peer_ids(&self, now: DateTime<Utc>) -> Vec<NodeId> {
        self.registry
            .reachable_ids(now)
            .into_iter()
            .filter(|id| *id != self.local_id)
            .collect()
    }

    fn rebuild_tree(&mut self) {
        self.tree.rebuild(&self.local_id, &self.registry.sorted_ids());
    }

    fn release_load(&mut self, agent_id: &AgentId) {
        if let Some(agent) = self.agents.get_mut(agent_id) {
            agent.current_load = agent.current_load.saturating_sub(1);
        }
    }

    fn record_outcome(&mut self, agent_id: &AgentId, capabilities: &[String], success: bool) {
        let Some(agent) = self.agents.get_mut(agent_id) else {
            return;
        };
        agent.current_load = agent.current_load.saturating_sub(1);
        let target = if success { 1.0 } else { 0.0 };
        for capability in capabilities {
            let entry = agent.performance.entry(capability.clone()).or_insert(0.5);
            *entry = 0.8 * *entry + 0.2 * target;
        }
    }
}
