use chrono::{Duration, Utc};

use swarmbus_consensus::Vote;
use swarmbus_coordinator::{CoordinatorConfig, SwarmCoordinator};
use swarmbus_protocol::{
    AgentId, AgentProfile, CommunicationNode, ConsensusOutcome, EventBus, Message, MessageType,
    NodeId, NodeStatus, SwarmEvent, TaskComplexity, TaskDefinition, TaskPriority, TaskStatus,
    VoteDecision,
};
use swarmbus_routing::LoopbackTransport;
use swarmbus_state::gossip::state_checksum;
use swarmbus_state::GossipState;

fn coordinator() -> (SwarmCoordinator<LoopbackTransport>, EventBus) {
    let bus = EventBus::default();
    let config = CoordinatorConfig {
        node_id: Some("local".to_string()),
        ..Default::default()
    };
    let coordinator = SwarmCoordinator::new(config, bus.clone(), LoopbackTransport::new());
    (coordinator, bus)
}

fn node(id: &str, capabilities: &[&str]) -> CommunicationNode {
    CommunicationNode::new(
        NodeId::from(id),
        format!("local:{id}"),
        capabilities.iter().map(|s| s.to_string()).collect(),
    )
}

fn agent(id: &str, capabilities: &[&str]) -> AgentProfile {
    AgentProfile::new(
        AgentId::from(id),
        capabilities.iter().map(|s| s.to_string()).collect(),
        4,
    )
}

fn drain(events: &mut tokio::sync::broadcast::Receiver<SwarmEvent>) -> Vec<SwarmEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[test]
fn test_submit_to_assignment_end_to_end() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    coordinator.register_node(node("worker-1", &["ocr"]));
    coordinator.register_agent(agent("worker-1", &["ocr"]));

    let task = TaskDefinition::new("scan invoices")
        .with_priority(TaskPriority::Critical)
        .with_complexity(TaskComplexity::Simple)
        .with_capabilities(vec!["ocr".to_string()]);
    let task_id = coordinator.submit_task(task);

    // Queued before any tick.
    let status = coordinator.queue_status();
    assert!(status.pending.contains(&task_id));
    assert!(status.assignments.is_empty());

    coordinator.advance(Utc::now());

    // One tick later: assigned, load incremented.
    let status = coordinator.queue_status();
    assert!(!status.pending.contains(&task_id));
    assert_eq!(
        status.assignments.get(&task_id),
        Some(&AgentId::from("worker-1"))
    );
    assert_eq!(
        coordinator.agent(&AgentId::from("worker-1")).unwrap().current_load,
        1
    );

    let events = drain(&mut events);
    assert!(events
        .iter()
        .any(|e| matches!(e, SwarmEvent::TaskSubmitted { task_id: id } if *id == task_id)));
    assert!(events
        .iter()
        .any(|e| matches!(e, SwarmEvent::TaskAssigned { task_id: id, .. } if *id == task_id)));
}

#[test]
fn test_completion_releases_load() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    coordinator.register_node(node("worker-1", &["ocr"]));
    coordinator.register_agent(agent("worker-1", &["ocr"]));
    let task_id =
        coordinator.submit_task(TaskDefinition::new("t").with_capabilities(vec!["ocr".into()]));
    coordinator.advance(Utc::now());

    assert!(coordinator.complete_task(&task_id));
    assert_eq!(
        coordinator.agent(&AgentId::from("worker-1")).unwrap().current_load,
        0
    );
    assert_eq!(coordinator.task_status(&task_id), Some(TaskStatus::Completed));
    assert!(coordinator.queue_status().assignments.is_empty());
    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, SwarmEvent::TaskCompleted { .. })));
}

#[test]
fn test_retry_exhaustion_after_two_failures() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    coordinator.register_node(node("worker-1", &["ocr"]));
    coordinator.register_agent(agent("worker-1", &["ocr"]));

    let mut task = TaskDefinition::new("fragile").with_capabilities(vec!["ocr".into()]);
    task.constraints.max_retries = 1;
    let task_id = coordinator.submit_task(task);

    let t0 = Utc::now();
    coordinator.advance(t0);
    assert!(coordinator.queue_status().assignments.contains_key(&task_id));

    // First failure: requeued.
    assert!(coordinator.fail_task(&task_id, "crashed"));
    assert_eq!(coordinator.task_status(&task_id), Some(TaskStatus::Queued));
    assert!(coordinator.queue_status().pending.contains(&task_id));

    // Second attempt.
    coordinator.advance(t0 + Duration::milliseconds(1_100));
    assert!(coordinator.queue_status().assignments.contains_key(&task_id));

    // Second failure: permanent, no third attempt.
    assert!(coordinator.fail_task(&task_id, "crashed again"));
    assert_eq!(coordinator.task_status(&task_id), Some(TaskStatus::Failed));
    assert!(!coordinator.queue_status().pending.contains(&task_id));

    let events = drain(&mut events);
    let permanent_failures = events
        .iter()
        .filter(|e| matches!(e, SwarmEvent::TaskFailed { permanent: true, .. }))
        .count();
    let transient_failures = events
        .iter()
        .filter(|e| matches!(e, SwarmEvent::TaskFailed { permanent: false, .. }))
        .count();
    assert_eq!(transient_failures, 1);
    assert_eq!(permanent_failures, 1);
}

#[test]
fn test_no_eligible_agent_requeues_instead_of_failing() {
    let (mut coordinator, _) = coordinator();
    coordinator.register_node(node("worker-1", &["nlp"]));
    coordinator.register_agent(agent("worker-1", &["nlp"]));

    let task_id =
        coordinator.submit_task(TaskDefinition::new("t").with_capabilities(vec!["ocr".into()]));
    coordinator.advance(Utc::now());

    // Still queued, not failed.
    assert!(coordinator.queue_status().pending.contains(&task_id));
    assert_eq!(coordinator.task_status(&task_id), Some(TaskStatus::Queued));
}

#[test]
fn test_complex_task_decomposes_into_subtasks() {
    let (mut coordinator, _) = coordinator();

    let task = TaskDefinition::new("overhaul")
        .with_complexity(TaskComplexity::Complex)
        .with_capabilities(vec!["storage".into(), "network".into()]);
    let parent_id = coordinator.submit_task(task);

    let status = coordinator.queue_status();
    // Analysis + two execution lanes + integration; the parent never queues.
    assert_eq!(status.pending.len(), 4);
    assert!(!status.pending.contains(&parent_id));
}

#[test]
fn test_subtask_dependencies_gate_distribution() {
    let (mut coordinator, _) = coordinator();
    coordinator.register_node(node("worker-1", &["storage", "network"]));
    coordinator.register_agent(agent("worker-1", &["storage", "network"]));

    let task = TaskDefinition::new("overhaul")
        .with_complexity(TaskComplexity::Complex)
        .with_capabilities(vec!["storage".into(), "network".into()]);
    coordinator.submit_task(task);

    coordinator.advance(Utc::now());
    // Only the analysis subtask is dependency-free on the first tick.
    assert_eq!(coordinator.queue_status().assignments.len(), 1);
}

#[test]
fn test_cancel_queued_task() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    let task_id = coordinator.submit_task(TaskDefinition::new("t"));
    assert!(coordinator.cancel_task(&task_id, "operator request"));
    assert_eq!(coordinator.task_status(&task_id), Some(TaskStatus::Cancelled));
    assert!(coordinator.queue_status().pending.is_empty());
    assert!(!coordinator.cancel_task(&task_id, "again"));

    assert!(drain(&mut events)
        .iter()
        .any(|e| matches!(e, SwarmEvent::TaskCancelled { .. })));
}

#[test]
fn test_reassign_excludes_previous_agent() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    coordinator.register_node(node("worker-1", &["ocr"]));
    coordinator.register_agent(agent("worker-1", &["ocr"]));
    let task_id =
        coordinator.submit_task(TaskDefinition::new("t").with_capabilities(vec!["ocr".into()]));

    let t0 = Utc::now();
    coordinator.advance(t0);
    assert!(coordinator.reassign_task(&task_id, "operator request"));

    // Load released and the only capable agent now excluded: the task
    // stays queued on subsequent ticks.
    assert_eq!(
        coordinator.agent(&AgentId::from("worker-1")).unwrap().current_load,
        0
    );
    coordinator.advance(t0 + Duration::milliseconds(1_100));
    assert!(coordinator.queue_status().pending.contains(&task_id));

    assert!(drain(&mut events).iter().any(
        |e| matches!(e, SwarmEvent::TaskReassigned { task_id: id, .. } if *id == task_id)
    ));
}

#[test]
fn test_stuck_task_force_reassigned() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    coordinator.register_node(node("worker-1", &["ocr"]));
    coordinator.register_agent(agent("worker-1", &["ocr"]));
    let mut task = TaskDefinition::new("slow").with_capabilities(vec!["ocr".into()]);
    task.estimated_duration_ms = 1_000;
    let task_id = coordinator.submit_task(task);

    let t0 = Utc::now();
    coordinator.advance(t0);
    assert!(coordinator.queue_status().assignments.contains_key(&task_id));

    // Well past 2x the estimate, the health scan pulls it back. The agent
    // keeps heartbeating so it stays online.
    let later = t0 + Duration::milliseconds(10_000);
    coordinator.heartbeat_from(&NodeId::from("worker-1"), later);
    coordinator.advance(later);

    assert!(!coordinator.queue_status().assignments.contains_key(&task_id));
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        SwarmEvent::TaskReassigned { reason, .. } if reason == "task_stuck"
    )));
}

#[test]
fn test_offline_assignee_releases_its_task() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    coordinator.register_node(node("worker-1", &["ocr"]));
    coordinator.register_agent(agent("worker-1", &["ocr"]));
    let task_id =
        coordinator.submit_task(TaskDefinition::new("t").with_capabilities(vec!["ocr".into()]));

    let t0 = Utc::now();
    coordinator.advance(t0);
    assert!(coordinator.queue_status().assignments.contains_key(&task_id));

    // The worker's node falls silent past the offline threshold.
    let later = t0 + Duration::milliseconds(16_000);
    coordinator.advance(later);

    assert!(!coordinator.queue_status().assignments.contains_key(&task_id));
    assert!(drain(&mut events).iter().any(|e| matches!(
        e,
        SwarmEvent::TaskReassigned { reason, .. } if reason == "agent_unavailable"
    )));
}

#[test]
fn test_node_status_decay_emits_disconnect() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    coordinator.register_node(node("flaky", &[]));
    let t0 = Utc::now();
    coordinator.advance(t0);

    // Default heartbeat interval is 5s; 16s of silence is past 3x.
    let later = t0 + Duration::milliseconds(16_000);
    coordinator.advance(later);

    assert_eq!(
        coordinator.node_status(&NodeId::from("flaky"), later),
        Some(NodeStatus::Offline)
    );
    assert!(drain(&mut events).iter().any(
        |e| matches!(e, SwarmEvent::NodeDisconnected { node_id } if node_id.as_str() == "flaky")
    ));
}

#[test]
fn test_gossip_propagates_to_peer_inboxes() {
    let (mut coordinator, _) = coordinator();
    coordinator.register_node(node("peer-a", &[]));
    coordinator.register_node(node("peer-b", &[]));

    coordinator.start_gossip("topology", serde_json::json!({"nodes": 3}));
    assert_eq!(coordinator.gossip_state("topology").unwrap().version, 1);

    coordinator.advance(Utc::now());

    let total: usize = ["peer-a", "peer-b"]
        .iter()
        .map(|id| coordinator.transport_mut().inbox_len(&NodeId::from(*id)))
        .sum();
    assert!(total >= 2, "gossip messages reached peers, got {total}");
}

#[test]
fn test_received_gossip_respects_versions() {
    let (mut coordinator, _) = coordinator();
    coordinator.register_node(node("peer-a", &[]));

    let data = serde_json::json!({"v": 7});
    let state = GossipState {
        key: "cfg".to_string(),
        version: 7,
        checksum: state_checksum(&data),
        data,
        updated_at: Utc::now(),
    };
    let message = Message::new(
        MessageType::Gossip,
        NodeId::from("peer-a"),
        vec![NodeId::from("local")],
        serde_json::to_value(&state).unwrap(),
    );
    coordinator.receive(message, Utc::now());
    assert_eq!(coordinator.gossip_state("cfg").unwrap().version, 7);

    // A lower version arriving later changes nothing.
    let stale_data = serde_json::json!({"v": 5});
    let stale = GossipState {
        key: "cfg".to_string(),
        version: 5,
        checksum: state_checksum(&stale_data),
        data: stale_data,
        updated_at: Utc::now(),
    };
    let message = Message::new(
        MessageType::Gossip,
        NodeId::from("peer-a"),
        vec![NodeId::from("local")],
        serde_json::to_value(&stale).unwrap(),
    );
    coordinator.receive(message, Utc::now());
    assert_eq!(coordinator.gossip_state("cfg").unwrap().version, 7);
}

#[test]
fn test_consensus_quorum_through_message_path() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    // 3 known nodes including the local one: quorum = 2.
    coordinator.register_node(node("peer-a", &[]));
    coordinator.register_node(node("peer-b", &[]));

    let proposal_id = coordinator
        .initiate_consensus("scale-up", serde_json::json!({"replicas": 5}), None)
        .unwrap();

    let now = Utc::now();
    for voter in ["peer-a", "peer-b"] {
        let vote = Vote {
            proposal_id: proposal_id.clone(),
            voter: NodeId::from(voter),
            decision: VoteDecision::Accept,
            reasoning: None,
            cast_at: now,
        };
        let message = Message::new(
            MessageType::Consensus,
            NodeId::from(voter),
            vec![NodeId::from("local")],
            serde_json::to_value(&vote).unwrap(),
        );
        coordinator.receive(message, now);
    }

    let events = drain(&mut events);
    assert!(events.iter().any(|e| matches!(
        e,
        SwarmEvent::ConsensusReached { proposal_id: id, result: ConsensusOutcome::Accepted }
            if *id == proposal_id
    )));
}

#[test]
fn test_single_vote_produces_no_consensus_event() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    coordinator.register_node(node("peer-a", &[]));
    coordinator.register_node(node("peer-b", &[]));
    let proposal_id = coordinator
        .initiate_consensus("scale-up", serde_json::json!({}), None)
        .unwrap();

    let vote = Vote {
        proposal_id,
        voter: NodeId::from("peer-a"),
        decision: VoteDecision::Accept,
        reasoning: None,
        cast_at: Utc::now(),
    };
    let message = Message::new(
        MessageType::Consensus,
        NodeId::from("peer-a"),
        vec![NodeId::from("local")],
        serde_json::to_value(&vote).unwrap(),
    );
    coordinator.receive(message, Utc::now());

    assert!(!drain(&mut events)
        .iter()
        .any(|e| matches!(e, SwarmEvent::ConsensusReached { .. })));
}

#[test]
fn test_heartbeat_messages_refresh_liveness() {
    let (mut coordinator, _) = coordinator();
    coordinator.register_node(node("peer-a", &[]));

    let t0 = Utc::now();
    let later = t0 + Duration::milliseconds(16_000);

    let heartbeat = Message::new(
        MessageType::Heartbeat,
        NodeId::from("peer-a"),
        vec![NodeId::from("local")],
        serde_json::json!({"node_id": "peer-a"}),
    );
    coordinator.receive(heartbeat, later);

    assert_eq!(
        coordinator.node_status(&NodeId::from("peer-a"), later),
        Some(NodeStatus::Online)
    );
}

#[test]
fn test_metrics_snapshot_emitted_on_distribution_tick() {
    let (mut coordinator, bus) = coordinator();
    let mut events = bus.subscribe();

    coordinator.register_node(node("worker-1", &[]));
    coordinator.submit_task(TaskDefinition::new("t"));
    coordinator.advance(Utc::now());

    let snapshot = drain(&mut events).into_iter().find_map(|e| match e {
        SwarmEvent::MetricsUpdated { snapshot } => Some(snapshot),
        _ => None,
    });
    let snapshot = snapshot.expect("metrics event");
    assert_eq!(snapshot.known_nodes, 2);
}
