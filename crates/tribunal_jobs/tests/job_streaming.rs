//! End-to-end job execution and streaming through the judge service.

use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tribunal_jobs::{
    EventKind, EventPayload, JobEvent, JobId, JobResult, JudgeService, ScriptedPipeline, StageId,
    StreamPolicy, Submission, STAGE_ORDER,
};

const STREAM_TIMEOUT: Duration = Duration::from_secs(10);

fn service(pipeline: ScriptedPipeline) -> JudgeService {
    JudgeService::new(Arc::new(pipeline))
        .with_policy(StreamPolicy::default().with_poll_interval(Duration::from_millis(5)))
}

fn acme() -> Submission {
    Submission::new("Acme", "https://github.com/acme/app", "we make judging fun")
        .with_pptx("/tmp/acme.pptx")
}

async fn collect(service: &JudgeService, id: &JobId) -> Vec<JobEvent> {
    let stream = service.stream(id).unwrap();
    tokio::time::timeout(STREAM_TIMEOUT, stream.collect::<Vec<_>>())
        .await
        .expect("stream did not close")
}

fn count(events: &[JobEvent], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind() == kind).count()
}

fn terminal_count(events: &[JobEvent]) -> usize {
    events.iter().filter(|e| e.is_terminal()).count()
}

#[tokio::test]
async fn test_acme_full_run() {
    let service = service(ScriptedPipeline::new());
    let id = service.start("Acme", acme()).unwrap();

    let events = collect(&service, &id).await;

    assert_eq!(events[0].kind(), EventKind::SessionStarted);
    assert_eq!(count(&events, EventKind::AgentComplete), 5);
    assert_eq!(count(&events, EventKind::AgentStarted), 5);
    assert_eq!(count(&events, EventKind::Verdict), 1);
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(events.last().unwrap().kind(), EventKind::Verdict);

    // Stages start in pipeline order
    let started: Vec<StageId> = events
        .iter()
        .filter(|e| e.kind() == EventKind::AgentStarted)
        .filter_map(|e| e.payload.stage())
        .collect();
    assert_eq!(started, STAGE_ORDER.to_vec());

    match service.get_result(&id).unwrap() {
        JobResult::Complete { result } => {
            assert_eq!(result.team_name, "Acme");
            assert!(!result.is_placeholder());
        }
        other => panic!("unexpected result {:?}", other),
    }
}

#[tokio::test]
async fn test_completion_immediately_followed_by_next_start() {
    let service = service(ScriptedPipeline::new());
    let id = service.start("Acme", acme()).unwrap();
    let events = collect(&service, &id).await;

    for (i, event) in events.iter().enumerate() {
        if let EventPayload::AgentComplete { agent, .. } = &event.payload {
            let position = STAGE_ORDER.iter().position(|s| s == agent).unwrap();
            match STAGE_ORDER.get(position + 1) {
                Some(next) => {
                    let following = &events[i + 1];
                    assert_eq!(following.kind(), EventKind::AgentStarted);
                    assert_eq!(following.payload.stage(), Some(*next));
                }
                None => assert_eq!(events[i + 1].kind(), EventKind::Verdict),
            }
        }
    }
}

#[tokio::test]
async fn test_stream_matches_event_log() {
    let service = service(ScriptedPipeline::new().with_step_delay(Duration::from_millis(2)));
    let id = service.start("Acme", acme()).unwrap();

    let streamed = collect(&service, &id).await;
    assert_eq!(streamed, service.events(&id).unwrap());
}

#[tokio::test]
async fn test_failure_during_video_stage() {
    let service = service(ScriptedPipeline::new().failing_at(StageId::Video));
    let id = service.start("Acme", acme()).unwrap();

    let events = collect(&service, &id).await;

    assert_eq!(count(&events, EventKind::Verdict), 0);
    assert_eq!(count(&events, EventKind::Error), 1);
    assert_eq!(count(&events, EventKind::AgentComplete), 3);
    match &events.last().unwrap().payload {
        EventPayload::Error { message } => assert!(message.contains("video")),
        other => panic!("unexpected payload {:?}", other),
    }

    let result = service.get_result(&id).unwrap();
    assert!(matches!(result, JobResult::Error { ref error } if error.contains("video")));
}

#[tokio::test]
async fn test_panic_becomes_error_event() {
    let service = service(ScriptedPipeline::new().panicking_at(StageId::Orchestrator));
    let id = service.start("Acme", acme()).unwrap();

    let events = collect(&service, &id).await;
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(events.last().unwrap().kind(), EventKind::Error);
    assert_eq!(count(&events, EventKind::AgentComplete), 4);
}

#[tokio::test]
async fn test_malformed_output_yields_placeholder_verdict() {
    let service = service(ScriptedPipeline::new().with_malformed_output());
    let id = service.start("Acme", acme()).unwrap();

    let events = collect(&service, &id).await;
    match &events.last().unwrap().payload {
        EventPayload::Verdict { result } => {
            assert!(result.is_placeholder());
            assert_eq!(result.team_name, "Acme");
            assert!(result.raw_output.as_deref().unwrap().contains("confident pitch"));
        }
        other => panic!("unexpected payload {:?}", other),
    }
}

#[tokio::test]
async fn test_late_attach_after_completion() {
    let service = service(ScriptedPipeline::new());
    let id = service.start("Acme", acme()).unwrap();

    // First consumer drains everything, including the terminal event
    let first = collect(&service, &id).await;
    assert_eq!(terminal_count(&first), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;

    let late = collect(&service, &id).await;
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].kind(), EventKind::Verdict);
    assert_eq!(late[0].payload, first.last().unwrap().payload);
}

#[tokio::test]
async fn test_late_attach_is_immediate_with_default_policy() {
    let service = JudgeService::new(Arc::new(ScriptedPipeline::new().with_steps_per_stage(1)));
    assert_eq!(service.policy().poll_interval, Duration::from_millis(500));
    let id = service.start("Acme", acme()).unwrap();

    let job = service.registry().get(&id).unwrap();
    tokio::time::timeout(STREAM_TIMEOUT, async {
        while !job.is_terminal() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job did not finish");
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Backlog plus terminal event, no poll sleep needed
    let started = Instant::now();
    let first = collect(&service, &id).await;
    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(first.last().unwrap().kind(), EventKind::Verdict);

    // Channel already drained: the terminal event is rebuilt from status
    let started = Instant::now();
    let late = collect(&service, &id).await;
    assert!(started.elapsed() < Duration::from_millis(250));
    assert_eq!(late.len(), 1);
    assert_eq!(late[0].kind(), EventKind::Verdict);
}

#[tokio::test]
async fn test_first_attach_after_completion_gets_backlog_once() {
    let service = service(ScriptedPipeline::new());
    let id = service.start("Acme", acme()).unwrap();

    let job = service.registry().get(&id).unwrap();
    tokio::time::timeout(STREAM_TIMEOUT, async {
        while !job.is_terminal() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("job did not finish");

    let events = collect(&service, &id).await;
    assert_eq!(terminal_count(&events), 1);
    assert_eq!(events.last().unwrap().kind(), EventKind::Verdict);
    assert_eq!(count(&events, EventKind::AgentComplete), 5);
}

#[tokio::test]
async fn test_get_result_before_completion() {
    let service = service(ScriptedPipeline::new().with_step_delay(Duration::from_millis(40)));
    let id = service.start("Acme", acme()).unwrap();

    let result = service.get_result(&id).unwrap();
    assert!(result.is_in_progress());
    assert!(result.verdict().is_none());

    let events = collect(&service, &id).await;
    assert_eq!(events.last().unwrap().kind(), EventKind::Verdict);
    assert!(!service.get_result(&id).unwrap().is_in_progress());
}

#[tokio::test]
async fn test_sse_frames() {
    let service = service(ScriptedPipeline::new().with_steps_per_stage(1));
    let id = service.start("Acme", acme()).unwrap();

    let frames: Vec<String> = tokio::time::timeout(
        STREAM_TIMEOUT,
        service.stream_sse(&id).unwrap().collect::<Vec<_>>(),
    )
    .await
    .unwrap();

    assert!(frames.iter().all(|f| f.starts_with("data: ") && f.ends_with("\n\n")));
    let first: serde_json::Value =
        serde_json::from_str(frames[0].trim_start_matches("data: ").trim_end()).unwrap();
    assert_eq!(first["type"], "session_started");
    assert_eq!(first["team_name"], "Acme");
    assert_eq!(first["job_id"], id.as_str());
    assert!(frames.last().unwrap().contains("\"type\":\"verdict\""));
}

#[tokio::test]
async fn test_concurrent_jobs_are_independent() {
    let service = Arc::new(service(ScriptedPipeline::new()));
    let ids: Vec<JobId> = (0..4)
        .map(|i| {
            service
                .start(format!("Team {}", i), Submission::new(format!("Team {}", i), "", ""))
                .unwrap()
        })
        .collect();

    for id in &ids {
        let events = collect(&service, id).await;
        assert_eq!(terminal_count(&events), 1);
        match &events[0].payload {
            EventPayload::SessionStarted { job_id, .. } => assert_eq!(job_id, id),
            other => panic!("unexpected payload {:?}", other),
        }
    }
    assert_eq!(service.list(Some("complete"), 10).len(), 4);
}
