//! Integration tests for the lifecycle hook bus.

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use quester::engine::hooks::{AsyncHookSubscriber, HookBus, HookKind, HookPayload};
use quester::engine::types::QuestStatus;

fn payload(quest_id: &str) -> HookPayload {
    HookPayload {
        quest_id: quest_id.to_string(),
        quest_type: "design_microservice".to_string(),
        status: QuestStatus::Running,
        worker_name: Some("architect".to_string()),
        tool_name: Some("design_system".to_string()),
        data: None,
        error: None,
    }
}

#[tokio::test]
async fn subscribers_fire_in_registration_order() {
    let mut bus = HookBus::new();
    let order = Arc::new(Mutex::new(Vec::new()));

    let o1 = order.clone();
    bus.register_sync(HookKind::QuestStarted, move |_| {
        o1.lock().unwrap().push(1);
    });
    let o2 = order.clone();
    bus.register_sync(HookKind::QuestStarted, move |_| {
        o2.lock().unwrap().push(2);
    });

    bus.emit(HookKind::QuestStarted, payload("q1")).await;
    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn a_panicking_subscriber_does_not_stop_later_subscribers() {
    let mut bus = HookBus::new();
    let fired = Arc::new(AtomicU32::new(0));
    bus.register_sync(HookKind::LordError, |_| panic!("subscriber exploded"));
    let f = fired.clone();
    bus.register_sync(HookKind::LordError, move |_| {
        f.fetch_add(1, Ordering::SeqCst);
    });

    bus.emit(HookKind::LordError, payload("q1")).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

struct RecordingSubscriber(Arc<AtomicU32>);

#[async_trait]
impl AsyncHookSubscriber for RecordingSubscriber {
    async fn handle(&self, _payload: &HookPayload) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn async_subscribers_are_awaited_before_emit_returns() {
    let mut bus = HookBus::new();
    let count = Arc::new(AtomicU32::new(0));
    bus.register_async(HookKind::QuestFinished, Arc::new(RecordingSubscriber(count.clone())));
    bus.emit(HookKind::QuestFinished, payload("q1")).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
