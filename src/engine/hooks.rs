use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::engine::types::QuestStatus;

/// The fixed event vocabulary. Registration is additive; emission invokes
/// subscribers in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookKind {
    QuestStarted,
    QuestFinished,
    LordInvoked,
    LordCompleted,
    LordError,
}

/// A read-only snapshot handed to subscribers. They must not mutate quest
/// state from this payload.
#[derive(Debug, Clone)]
pub struct HookPayload {
    pub quest_id: String,
    pub quest_type: String,
    pub status: QuestStatus,
    pub worker_name: Option<String>,
    pub tool_name: Option<String>,
    pub data: Option<Value>,
    pub error: Option<String>,
}

/// A subscriber that suspends while handling an event. Synchronous
/// subscribers are plain closures; this trait exists for the cooperating
/// kind the design notes call out.
#[async_trait]
pub trait AsyncHookSubscriber: Send + Sync {
    async fn handle(&self, payload: &HookPayload);
}

enum Subscriber {
    Sync(Arc<dyn Fn(&HookPayload) + Send + Sync>),
    Async(Arc<dyn AsyncHookSubscriber>),
}

/// Dispatches lifecycle events to registered subscribers. Exceptions
/// (panics) from a subscriber are caught and logged; they never affect the
/// quest's execution outcome.
#[derive(Default)]
pub struct HookBus {
    subscribers: HashMap<HookKind, Vec<Subscriber>>,
}

impl HookBus {
    pub fn new() -> Self {
        HookBus::default()
    }

    pub fn register_sync(&mut self, kind: HookKind, subscriber: impl Fn(&HookPayload) + Send + Sync + 'static) {
        self.subscribers
            .entry(kind)
            .or_default()
            .push(Subscriber::Sync(Arc::new(subscriber)));
    }

    pub fn register_async(&mut self, kind: HookKind, subscriber: Arc<dyn AsyncHookSubscriber>) {
        self.subscribers.entry(kind).or_default().push(Subscriber::Async(subscriber));
    }

    pub async fn emit(&self, kind: HookKind, payload: HookPayload) {
        let Some(subs) = self.subscribers.get(&kind) else {
            return;
        };
        for sub in subs {
            match sub {
                Subscriber::Sync(f) => {
                    let f = f.clone();
                    let payload = payload.clone();
                    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| f(&payload)));
                    if outcome.is_err() {
                        tracing::error!(event = ?kind, quest_id = %payload.quest_id, "synchronous hook subscriber panicked");
                    }
                }
                Subscriber::Async(sub) => {
                    let sub = sub.clone();
                    let payload = payload.clone();
                    let quest_id = payload.quest_id.clone();
                    let handle = tokio::spawn(async move { sub.handle(&payload).await });
                    if let Err(e) = handle.await {
                        tracing::error!(event = ?kind, quest_id = %quest_id, error = %e, "asynchronous hook subscriber panicked");
                    }
                }
            }
        }
    }
}
