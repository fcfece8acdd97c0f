//! Test doubles shared by the dispatch tests.

use async_trait::async_trait;
use pulse_core::error::{PulseError, Result};
use pulse_core::traits::mailer::{Mailer, OutgoingEmail};
use pulse_core::traits::provider::{CompletionRequest, Provider};
use pulse_core::traits::store::Fields;
use pulse_core::types::fields;
use pulse_providers::GenerationGateway;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

type Reply = dyn Fn(&str) -> std::result::Result<String, String> + Send + Sync;

#[derive(Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// Provider whose reply is computed from the prompt.
pub struct FakeProvider {
    name: &'static str,
    reply: Box<Reply>,
    calls: CallCounter,
}

impl FakeProvider {
    pub fn replying(
        name: &'static str,
        reply: impl Fn(&str) -> std::result::Result<String, String> + Send + Sync + 'static,
    ) -> (Box<dyn Provider>, CallCounter) {
        let calls = CallCounter::default();
        let provider = FakeProvider {
            name,
            reply: Box::new(reply),
            calls: calls.clone(),
        };
        (Box::new(provider), calls)
    }

    pub fn failing(name: &'static str) -> (Box<dyn Provider>, CallCounter) {
        Self::replying(name, |_| Err("HTTP 503".into()))
    }
}

#[async_trait]
impl Provider for FakeProvider {
    fn name(&self) -> &str {
        self.name
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.calls.0.fetch_add(1, Ordering::SeqCst);
        (self.reply)(&request.prompt).map_err(PulseError::Provider)
    }
}

pub fn gateway_of(providers: Vec<Box<dyn Provider>>) -> Arc<GenerationGateway> {
    Arc::new(GenerationGateway::new(providers))
}

/// Mailer that records sends and rejects a configured set of recipients.
#[derive(Default)]
pub struct FakeMailer {
    sent: Mutex<Vec<OutgoingEmail>>,
    reject: HashSet<String>,
}

impl FakeMailer {
    pub fn rejecting(addresses: &[&str]) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            reject: addresses.iter().map(|a| a.to_string()).collect(),
        }
    }

    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self) -> Vec<String> {
        self.sent().into_iter().map(|e| e.to).collect()
    }
}

#[async_trait]
impl Mailer for FakeMailer {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send(&self, email: &OutgoingEmail) -> Result<()> {
        if self.reject.contains(&email.to) {
            return Err(PulseError::DeliveryFailed {
                to: email.to.clone(),
                reason: "550 mailbox unavailable".into(),
            });
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// A complete, well-formed bank record.
pub fn bank_record(title: &str, topic: &str, difficulty: &str, used: bool) -> Fields {
    let mut f = Fields::new();
    f.insert(fields::TOPIC.into(), Value::from(topic));
    f.insert(fields::DIFFICULTY.into(), Value::from(difficulty));
    f.insert(fields::TITLE.into(), Value::from(title));
    f.insert(fields::STATEMENT.into(), Value::from(format!("Solve {title}.")));
    f.insert(fields::CONSTRAINTS.into(), Value::from("1 <= n <= 10^5"));
    f.insert(fields::LINK.into(), Value::from("https://leetcode.com/problems/x"));
    f.insert(fields::USED.into(), Value::Bool(used));
    f
}
