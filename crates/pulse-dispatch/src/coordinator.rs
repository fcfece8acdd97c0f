//! Dispatch coordinator: one run of one mode, end to end.
//!
//! Flow (challenge): load active subscribers → group by bucket → claim one
//! item per group → mail every member → bump streak and last item.
//! Flow (solution): load → group by (item, language) → generate one
//! solution per group → mail every member.
//!
//! Failures are isolated: a failed group skips its members, a failed send
//! skips one subscriber. Only losing the store while listing subscribers
//! aborts the run.

use chrono::Utc;
use futures::StreamExt;
use pulse_core::config::PulseConfig;
use pulse_core::error::{PulseError, Result};
use pulse_core::traits::mailer::Mailer;
use pulse_core::traits::store::{Fields, Filter, Store};
use pulse_core::types::{
    Bucket, Item, Mode, Solution, Subscriber, SubscriberDefaults, SubscriberStatus, fields,
};
use pulse_providers::GenerationGateway;
use serde_json::Value;
use std::sync::Arc;

use crate::bank::ItemBank;
use crate::grouper::{SolutionKey, group_for_challenge, group_for_solution};
use crate::render;
use crate::solution::{parse_solution, solution_prompt};
use crate::summary::{DispatchFailure, RunSummary};

/// Result of dispatching one group.
#[derive(Debug, Default)]
struct GroupOutcome {
    delivered: usize,
    skipped: usize,
    failures: Vec<DispatchFailure>,
}

impl GroupOutcome {
    /// The whole group is lost: nobody in it gets a message.
    fn abandoned(scope: &str, members: usize, error: &PulseError) -> Self {
        Self {
            delivered: 0,
            skipped: members,
            failures: vec![DispatchFailure::new(scope, error)],
        }
    }
}

pub struct Coordinator {
    store: Arc<dyn Store>,
    gateway: Arc<GenerationGateway>,
    mailer: Arc<dyn Mailer>,
    bank: ItemBank,
    subscriber_collection: String,
    defaults: SubscriberDefaults,
    app_name: String,
    dashboard_url: String,
    max_parallel_groups: usize,
}

impl Coordinator {
    pub fn new(
        config: &PulseConfig,
        store: Arc<dyn Store>,
        gateway: Arc<GenerationGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            bank: ItemBank::new(&config.bank, store.clone(), gateway.clone()),
            store,
            gateway,
            mailer,
            subscriber_collection: config.subscribers.collection.clone(),
            defaults: config.subscribers.defaults(),
            app_name: config.app_name.clone(),
            dashboard_url: config.dashboard_url.clone(),
            max_parallel_groups: config.dispatch.max_parallel_groups.max(1),
        }
    }

    /// Run one mode. `Err` only for failures that make the run meaningless.
    pub async fn run(&self, mode: Mode) -> Result<RunSummary> {
        let mut summary = RunSummary::new(mode);
        tracing::info!("🚀 Starting {mode} dispatch via {}", self.mailer.name());

        let subscribers = self.load_active(&mut summary).await?;
        summary.subscribers = subscribers.len();

        let outcomes = match mode {
            Mode::Challenge => {
                let groups = group_for_challenge(&subscribers);
                summary.groups = groups.len();
                futures::stream::iter(groups)
                    .map(|(bucket, members)| self.challenge_group(bucket, members))
                    .buffered(self.max_parallel_groups)
                    .collect::<Vec<_>>()
                    .await
            }
            Mode::Solution => {
                let groups = group_for_solution(&subscribers);
                summary.groups = groups.len();
                summary.skipped += subscribers.len() - groups.member_count();
                futures::stream::iter(groups)
                    .map(|(key, members)| self.solution_group(key, members))
                    .buffered(self.max_parallel_groups)
                    .collect::<Vec<_>>()
                    .await
            }
        };

        for outcome in outcomes {
            summary.delivered += outcome.delivered;
            summary.skipped += outcome.skipped;
            summary.failures.extend(outcome.failures);
        }
        summary.finish();

        tracing::info!("📊 {summary}");
        Ok(summary)
    }

    /// Active subscribers with usable records. Records that fail validation
    /// are reported and skipped; a store error here is fatal.
    async fn load_active(&self, summary: &mut RunSummary) -> Result<Vec<Subscriber>> {
        let filter = Filter::new().eq(fields::STATUS, SubscriberStatus::Active.as_str());
        let records = self
            .store
            .query(&self.subscriber_collection, &filter)
            .await
            .map_err(|e| match e {
                PulseError::StoreUnavailable(_) => e,
                other => PulseError::StoreUnavailable(other.to_string()),
            })?;

        let mut subscribers = Vec::with_capacity(records.len());
        for record in &records {
            match Subscriber::from_record(record, &self.defaults) {
                Ok(sub) => subscribers.push(sub),
                Err(e) => {
                    tracing::warn!("⚠️ Skipping subscriber {}: {e}", record.id);
                    summary.record(format!("subscriber {}", record.id), &e);
                    summary.skipped += 1;
                }
            }
        }
        Ok(subscribers)
    }

    async fn challenge_group(&self, bucket: Bucket, members: Vec<Subscriber>) -> GroupOutcome {
        let scope = bucket.to_string();
        let item = match self.bank.claim(&bucket).await {
            Ok(item) => item,
            Err(e) => {
                tracing::error!(
                    "❌ No problem for {scope}, skipping {} subscribers: {e}",
                    members.len()
                );
                return GroupOutcome::abandoned(&scope, members.len(), &e);
            }
        };

        let mut outcome = GroupOutcome::default();
        for sub in &members {
            let email = render::challenge_email(&self.app_name, &self.dashboard_url, sub, &item);
            if let Err(e) = self.mailer.send(&email).await {
                tracing::warn!("⚠️ Challenge to {} failed: {e}", sub.email);
                outcome.failures.push(DispatchFailure::new(sub.email.as_str(), &e));
                outcome.skipped += 1;
                continue;
            }
            outcome.delivered += 1;

            if let Err(e) = self.record_progress(sub, &item).await {
                tracing::warn!("⚠️ Sent to {} but progress not saved: {e}", sub.email);
                outcome.failures.push(DispatchFailure::new(sub.email.as_str(), &e));
            }
        }
        outcome
    }

    /// Bump the streak and remember the item for the evening run.
    async fn record_progress(&self, sub: &Subscriber, item: &Item) -> Result<()> {
        let mut patch = Fields::new();
        patch.insert(fields::STREAK.into(), Value::from(sub.streak.saturating_add(1)));
        patch.insert(fields::LAST_ITEM_ID.into(), Value::from(item.id.as_str()));
        patch.insert(fields::LAST_SENT_AT.into(), Value::from(Utc::now().to_rfc3339()));

        let applied = self
            .store
            .update_if_matches(&self.subscriber_collection, &sub.id, &Filter::new(), patch)
            .await?;
        if !applied {
            tracing::debug!("Subscriber {} vanished before progress update", sub.id);
        }
        Ok(())
    }

    async fn solution_group(&self, key: SolutionKey, members: Vec<Subscriber>) -> GroupOutcome {
        let scope = key.to_string();
        let prepared = match self.bank.get(&key.item_id).await {
            Ok(Some(item)) => self
                .generate_solution(&item, &key.language)
                .await
                .map(|solution| (item, solution)),
            Ok(None) => Err(PulseError::InvalidRecord(format!(
                "item {} no longer exists",
                key.item_id
            ))),
            Err(e) => Err(e),
        };
        let (item, solution) = match prepared {
            Ok(pair) => pair,
            Err(e) => {
                tracing::error!(
                    "❌ No solution for {scope}, skipping {} subscribers: {e}",
                    members.len()
                );
                return GroupOutcome::abandoned(&scope, members.len(), &e);
            }
        };

        let mut outcome = GroupOutcome::default();
        for sub in &members {
            let email = render::solution_email(sub, &item, &solution);
            match self.mailer.send(&email).await {
                Ok(()) => outcome.delivered += 1,
                Err(e) => {
                    tracing::warn!("⚠️ Solution to {} failed: {e}", sub.email);
                    outcome.failures.push(DispatchFailure::new(sub.email.as_str(), &e));
                    outcome.skipped += 1;
                }
            }
        }
        outcome
    }

    async fn generate_solution(&self, item: &Item, language: &str) -> Result<Solution> {
        let prompt = solution_prompt(item, language);
        let generated = self.gateway.generate(&prompt, true).await?;
        let value = generated.into_json().ok_or_else(|| {
            PulseError::GenerationUnavailable("solution response was not JSON".into())
        })?;
        parse_solution(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeMailer, FakeProvider, bank_record, gateway_of};
    use pulse_core::traits::provider::Provider;
    use pulse_core::types::Difficulty;
    use pulse_store::MemoryStore;
    use serde_json::json;

    const SUBS: &str = "subscribers";
    const BANK: &str = "question_bank";

    fn config() -> PulseConfig {
        PulseConfig::default()
    }

    fn build(
        store: &Arc<MemoryStore>,
        providers: Vec<Box<dyn Provider>>,
        mailer: &Arc<FakeMailer>,
    ) -> Coordinator {
        Coordinator::new(&config(), store.clone(), gateway_of(providers), mailer.clone())
    }

    async fn enroll(
        store: &MemoryStore,
        email: &str,
        topic: &str,
        difficulty: Difficulty,
        lang: &str,
    ) -> String {
        store
            .insert(SUBS, Subscriber::new_fields(email, topic, difficulty, lang))
            .await
            .unwrap()
    }

    async fn subscriber(store: &MemoryStore, id: &str) -> Subscriber {
        let record = store.get(SUBS, id).await.unwrap().unwrap();
        Subscriber::from_record(&record, &SubscriberDefaults::default()).unwrap()
    }

    fn solution_reply(prompt: &str) -> std::result::Result<String, String> {
        let language = if prompt.contains("in Rust") { "Rust" } else { "Python" };
        Ok(json!({
            "approach": format!("{language} approach"),
            "code": "...",
            "complexity": {"time": "O(n)", "space": "O(1)"}
        })
        .to_string())
    }

    #[tokio::test]
    async fn test_streak_saturates() {
        let store = Arc::new(MemoryStore::new());
        store.insert(BANK, bank_record("Two Sum", "Arrays", "Easy", false)).await.unwrap();
        let a = enroll(&store, "a@x.io", "Arrays", Difficulty::Easy, "Python").await;
        let mut patch = Fields::new();
        patch.insert(fields::STREAK.into(), Value::from(u64::MAX));
        store.update_if_matches(SUBS, &a, &Filter::new(), patch).await.unwrap();

        let mailer = Arc::new(FakeMailer::default());
        let (provider, _) = FakeProvider::failing("gemini");
        let summary = build(&store, vec![provider], &mailer).run(Mode::Challenge).await.unwrap();

        assert_eq!(summary.delivered, 1);
        assert!(summary.is_clean());
        assert_eq!(subscriber(&store, &a).await.streak, u64::MAX);
    }

    #[tokio::test]
    async fn test_challenge_delivery_failure_is_isolated() {
        let store = Arc::new(MemoryStore::new());
        store.insert(BANK, bank_record("Two Sum", "Arrays", "Easy", false)).await.unwrap();
        let a = enroll(&store, "a@x.io", "Arrays", Difficulty::Easy, "Python").await;
        let b = enroll(&store, "b@x.io", "Arrays", Difficulty::Easy, "Python").await;
        let c = enroll(&store, "c@x.io", "Arrays", Difficulty::Easy, "Python").await;

        let mailer = Arc::new(FakeMailer::rejecting(&["b@x.io"]));
        let (provider, calls) = FakeProvider::failing("gemini");
        let coordinator = build(&store, vec![provider], &mailer);

        let summary = coordinator.run(Mode::Challenge).await.unwrap();
        assert_eq!(summary.subscribers, 3);
        assert_eq!(summary.groups, 1);
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].scope, "b@x.io");
        assert_eq!(summary.failures[0].kind, "delivery_failed");
        assert_eq!(calls.count(), 0);
        assert_eq!(mailer.sent_to(), vec!["a@x.io", "c@x.io"]);

        let (sa, sb, sc) = (
            subscriber(&store, &a).await,
            subscriber(&store, &b).await,
            subscriber(&store, &c).await,
        );
        assert_eq!((sa.streak, sb.streak, sc.streak), (1, 0, 1));
        assert!(sa.last_item_id.is_some());
        assert_eq!(sa.last_item_id, sc.last_item_id);
        assert!(sb.last_item_id.is_none());
        assert!(sa.last_sent_at.is_some());
    }

    #[tokio::test]
    async fn test_challenge_one_claim_per_group() {
        let store = Arc::new(MemoryStore::new());
        store.insert(BANK, bank_record("Two Sum", "Arrays", "Easy", false)).await.unwrap();
        store.insert(BANK, bank_record("Valid BST", "Trees", "Hard", false)).await.unwrap();
        store.insert(BANK, bank_record("Three Sum", "Arrays", "Easy", false)).await.unwrap();
        enroll(&store, "a@x.io", "Arrays", Difficulty::Easy, "Python").await;
        enroll(&store, "b@x.io", "Trees", Difficulty::Hard, "Rust").await;
        enroll(&store, "c@x.io", "Arrays", Difficulty::Easy, "Java").await;

        let mailer = Arc::new(FakeMailer::default());
        let (provider, _) = FakeProvider::failing("gemini");
        let coordinator = build(&store, vec![provider], &mailer);

        let summary = coordinator.run(Mode::Challenge).await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.groups, 2);
        assert_eq!(summary.delivered, 3);

        let subjects: Vec<String> = mailer.sent().into_iter().map(|e| e.subject).collect();
        assert_eq!(subjects.iter().filter(|s| s.ends_with("Two Sum")).count(), 2);
        assert_eq!(subjects.iter().filter(|s| s.ends_with("Valid BST")).count(), 1);

        // "Three Sum" stays in the bank for tomorrow
        let unused = store.query(BANK, &Filter::new().eq(fields::USED, false)).await.unwrap();
        assert_eq!(unused.len(), 1);
        assert_eq!(unused[0].str(fields::TITLE), Some("Three Sum"));
    }

    #[tokio::test]
    async fn test_exhausted_bucket_skips_only_its_group() {
        let store = Arc::new(MemoryStore::new());
        store.insert(BANK, bank_record("Two Sum", "Arrays", "Easy", false)).await.unwrap();
        enroll(&store, "a@x.io", "Arrays", Difficulty::Easy, "Python").await;
        enroll(&store, "b@x.io", "Graphs", Difficulty::Hard, "Python").await;

        let mailer = Arc::new(FakeMailer::default());
        let (provider, calls) = FakeProvider::failing("gemini");
        let coordinator = build(&store, vec![provider], &mailer);

        let summary = coordinator.run(Mode::Challenge).await.unwrap();
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failures[0].scope, "Graphs/Hard");
        assert_eq!(summary.failures[0].kind, "refill_failed");
        assert_eq!(calls.count(), 1);
        assert_eq!(mailer.sent_to(), vec!["a@x.io"]);
    }

    #[tokio::test]
    async fn test_cancelled_subscribers_get_nothing() {
        let store = Arc::new(MemoryStore::new());
        store.insert(BANK, bank_record("Two Sum", "Arrays", "Easy", false)).await.unwrap();
        let id = enroll(&store, "a@x.io", "Arrays", Difficulty::Easy, "Python").await;
        let mut cancel = Fields::new();
        cancel.insert(fields::STATUS.into(), Value::from("cancelled"));
        store.update_if_matches(SUBS, &id, &Filter::new(), cancel).await.unwrap();

        let mailer = Arc::new(FakeMailer::default());
        let (provider, _) = FakeProvider::failing("gemini");
        let coordinator = build(&store, vec![provider], &mailer);

        let summary = coordinator.run(Mode::Challenge).await.unwrap();
        assert_eq!(summary.subscribers, 0);
        assert!(mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_solution_generation_failure_is_isolated() {
        let store = Arc::new(MemoryStore::new());
        let item = store
            .insert(BANK, bank_record("Two Sum", "Arrays", "Easy", true))
            .await
            .unwrap();
        for (email, lang) in [("py1@x.io", "Python"), ("rs@x.io", "Rust"), ("py2@x.io", "Python")] {
            let mut f = Subscriber::new_fields(email, "Arrays", Difficulty::Easy, lang);
            f.insert(fields::LAST_ITEM_ID.into(), Value::from(item.as_str()));
            f.insert(fields::STREAK.into(), Value::from(4));
            store.insert(SUBS, f).await.unwrap();
        }
        // Never received a challenge, so there is nothing to solve
        enroll(&store, "new@x.io", "Arrays", Difficulty::Easy, "Python").await;

        let (provider, calls) = FakeProvider::replying("gemini", |prompt| {
            if prompt.contains("in Rust") {
                Err("HTTP 500".into())
            } else {
                solution_reply(prompt)
            }
        });
        let mailer = Arc::new(FakeMailer::default());
        let coordinator = build(&store, vec![provider], &mailer);

        let summary = coordinator.run(Mode::Solution).await.unwrap();
        assert_eq!(summary.groups, 2);
        assert_eq!(summary.delivered, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].kind, "generation_unavailable");
        assert!(summary.failures[0].scope.ends_with("/Rust"));

        // One generation per group, not per subscriber
        assert_eq!(calls.count(), 2);
        assert_eq!(mailer.sent_to(), vec!["py1@x.io", "py2@x.io"]);
        let sent = mailer.sent();
        assert!(sent[0].html_body.contains("Day 4 Complete"));
        assert!(sent[0].html_body.contains("Python approach"));
    }

    #[tokio::test]
    async fn test_solution_falls_back_to_second_provider() {
        let store = Arc::new(MemoryStore::new());
        let item = store
            .insert(BANK, bank_record("Two Sum", "Arrays", "Easy", true))
            .await
            .unwrap();
        let mut f = Subscriber::new_fields("a@x.io", "Arrays", Difficulty::Easy, "Python");
        f.insert(fields::LAST_ITEM_ID.into(), Value::from(item.as_str()));
        store.insert(SUBS, f).await.unwrap();

        let (primary, primary_calls) =
            FakeProvider::replying("gemini", |_| Ok("not json at all".into()));
        let (fallback, fallback_calls) = FakeProvider::replying("groq", solution_reply);
        let mailer = Arc::new(FakeMailer::default());
        let coordinator = build(&store, vec![primary, fallback], &mailer);

        let summary = coordinator.run(Mode::Solution).await.unwrap();
        assert_eq!(summary.delivered, 1);
        assert_eq!((primary_calls.count(), fallback_calls.count()), (1, 1));
    }

    #[tokio::test]
    async fn test_missing_item_skips_group() {
        let store = Arc::new(MemoryStore::new());
        let mut f = Subscriber::new_fields("a@x.io", "Arrays", Difficulty::Easy, "Python");
        f.insert(fields::LAST_ITEM_ID.into(), Value::from("gone"));
        store.insert(SUBS, f).await.unwrap();

        let (provider, calls) = FakeProvider::replying("gemini", solution_reply);
        let mailer = Arc::new(FakeMailer::default());
        let coordinator = build(&store, vec![provider], &mailer);

        let summary = coordinator.run(Mode::Solution).await.unwrap();
        assert_eq!(summary.delivered, 0);
        assert_eq!(summary.failures[0].kind, "invalid_record");
        assert_eq!(calls.count(), 0);
    }

    #[tokio::test]
    async fn test_invalid_subscriber_record_is_reported() {
        let store = Arc::new(MemoryStore::new());
        store.insert(BANK, bank_record("Two Sum", "Arrays", "Easy", false)).await.unwrap();
        enroll(&store, "a@x.io", "Arrays", Difficulty::Easy, "Python").await;
        let mut broken = Fields::new();
        broken.insert(fields::STATUS.into(), Value::from("active"));
        store.insert(SUBS, broken).await.unwrap();

        let mailer = Arc::new(FakeMailer::default());
        let (provider, _) = FakeProvider::failing("gemini");
        let coordinator = build(&store, vec![provider], &mailer);

        let summary = coordinator.run(Mode::Challenge).await.unwrap();
        assert_eq!(summary.subscribers, 1);
        assert_eq!(summary.delivered, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failures[0].kind, "invalid_record");
    }

    #[tokio::test]
    async fn test_store_unavailable_is_fatal() {
        let store = Arc::new(MemoryStore::new());
        store.set_offline(true);
        let mailer = Arc::new(FakeMailer::default());
        let (provider, _) = FakeProvider::failing("gemini");
        let coordinator = Coordinator::new(&config(), store, gateway_of(vec![provider]), mailer);

        let err = coordinator.run(Mode::Challenge).await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_parallel_groups_dispatch_everyone() {
        let store = Arc::new(MemoryStore::new());
        let topics = ["Arrays", "Trees", "Graphs", "Heaps"];
        for topic in topics {
            store
                .insert(BANK, bank_record(&format!("{topic} 1"), topic, "Medium", false))
                .await
                .unwrap();
            let email = format!("{}@x.io", topic.to_lowercase());
            enroll(&store, &email, topic, Difficulty::Medium, "Go").await;
        }

        let mut cfg = config();
        cfg.dispatch.max_parallel_groups = 3;
        let mailer = Arc::new(FakeMailer::default());
        let (provider, _) = FakeProvider::failing("gemini");
        let coordinator =
            Coordinator::new(&cfg, store.clone(), gateway_of(vec![provider]), mailer.clone());

        let summary = coordinator.run(Mode::Challenge).await.unwrap();
        assert!(summary.is_clean());
        assert_eq!(summary.groups, 4);
        assert_eq!(summary.delivered, 4);
        assert_eq!(mailer.sent().len(), 4);
    }
}
