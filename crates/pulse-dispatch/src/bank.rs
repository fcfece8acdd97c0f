//! Question bank: a persistent pool of problems per (topic, difficulty).
//!
//! Items are claimed at most once: a claim is a conditional
//! `used == false → used = true` update, so two overlapping runs racing for
//! the same record cannot both win it. An empty bucket is refilled from the
//! generation gateway once per claim attempt.

use chrono::Utc;
use pulse_core::config::BankConfig;
use pulse_core::error::{PulseError, Result};
use pulse_core::traits::store::{Fields, Filter, Store};
use pulse_core::types::{Bucket, Difficulty, Item, fields};
use pulse_providers::GenerationGateway;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Per-bucket inventory, for the `bank` admin command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketStats {
    pub bucket: Bucket,
    pub unused: usize,
    pub used: usize,
}

pub struct ItemBank {
    store: Arc<dyn Store>,
    gateway: Arc<GenerationGateway>,
    collection: String,
    batch_size: usize,
    claim_window: usize,
}

impl ItemBank {
    pub fn new(
        config: &BankConfig,
        store: Arc<dyn Store>,
        gateway: Arc<GenerationGateway>,
    ) -> Self {
        Self {
            store,
            gateway,
            collection: config.collection.clone(),
            batch_size: config.batch_size.max(1),
            claim_window: config.claim_window.max(1),
        }
    }

    /// Claim one unused item from `bucket`, refilling once if it is empty.
    pub async fn claim(&self, bucket: &Bucket) -> Result<Item> {
        if let Some(item) = self.try_claim(bucket).await? {
            return Ok(item);
        }

        tracing::info!("🧠 Bank empty for {bucket}, refilling...");
        self.refill(bucket).await?;

        match self.try_claim(bucket).await? {
            Some(item) => Ok(item),
            None => Err(PulseError::BankExhausted(bucket.to_string())),
        }
    }

    /// Claim from what is already stored. `None` when no unused item is left.
    async fn try_claim(&self, bucket: &Bucket) -> Result<Option<Item>> {
        let unused = Filter::new()
            .eq(fields::TOPIC, bucket.topic.as_str())
            .eq(fields::DIFFICULTY, bucket.difficulty.as_str())
            .eq(fields::USED, false)
            .limit(self.claim_window);
        let still_unused = Filter::new().eq(fields::USED, false);

        // Every pass either returns or sees all of its candidates flip to
        // used (by us or a concurrent run), so the loop terminates.
        loop {
            let candidates = self.store.query(&self.collection, &unused).await?;
            if candidates.is_empty() {
                return Ok(None);
            }

            for candidate in candidates {
                let now = Utc::now();
                let mut patch = Fields::new();
                patch.insert(fields::USED.into(), Value::Bool(true));
                patch.insert(fields::USED_AT.into(), Value::from(now.to_rfc3339()));

                let won = self
                    .store
                    .update_if_matches(&self.collection, &candidate.id, &still_unused, patch)
                    .await?;
                if !won {
                    tracing::debug!("Lost claim race for {}, trying next", candidate.id);
                    continue;
                }

                match Item::from_record(&candidate) {
                    Ok(mut item) => {
                        item.used = true;
                        item.used_at = Some(now);
                        tracing::info!("📌 Claimed '{}' ({}) for {bucket}", item.title, item.id);
                        return Ok(Some(item));
                    }
                    // Already marked used, so it will not be offered again.
                    Err(e) => tracing::warn!("⚠️ Retired malformed item {}: {e}", candidate.id),
                }
            }
        }
    }

    /// Generate a batch for `bucket` and store it. Returns how many items
    /// were added; malformed entries in the batch are dropped.
    pub async fn refill(&self, bucket: &Bucket) -> Result<usize> {
        let refill_failed = |reason: String| PulseError::RefillFailed {
            bucket: bucket.to_string(),
            reason,
        };

        let prompt = refill_prompt(bucket, self.batch_size);
        let generated = self
            .gateway
            .generate(&prompt, true)
            .await
            .map_err(|e| refill_failed(e.to_string()))?;
        let value = generated
            .into_json()
            .ok_or_else(|| refill_failed("response was not JSON".into()))?;
        let drafts = parse_batch(&value).map_err(refill_failed)?;

        let mut added = 0;
        for draft in drafts.into_iter().take(self.batch_size) {
            self.store
                .insert(&self.collection, draft.into_fields(bucket))
                .await?;
            added += 1;
        }

        tracing::info!("✅ Added {added} problems to {bucket}");
        Ok(added)
    }

    /// Look an item up by id, used or not.
    pub async fn get(&self, id: &str) -> Result<Option<Item>> {
        match self.store.get(&self.collection, id).await? {
            Some(record) => Item::from_record(&record).map(Some),
            None => Ok(None),
        }
    }

    /// Count used and unused items in every bucket present in the store.
    pub async fn stats(&self) -> Result<Vec<BucketStats>> {
        let records = self.store.query(&self.collection, &Filter::new()).await?;
        let mut counts: BTreeMap<Bucket, (usize, usize)> = BTreeMap::new();

        for record in &records {
            let (Some(topic), Some(difficulty)) =
                (record.str(fields::TOPIC), record.str(fields::DIFFICULTY))
            else {
                continue;
            };
            let Ok(difficulty) = difficulty.parse::<Difficulty>() else {
                continue;
            };
            let entry = counts.entry(Bucket::new(topic, difficulty)).or_default();
            if record.bool(fields::USED).unwrap_or(false) {
                entry.1 += 1;
            } else {
                entry.0 += 1;
            }
        }

        Ok(counts
            .into_iter()
            .map(|(bucket, (unused, used))| BucketStats {
                bucket,
                unused,
                used,
            })
            .collect())
    }
}

fn refill_prompt(bucket: &Bucket, count: usize) -> String {
    format!(
        "Generate {count} unique DSA problems for topic '{topic}' at '{difficulty}' difficulty level.\n\
         Return a JSON object with a key 'problems' containing an array of objects.\n\
         Each object MUST have these keys: \"title\", \"description\", \"constraints\", \"examples\", \"link\".\n\
         \"link\" must be the URL of the matching or closest problem on LeetCode.\n\
         Keep descriptions concise and formatted for an email.",
        topic = bucket.topic,
        difficulty = bucket.difficulty,
    )
}

/// One generated problem as the model returns it. Field names vary between
/// models, so the common aliases are accepted.
#[derive(Debug, Deserialize)]
struct RawItem {
    title: String,
    #[serde(alias = "description", alias = "body")]
    statement: String,
    constraints: Value,
    #[serde(alias = "url", alias = "reference")]
    link: String,
    #[serde(default)]
    examples: Option<Value>,
}

/// A validated problem ready to insert.
#[derive(Debug, Clone, PartialEq)]
struct ItemDraft {
    title: String,
    statement: String,
    constraints: String,
    link: String,
    examples: Option<String>,
}

impl ItemDraft {
    fn from_raw(raw: RawItem) -> std::result::Result<Self, String> {
        let title = raw.title.trim().to_string();
        let statement = raw.statement.trim().to_string();
        let link = raw.link.trim().to_string();
        let constraints = text_of(&raw.constraints).unwrap_or_default();

        for (name, value) in [
            ("title", &title),
            ("statement", &statement),
            ("constraints", &constraints),
            ("link", &link),
        ] {
            if value.is_empty() {
                return Err(format!("empty {name}"));
            }
        }

        Ok(Self {
            title,
            statement,
            constraints,
            link,
            examples: raw.examples.as_ref().and_then(text_of),
        })
    }

    fn into_fields(self, bucket: &Bucket) -> Fields {
        let mut f = Fields::new();
        f.insert(fields::TOPIC.into(), Value::from(bucket.topic.as_str()));
        f.insert(fields::DIFFICULTY.into(), Value::from(bucket.difficulty.as_str()));
        f.insert(fields::TITLE.into(), Value::from(self.title));
        f.insert(fields::STATEMENT.into(), Value::from(self.statement));
        f.insert(fields::CONSTRAINTS.into(), Value::from(self.constraints));
        f.insert(fields::LINK.into(), Value::from(self.link));
        if let Some(examples) = self.examples {
            f.insert(fields::EXAMPLES.into(), Value::from(examples));
        }
        f.insert(fields::USED.into(), Value::Bool(false));
        f.insert(fields::CREATED_AT.into(), Value::from(Utc::now().to_rfc3339()));
        f
    }
}

/// Pull the problem list out of a generated batch. Accepts a bare array or
/// an object with a `problems` / `items` array. Malformed entries are
/// dropped; only a missing list is an error.
fn parse_batch(value: &Value) -> std::result::Result<Vec<ItemDraft>, String> {
    let list = match value {
        Value::Array(list) => list,
        Value::Object(obj) => ["problems", "items"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_array))
            .ok_or_else(|| "no problem list in response".to_string())?,
        _ => return Err("unexpected response shape".into()),
    };

    let drafts = list
        .iter()
        .enumerate()
        .filter_map(|(idx, entry)| {
            let draft = serde_json::from_value::<RawItem>(entry.clone())
                .map_err(|e| e.to_string())
                .and_then(ItemDraft::from_raw);
            match draft {
                Ok(d) => Some(d),
                Err(e) => {
                    tracing::warn!("⚠️ Dropping malformed generated problem #{idx}: {e}");
                    None
                }
            }
        })
        .collect();
    Ok(drafts)
}

/// Flatten a loosely-typed JSON value into display text.
fn text_of(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(text_of)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(obj) => obj
            .iter()
            .filter_map(|(k, v)| text_of(v).map(|t| format!("{k}: {t}")))
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}
