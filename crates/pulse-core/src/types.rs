//! Domain types: items, subscribers, buckets and run modes.
//!
//! Store records are schemaless field maps. Everything crossing into the
//! dispatch logic goes through `from_record`, which rejects records missing
//! required fields instead of trusting their shape at use-time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{PulseError, Result};
use crate::traits::store::{Fields, Record};

/// Field names shared by stores, the bank and the coordinator.
pub mod fields {
    pub const TOPIC: &str = "topic";
    pub const DIFFICULTY: &str = "difficulty";
    pub const TITLE: &str = "title";
    pub const STATEMENT: &str = "statement";
    pub const CONSTRAINTS: &str = "constraints";
    pub const LINK: &str = "link";
    pub const EXAMPLES: &str = "examples";
    pub const USED: &str = "used";
    pub const USED_AT: &str = "used_at";
    pub const CREATED_AT: &str = "created_at";

    pub const EMAIL: &str = "email";
    pub const LANGUAGE: &str = "language";
    pub const STREAK: &str = "streak";
    pub const STATUS: &str = "status";
    pub const LAST_ITEM_ID: &str = "last_item_id";
    pub const LAST_SENT_AT: &str = "last_sent_at";
}

/// Item difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = PulseError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(PulseError::InvalidRecord(format!("unknown difficulty '{other}'"))),
        }
    }
}

/// A (topic, difficulty) partition of the question bank.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Bucket {
    pub topic: String,
    pub difficulty: Difficulty,
}

impl Bucket {
    pub fn new(topic: impl Into<String>, difficulty: Difficulty) -> Self {
        Self {
            topic: topic.into(),
            difficulty,
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.topic, self.difficulty)
    }
}

/// Which half of the daily cycle a run performs. Selected once per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Morning: claim a problem per bucket and send it.
    Challenge,
    /// Evening: generate and send the solution to the morning problem.
    Solution,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Challenge => write!(f, "challenge"),
            Mode::Solution => write!(f, "solution"),
        }
    }
}

impl FromStr for Mode {
    type Err = PulseError;

    /// Accepts `challenge` (alias `morning`) and `solution`, ignoring case and
    /// leading dashes.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('-').to_ascii_lowercase().as_str() {
            "challenge" | "morning" => Ok(Mode::Challenge),
            "solution" | "evening" => Ok(Mode::Solution),
            other => Err(PulseError::Config(format!("unknown mode '{other}'"))),
        }
    }
}

/// One problem in the question bank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub title: String,
    pub statement: String,
    pub constraints: String,
    /// External reference link (problem page).
    pub link: String,
    pub examples: Option<String>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

impl Item {
    pub fn bucket(&self) -> Bucket {
        Bucket::new(self.topic.clone(), self.difficulty)
    }

    pub fn from_record(record: &Record) -> Result<Self> {
        let difficulty = required_str(record, fields::DIFFICULTY)?.parse()?;
        Ok(Self {
            id: record.id.clone(),
            topic: required_str(record, fields::TOPIC)?.to_string(),
            difficulty,
            title: required_str(record, fields::TITLE)?.to_string(),
            statement: required_str(record, fields::STATEMENT)?.to_string(),
            constraints: required_str(record, fields::CONSTRAINTS)?.to_string(),
            link: required_str(record, fields::LINK)?.to_string(),
            examples: record.str(fields::EXAMPLES).map(String::from),
            used: record.bool(fields::USED).unwrap_or(false),
            created_at: record.timestamp(fields::CREATED_AT).unwrap_or_else(Utc::now),
            used_at: record.timestamp(fields::USED_AT),
        })
    }
}

/// Subscriber lifecycle state. Only `Active` subscribers take part in dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriberStatus {
    Active,
    Cancelled,
}

impl SubscriberStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriberStatus::Active => "active",
            SubscriberStatus::Cancelled => "cancelled",
        }
    }
}

/// Preferences applied when a subscriber record leaves one out.
#[derive(Debug, Clone)]
pub struct SubscriberDefaults {
    pub topic: String,
    pub difficulty: Difficulty,
    pub language: String,
}

impl Default for SubscriberDefaults {
    fn default() -> Self {
        Self {
            topic: "Arrays".into(),
            difficulty: Difficulty::Medium,
            language: "Python".into(),
        }
    }
}

/// A mail recipient and their learning preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: String,
    pub email: String,
    pub topic: String,
    pub difficulty: Difficulty,
    pub language: String,
    pub streak: u64,
    pub status: SubscriberStatus,
    /// Weak reference to the last item sent in challenge mode.
    pub last_item_id: Option<String>,
    pub last_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Subscriber {
    pub fn is_active(&self) -> bool {
        self.status == SubscriberStatus::Active
    }

    pub fn bucket(&self) -> Bucket {
        Bucket::new(self.topic.clone(), self.difficulty)
    }

    pub fn from_record(record: &Record, defaults: &SubscriberDefaults) -> Result<Self> {
        let email = required_str(record, fields::EMAIL)?.trim().to_string();
        let topic = non_empty(record.str(fields::TOPIC)).unwrap_or(defaults.topic.as_str());
        let difficulty = match non_empty(record.str(fields::DIFFICULTY)) {
            Some(d) => d.parse()?,
            None => defaults.difficulty,
        };
        let language =
            non_empty(record.str(fields::LANGUAGE)).unwrap_or(defaults.language.as_str());
        let status = match record.str(fields::STATUS) {
            Some("active") => SubscriberStatus::Active,
            _ => SubscriberStatus::Cancelled,
        };

        Ok(Self {
            id: record.id.clone(),
            email,
            topic: topic.to_string(),
            difficulty,
            language: language.to_string(),
            streak: record.u64(fields::STREAK).unwrap_or(0),
            status,
            last_item_id: non_empty(record.str(fields::LAST_ITEM_ID)).map(String::from),
            last_sent_at: record.timestamp(fields::LAST_SENT_AT),
            created_at: record.timestamp(fields::CREATED_AT).unwrap_or_else(Utc::now),
        })
    }

    /// Field map for a newly enrolled subscriber.
    pub fn new_fields(email: &str, topic: &str, difficulty: Difficulty, language: &str) -> Fields {
        let mut f = Fields::new();
        f.insert(fields::EMAIL.into(), Value::from(email));
        f.insert(fields::TOPIC.into(), Value::from(topic));
        f.insert(fields::DIFFICULTY.into(), Value::from(difficulty.as_str()));
        f.insert(fields::LANGUAGE.into(), Value::from(language));
        f.insert(fields::STREAK.into(), Value::from(0u64));
        f.insert(fields::STATUS.into(), Value::from(SubscriberStatus::Active.as_str()));
        f.insert(fields::CREATED_AT.into(), Value::from(Utc::now().to_rfc3339()));
        f
    }
}

/// Generated answer for one (item, language) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub approach: String,
    pub code: String,
    pub time_complexity: String,
    pub space_complexity: String,
}

fn required_str<'a>(record: &'a Record, key: &str) -> Result<&'a str> {
    non_empty(record.str(key)).ok_or_else(|| {
        PulseError::InvalidRecord(format!("record {} is missing '{key}'", record.id))
    })
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, value: Value) -> Record {
        Record {
            id: id.into(),
            fields: value.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("challenge".parse::<Mode>().unwrap(), Mode::Challenge);
        assert_eq!("--MORNING".parse::<Mode>().unwrap(), Mode::Challenge);
        assert_eq!("Solution".parse::<Mode>().unwrap(), Mode::Solution);
        assert!("--MODE".parse::<Mode>().is_err());
    }

    #[test]
    fn test_difficulty_parsing() {
        assert_eq!("hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert_eq!(" Easy ".parse::<Difficulty>().unwrap(), Difficulty::Easy);
        assert!("extreme".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_item_requires_fields() {
        let ok = record(
            "i1",
            json!({
                "topic": "Arrays", "difficulty": "Easy", "title": "Two Sum",
                "statement": "Find two numbers.", "constraints": "n <= 10^4",
                "link": "https://leetcode.com/problems/two-sum", "used": false
            }),
        );
        let item = Item::from_record(&ok).unwrap();
        assert_eq!(item.bucket(), Bucket::new("Arrays", Difficulty::Easy));
        assert!(!item.used);

        let missing = record("i2", json!({"topic": "Arrays", "difficulty": "Easy", "title": "x"}));
        assert!(matches!(
            Item::from_record(&missing),
            Err(PulseError::InvalidRecord(_))
        ));
    }

    #[test]
    fn test_large_streak_is_kept_whole() {
        let rec = record("s2", json!({"email": "a@example.com", "streak": 5_000_000_000u64}));
        let sub = Subscriber::from_record(&rec, &SubscriberDefaults::default()).unwrap();
        assert_eq!(sub.streak, 5_000_000_000);
    }

    #[test]
    fn test_subscriber_defaults_applied() {
        let rec = record("s1", json!({"email": "a@example.com", "status": "active"}));
        let sub = Subscriber::from_record(&rec, &SubscriberDefaults::default()).unwrap();
        assert_eq!(sub.topic, "Arrays");
        assert_eq!(sub.difficulty, Difficulty::Medium);
        assert_eq!(sub.language, "Python");
        assert_eq!(sub.streak, 0);
        assert!(sub.is_active());
        assert!(sub.last_item_id.is_none());
    }

    #[test]
    fn test_subscriber_without_email_rejected() {
        let rec = record("s2", json!({"status": "active", "topic": "Graphs"}));
        assert!(Subscriber::from_record(&rec, &SubscriberDefaults::default()).is_err());
    }

    #[test]
    fn test_unknown_status_is_not_active() {
        let rec = record("s3", json!({"email": "c@example.com", "status": "paused"}));
        let sub = Subscriber::from_record(&rec, &SubscriberDefaults::default()).unwrap();
        assert!(!sub.is_active());
    }
}
