use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::EngagementKind;

/// Point values an owner assigns to each engagement signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeightConfiguration {
    pub like: u32,
    pub retweet: u32,
    pub reply: u32,
    pub mention: u32,
}

impl Default for WeightConfiguration {
    fn default() -> Self {
        Self {
            like: 1,
            retweet: 2,
            reply: 3,
            mention: 1,
        }
    }
}

impl WeightConfiguration {
    pub fn new(like: u32, retweet: u32, reply: u32, mention: u32) -> Self {
        Self {
            like,
            retweet,
            reply,
            mention,
        }
    }

    pub fn get(&self, kind: EngagementKind) -> u32 {
        match kind {
            EngagementKind::Like => self.like,
            EngagementKind::Retweet => self.retweet,
            EngagementKind::Reply => self.reply,
            EngagementKind::Mention => self.mention,
        }
    }

    /// Validate a submitted set of point values.
    ///
    /// All four keys must be present, no other key is accepted, and every value must be a
    /// non-negative integer that fits in `u32`.
    pub fn from_point_values(raw: &BTreeMap<String, Value>) -> Result<Self, InvalidWeights> {
        if let Some(key) = raw
            .keys()
            .find(|key| EngagementKind::from_key(key).is_none())
        {
            return Err(InvalidWeights::UnexpectedKey(key.clone()));
        }

        let mut resolved = [0u32; 4];
        for (slot, kind) in resolved.iter_mut().zip(EngagementKind::ALL) {
            let value = raw
                .get(kind.key())
                .ok_or(InvalidWeights::MissingKey(kind.key()))?;
            *slot = point_value(kind, value)?;
        }

        let [like, retweet, reply, mention] = resolved;
        Ok(Self::new(like, retweet, reply, mention))
    }

    /// Key/value view used in API payloads.
    pub fn to_point_values(&self) -> BTreeMap<&'static str, u32> {
        EngagementKind::ALL
            .into_iter()
            .map(|kind| (kind.key(), self.get(kind)))
            .collect()
    }
}

fn point_value(kind: EngagementKind, value: &Value) -> Result<u32, InvalidWeights> {
    let key = kind.key();
    match value {
        Value::Number(number) => {
            if let Some(unsigned) = number.as_u64() {
                u32::try_from(unsigned).map_err(|_| InvalidWeights::OutOfRange {
                    key,
                    value: unsigned,
                })
            } else if let Some(signed) = number.as_i64() {
                Err(InvalidWeights::Negative { key, value: signed })
            } else {
                Err(InvalidWeights::NotAnInteger {
                    key,
                    value: value.to_string(),
                })
            }
        }
        other => Err(InvalidWeights::NotAnInteger {
            key,
            value: other.to_string(),
        }),
    }
}

/// Rejected weight submission; nothing is persisted when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidWeights {
    #[error("missing point value for '{0}'")]
    MissingKey(&'static str),
    #[error("unexpected point value key '{0}'")]
    UnexpectedKey(String),
    #[error("point value for '{key}' must be non-negative, got {value}")]
    Negative { key: &'static str, value: i64 },
    #[error("point value for '{key}' must be an integer, got {value}")]
    NotAnInteger { key: &'static str, value: String },
    #[error("point value for '{key}' is too large: {value}")]
    OutOfRange { key: &'static str, value: u64 },
}
