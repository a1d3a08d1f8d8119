use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for the account that owns records and weights.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier assigned to a record when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

/// Source post identifier; synthetic for aggregate summary rows.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostId(pub String);

/// The four engagement signals a score is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Like,
    Retweet,
    Reply,
    Mention,
}

impl EngagementKind {
    pub const ALL: [EngagementKind; 4] = [
        EngagementKind::Like,
        EngagementKind::Retweet,
        EngagementKind::Reply,
        EngagementKind::Mention,
    ];

    /// Key used for this kind in stored and submitted point values.
    pub fn key(self) -> &'static str {
        match self {
            EngagementKind::Like => "like",
            EngagementKind::Retweet => "retweet",
            EngagementKind::Reply => "reply",
            EngagementKind::Mention => "mention",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    pub fn plural_label(self) -> &'static str {
        match self {
            EngagementKind::Like => "likes",
            EngagementKind::Retweet => "retweets",
            EngagementKind::Reply => "replies",
            EngagementKind::Mention => "mentions",
        }
    }
}

/// Raw per-post counts as reported by the export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub mentions: u64,
}

impl EngagementCounts {
    pub fn new(likes: u64, retweets: u64, replies: u64, mentions: u64) -> Self {
        Self {
            likes,
            retweets,
            replies,
            mentions,
        }
    }

    pub fn get(&self, kind: EngagementKind) -> u64 {
        match kind {
            EngagementKind::Like => self.likes,
            EngagementKind::Retweet => self.retweets,
            EngagementKind::Reply => self.replies,
            EngagementKind::Mention => self.mentions,
        }
    }
}

/// Per-post engagement snapshot owned by a single account.
///
/// The natural key is `(post_id, owner_id)`; storing a record with an existing natural key
/// replaces the earlier one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementRecord {
    pub id: RecordId,
    pub owner_id: OwnerId,
    pub post_id: PostId,
    pub text: Option<String>,
    pub counts: EngagementCounts,
    pub engagement_score: u64,
    pub posted_at: Option<NaiveDateTime>,
    pub fetched_at: DateTime<Utc>,
}

impl EngagementRecord {
    /// New, not yet scored record stamped with the current instant.
    pub fn unscored(
        owner_id: OwnerId,
        post_id: PostId,
        text: Option<String>,
        counts: EngagementCounts,
        posted_at: Option<NaiveDateTime>,
    ) -> Self {
        Self {
            id: RecordId::generate(),
            owner_id,
            post_id,
            text,
            counts,
            engagement_score: 0,
            posted_at,
            fetched_at: Utc::now(),
        }
    }

    pub fn natural_key(&self) -> (&PostId, &OwnerId) {
        (&self.post_id, &self.owner_id)
    }
}

/// Window into an owner's records, used to walk large collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Page {
    pub fn first(limit: usize) -> Self {
        Self { offset: 0, limit }
    }

    pub fn next(self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.limit),
            limit: self.limit,
        }
    }
}
