use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical meaning of an export column, independent of its header text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    PostId,
    Text,
    PostedAt,
    LikeCount,
    RetweetCount,
    ReplyCount,
    MentionCount,
}

impl ColumnRole {
    pub fn label(self) -> &'static str {
        match self {
            ColumnRole::PostId => "post id",
            ColumnRole::Text => "text",
            ColumnRole::PostedAt => "posted date",
            ColumnRole::LikeCount => "likes",
            ColumnRole::RetweetCount => "retweets",
            ColumnRole::ReplyCount => "replies",
            ColumnRole::MentionCount => "mentions",
        }
    }
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Header aliases per role. Matching is exact and case-sensitive on trimmed header cells;
/// new export formats are supported by extending this table.
const ROLE_ALIASES: &[(ColumnRole, &[&str])] = &[
    (ColumnRole::PostId, &["Tweet ID", "tweet_id", "id"]),
    (
        ColumnRole::Text,
        &[
            "Tweet text",
            "Tweet Text",
            "Text",
            "text",
            "tweet_text",
            "content",
        ],
    ),
    (
        ColumnRole::PostedAt,
        &[
            "Posted date",
            "Posted Date",
            "Date",
            "date",
            "posted_date",
            "created_at",
        ],
    ),
    (
        ColumnRole::LikeCount,
        &["Likes", "likes", "Like count", "like_count", "likes_count"],
    ),
    (
        ColumnRole::RetweetCount,
        &[
            "Retweets",
            "retweets",
            "Retweet count",
            "retweet_count",
            "retweets_count",
            "Reposts",
            "reposts",
        ],
    ),
    (
        ColumnRole::ReplyCount,
        &[
            "Replies",
            "replies",
            "Reply count",
            "reply_count",
            "replies_count",
        ],
    ),
    (
        ColumnRole::MentionCount,
        &[
            "Mentions",
            "mentions",
            "Mention count",
            "mention_count",
            "mentions_count",
        ],
    ),
];

/// Header cells that mark an account overview export (one row per day).
const AGGREGATE_INDICATORS: &[&str] = &[
    "Impressions",
    "Engagements",
    "Profile visits",
    "Create Post",
];

/// Roles a per-post export cannot do without.
pub(crate) const ESSENTIAL_ROLES: [ColumnRole; 4] = [
    ColumnRole::PostId,
    ColumnRole::LikeCount,
    ColumnRole::RetweetCount,
    ColumnRole::ReplyCount,
];

/// Shape of the uploaded export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportLayout {
    PerPost,
    Aggregate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MappedColumn {
    pub(crate) index: usize,
    pub(crate) header: String,
}

/// Resolved role to column positions for one header row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ColumnMapping {
    columns: BTreeMap<ColumnRole, MappedColumn>,
}

impl ColumnMapping {
    pub(crate) fn get(&self, role: ColumnRole) -> Option<&MappedColumn> {
        self.columns.get(&role)
    }

    pub(crate) fn contains(&self, role: ColumnRole) -> bool {
        self.columns.contains_key(&role)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (ColumnRole, &MappedColumn)> {
        self.columns.iter().map(|(role, column)| (*role, column))
    }
}

pub(crate) fn detect_columns(header: &[String]) -> ColumnMapping {
    let mut columns = BTreeMap::new();
    for (role, aliases) in ROLE_ALIASES {
        let found = header
            .iter()
            .enumerate()
            .find(|(_, name)| aliases.contains(&name.as_str()));
        if let Some((index, name)) = found {
            columns.insert(
                *role,
                MappedColumn {
                    index,
                    header: name.clone(),
                },
            );
        }
    }
    ColumnMapping { columns }
}

pub(crate) fn is_aggregate_header(header: &[String]) -> bool {
    header
        .iter()
        .any(|name| AGGREGATE_INDICATORS.contains(&name.as_str()))
}

/// Decide the layout for a normalized header row, or return the essential roles that are
/// missing when the header matches neither layout.
pub(crate) fn resolve_layout(
    header: &[String],
) -> Result<(ColumnMapping, ExportLayout), Vec<ColumnRole>> {
    let mapping = detect_columns(header);
    let aggregate = is_aggregate_header(header);

    if aggregate && !mapping.contains(ColumnRole::PostId) {
        return Ok((mapping, ExportLayout::Aggregate));
    }

    let missing: Vec<ColumnRole> = ESSENTIAL_ROLES
        .into_iter()
        .filter(|role| !mapping.contains(*role))
        .collect();

    if missing.is_empty() || aggregate {
        Ok((mapping, ExportLayout::PerPost))
    } else {
        Err(missing)
    }
}
