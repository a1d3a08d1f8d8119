use serde::Serialize;

use super::domain::{EngagementCounts, EngagementKind};
use super::scoring::score;
use super::weights::WeightConfiguration;

/// Worked example of the current formula applied to a fixed engagement mix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactScenario {
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub mentions: u64,
    pub score: u64,
}

impl ImpactScenario {
    fn new(counts: EngagementCounts, weights: &WeightConfiguration) -> Self {
        Self {
            likes: counts.likes,
            retweets: counts.retweets,
            replies: counts.replies,
            mentions: counts.mentions,
            score: score(&counts, weights),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExampleScenarios {
    pub high_engagement: ImpactScenario,
    pub medium_engagement: ImpactScenario,
    pub low_engagement: ImpactScenario,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactRecommendations {
    pub high_value_actions: Vec<String>,
    pub optimization_tips: Vec<String>,
}

/// How an owner's point values shape scores, shown next to the settings form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointImpactAnalysis {
    pub current_values: WeightConfiguration,
    pub scoring_formula: String,
    pub example_scenarios: ExampleScenarios,
    pub recommendations: ImpactRecommendations,
}

impl PointImpactAnalysis {
    pub fn for_weights(weights: &WeightConfiguration) -> Self {
        Self {
            current_values: *weights,
            scoring_formula: scoring_formula(weights),
            example_scenarios: ExampleScenarios {
                high_engagement: ImpactScenario::new(
                    EngagementCounts::new(100, 50, 25, 10),
                    weights,
                ),
                medium_engagement: ImpactScenario::new(
                    EngagementCounts::new(50, 25, 10, 5),
                    weights,
                ),
                low_engagement: ImpactScenario::new(EngagementCounts::new(10, 5, 2, 1), weights),
            },
            recommendations: ImpactRecommendations {
                high_value_actions: high_value_actions(weights),
                optimization_tips: optimization_tips(weights),
            },
        }
    }
}

fn scoring_formula(weights: &WeightConfiguration) -> String {
    EngagementKind::ALL
        .into_iter()
        .map(|kind| format!("({} × {})", kind.plural_label(), weights.get(kind)))
        .collect::<Vec<_>>()
        .join(" + ")
}

// stable sort keeps like/retweet/reply/mention order among equal values
fn high_value_actions(weights: &WeightConfiguration) -> Vec<String> {
    let mut ranked: Vec<EngagementKind> = EngagementKind::ALL.to_vec();
    ranked.sort_by(|a, b| weights.get(*b).cmp(&weights.get(*a)));
    ranked
        .into_iter()
        .take(2)
        .map(|kind| format!("Focus on {} (worth {} points)", kind.key(), weights.get(kind)))
        .collect()
}

fn optimization_tips(weights: &WeightConfiguration) -> Vec<String> {
    let mut tips = Vec::new();
    if weights.reply > weights.like {
        tips.push("Replies are worth more than likes - encourage conversation!".to_string());
    }
    if weights.retweet > weights.like {
        tips.push("Retweets are high-value - create shareable content!".to_string());
    }
    if weights.mention == weights.like {
        tips.push("Mentions and likes have equal value - both are important!".to_string());
    }
    tips
}
