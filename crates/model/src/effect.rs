use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Trip-level classification of the real-time impact, mirrored directly
/// onto the GTFS-realtime `Alert.Effect` enum used by [`feed-codec`](../feed_codec).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Effect {
    NoService,
    ReducedService,
    SignificantDelays,
    Detour,
    AdditionalService,
    ModifiedService,
    UnknownEffect,
}

impl Default for Effect {
    fn default() -> Self {
        Effect::UnknownEffect
    }
}
