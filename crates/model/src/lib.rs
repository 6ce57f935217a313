use std::fmt::Debug;

use schemars::JsonSchema;
use serde::Serialize;
use utility::id::{HasId, Id};

pub mod contributor;
pub mod effect;
pub mod real_time_update;
pub mod trip_update;
pub mod vehicle_journey;

pub trait ExampleData {
    fn example_data() -> Self;
}

/// Pairs an entity with its identifier for API responses, the way the
/// database layer returns rows with their primary key attached.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WithId<V>
where
    V: HasId,
    V::IdType: Debug + Clone + Serialize,
{
    pub id: Id<V>,
    #[serde(flatten)]
    pub content: V,
}

impl<V> WithId<V>
where
    V: HasId,
    V::IdType: Debug + Clone + Serialize,
{
    pub fn new(id: Id<V>, content: V) -> Self {
        Self { id, content }
    }
}
