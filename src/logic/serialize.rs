use serde_json::{json, Value};

use crate::error::Result;
use crate::logic::copy::CopyEntity;

/// Shapes copy results for whatever transport sits above this crate. The
/// copy engine only decides *which* entities are returned versus included;
/// implementations decide what a resource looks like on the wire.
pub trait EntitySerializer: Send + Sync {
    fn payload(&self, returned: &[CopyEntity], included: &[CopyEntity]) -> Result<Value>;
}

/// Default serializer producing JSON:API-shaped resource objects:
/// `{"data": [...], "included": [...]}` with `type`/`id`/`attributes`.
pub struct JsonApiSerializer;

impl EntitySerializer for JsonApiSerializer {
    fn payload(&self, returned: &[CopyEntity], included: &[CopyEntity]) -> Result<Value> {
        Ok(json!({
            "data": resources(returned)?,
            "included": resources(included)?,
        }))
    }
}

fn resources(entities: &[CopyEntity]) -> Result<Vec<Value>> {
    entities.iter().map(resource).collect()
}

fn resource(entity: &CopyEntity) -> Result<Value> {
    Ok(json!({
        "type": entity.entity_type(),
        "id": entity.id(),
        "attributes": entity.attributes()?,
    }))
}
