use itertools::{chain, Itertools};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::logic::serialize::EntitySerializer;
use crate::model::{Extractor, Id, Project, Sample, Schema, Spider};

/// What the caller asked to copy, by id. Spiders drag their samples and
/// every schema/extractor they reference along as dependencies.
#[derive(Debug, Clone, Default)]
pub struct CopySelection {
    pub spiders: Vec<Id>,
    pub schemas: Vec<Id>,
}

impl CopySelection {
    pub fn spiders<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Id>,
    {
        Self {
            spiders: ids.into_iter().map(Into::into).collect(),
            schemas: Vec::new(),
        }
    }

    pub fn with_schemas<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Id>,
    {
        self.schemas.extend(ids.into_iter().map(Into::into));
        self
    }
}

/// One entity travelling through a copy, dispatched by type at persist
/// time.
#[derive(Debug, Clone, PartialEq)]
pub enum CopyEntity {
    Spider(Spider),
    Sample(Sample),
    Schema(Schema),
    Extractor(Extractor),
}

impl CopyEntity {
    /// Whether the entity can be re-bound to a new owning project. A
    /// sample cannot: its persisted path is derived from its spider, so
    /// the persist step force-saves it instead.
    pub fn supports_reparent(&self) -> bool {
        !matches!(self, CopyEntity::Sample(_))
    }

    pub fn entity_type(&self) -> &'static str {
        match self {
            CopyEntity::Spider(_) => "spiders",
            CopyEntity::Sample(_) => "samples",
            CopyEntity::Schema(_) => "schemas",
            CopyEntity::Extractor(_) => "extractors",
        }
    }

    pub fn id(&self) -> &Id {
        match self {
            CopyEntity::Spider(spider) => &spider.id,
            CopyEntity::Sample(sample) => &sample.id,
            CopyEntity::Schema(schema) => &schema.id,
            CopyEntity::Extractor(extractor) => &extractor.id,
        }
    }

    /// Entity body without the id, for serializers that carry the id
    /// separately.
    pub fn attributes(&self) -> Result<Value> {
        let mut value = match self {
            CopyEntity::Spider(spider) => serde_json::to_value(spider)?,
            CopyEntity::Sample(sample) => serde_json::to_value(sample)?,
            CopyEntity::Schema(schema) => serde_json::to_value(schema)?,
            CopyEntity::Extractor(extractor) => serde_json::to_value(extractor)?,
        };
        if let Some(object) = value.as_object_mut() {
            object.remove("id");
        }
        Ok(value)
    }
}

/// Result of a copy. `returned` holds only what the caller directly
/// selected; everything that travelled as a dependency lands in
/// `included`.
#[derive(Debug)]
pub struct CopyOutcome {
    pub returned: Vec<CopyEntity>,
    pub included: Vec<CopyEntity>,
    /// Serializer-built payload over `returned`/`included`.
    pub payload: Value,
}

/// Copy spiders and schemas from `source` into `dest` as one commit on the
/// destination handle's branch.
///
/// The whole selection is validated first; any unresolvable id aborts the
/// copy before anything is staged. On any later failure the destination is
/// rolled back to its checked-out state, so a copy either commits once or
/// leaves no trace.
pub async fn copy_from(
    dest: &Project,
    source: &Project,
    selection: &CopySelection,
    serializer: &dyn EntitySerializer,
) -> Result<CopyOutcome> {
    match copy_inner(dest, source, selection, serializer).await {
        Ok(outcome) => Ok(outcome),
        Err(err) => {
            dest.discard();
            Err(err)
        }
    }
}

async fn copy_inner(
    dest: &Project,
    source: &Project,
    selection: &CopySelection,
    serializer: &dyn EntitySerializer,
) -> Result<CopyOutcome> {
    let spider_ids: Vec<&Id> = selection.spiders.iter().unique().collect();
    let schema_ids: Vec<&Id> = selection.schemas.iter().unique().collect();
    if spider_ids.is_empty() && schema_ids.is_empty() {
        return Err(Error::Validation(
            "no spiders or schemas selected to copy".to_string(),
        ));
    }

    // Every requested id is resolved up front and reported in one error.
    let mut missing: Vec<Id> = Vec::new();
    for id in &spider_ids {
        if !source.has_spider(id)? {
            missing.push((*id).clone());
        }
    }
    for id in &schema_ids {
        if !source.has_schema(id)? {
            missing.push((*id).clone());
        }
    }
    if !missing.is_empty() {
        return Err(Error::MissingIds { ids: missing });
    }

    // The dedup decisions below read both projects' shared registries, so
    // they are materialized before the traversal mutates anything.
    source.schemas()?;
    source.extractors()?;
    dest.schemas()?;
    dest.extractors()?;

    log::info!(
        "copying {} spiders and {} schemas from '{}' into '{}'",
        spider_ids.len(),
        schema_ids.len(),
        source.id(),
        dest.id()
    );

    let mut spider_queue: Vec<CopyEntity> = Vec::new();
    let mut extractor_queue: Vec<CopyEntity> = Vec::new();
    let mut schema_queue: Vec<CopyEntity> = Vec::new();
    let mut returned: Vec<CopyEntity> = Vec::new();
    let mut included: Vec<CopyEntity> = Vec::new();

    for spider_id in &spider_ids {
        let spider = source.spider(spider_id)?;
        returned.push(CopyEntity::Spider(spider.clone()));
        spider_queue.push(CopyEntity::Spider(spider.clone()));

        for stub in source.samples(&spider) {
            let sample = stub.with_snapshots(source)?;

            for item in sample.items() {
                // A dangling schema reference in the source fails the whole
                // copy; nothing has been committed at this point.
                let schema = source.schema(&item.schema)?;
                if dest.add_schema(schema.clone())? {
                    schema_queue.push(CopyEntity::Schema(schema.clone()));
                    if !schema_ids.contains(&&item.schema) {
                        included.push(CopyEntity::Schema(schema));
                    }
                }

                for annotation in &item.annotations {
                    for extractor_id in &annotation.extractors {
                        let extractor = source.extractor(extractor_id)?;
                        if dest.add_extractor(extractor.clone())? {
                            extractor_queue.push(CopyEntity::Extractor(extractor.clone()));
                            included.push(CopyEntity::Extractor(extractor));
                        }
                    }
                }
            }

            included.push(CopyEntity::Sample(sample.clone()));
            spider_queue.push(CopyEntity::Sample(sample));
        }
    }

    for schema_id in &schema_ids {
        let schema = source.schema(schema_id)?;
        if dest.add_schema(schema.clone())? {
            schema_queue.push(CopyEntity::Schema(schema.clone()));
        }
        returned.push(CopyEntity::Schema(schema));
    }

    // Spiders and their samples persist first, then extractors, then
    // schemas.
    for entity in chain!(&spider_queue, &extractor_queue, &schema_queue) {
        if entity.supports_reparent() {
            match entity {
                CopyEntity::Spider(spider) => dest.save_spider(spider)?,
                CopyEntity::Schema(_) => dest.save_schemas()?,
                CopyEntity::Extractor(_) => dest.save_extractors()?,
                CopyEntity::Sample(_) => unreachable!("samples do not re-parent"),
            }
        } else {
            // Force-save: the sample keeps its spider-derived path and is
            // written even though nothing about it changed.
            match entity {
                CopyEntity::Sample(sample) => dest.save_sample(sample)?,
                _ => unreachable!("only samples lack re-parenting"),
            }
        }
    }

    let message = format!(
        "copy from '{}': {} spiders, {} schemas",
        source.id(),
        spider_ids.len(),
        schema_ids.len()
    );
    dest.storage().commit(&message).await?;

    let payload = serializer.payload(&returned, &included)?;
    Ok(CopyOutcome {
        returned,
        included,
        payload,
    })
}
