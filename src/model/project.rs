use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::{Extractor, Id, Registry, Sample, Schema, Spider};
use crate::store::{ProjectStorage, StorageBackend, MASTER_BRANCH};

pub const PROJECT_FILE: &str = "project.json";
pub const SCHEMAS_FILE: &str = "schemas.json";
pub const EXTRACTORS_FILE: &str = "extractors.json";
const SPIDERS_DIR: &str = "spiders";

fn spider_path(spider_id: &str) -> String {
    format!("{}/{}.json", SPIDERS_DIR, spider_id)
}

fn sample_path(spider_id: &str, sample_id: &str) -> String {
    format!("{}/{}/{}.json", SPIDERS_DIR, spider_id, sample_id)
}

/// The part of a project that lives in `project.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub id: Id,
    pub name: String,
}

/// Aggregate root over one project checkout. Owns the storage handle and
/// the lazily loaded entity registries; all entity reads and saves go
/// through here so the registries and the staged tree stay in step.
///
/// Registries hand out owned clones. Mutations go back in through the
/// `save_*`/`add_*` methods, never through returned values.
pub struct Project {
    manifest: ProjectManifest,
    storage: ProjectStorage,
    spiders: RwLock<Registry<Spider>>,
    schemas: RwLock<Registry<Schema>>,
    extractors: RwLock<Registry<Extractor>>,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("manifest", &self.manifest)
            .finish_non_exhaustive()
    }
}

impl Project {
    /// Bootstrap a new project and commit its initial tree to master.
    pub async fn create(
        backend: Arc<dyn StorageBackend>,
        name: &str,
        author: &str,
    ) -> Result<Project> {
        if !backend.is_valid_filename(name) {
            return Err(Error::Validation(format!(
                "\"{}\" is not a valid project name",
                name
            )));
        }
        if backend.project_exists(name).await? {
            return Err(Error::Validation(format!(
                "project \"{}\" already exists",
                name
            )));
        }

        let storage =
            ProjectStorage::open_at(backend, name, author, MASTER_BRANCH, None).await?;
        let manifest = ProjectManifest {
            id: name.to_string(),
            name: name.to_string(),
        };
        storage.stage_json(PROJECT_FILE, &manifest)?;
        storage.stage_json(SCHEMAS_FILE, &BTreeMap::<Id, Schema>::new())?;
        storage.stage_json(EXTRACTORS_FILE, &BTreeMap::<Id, Extractor>::new())?;
        storage.commit(&format!("create project '{}'", name)).await?;
        log::info!("created project '{}' (author '{}')", name, author);

        Ok(Self::bind(manifest, storage))
    }

    /// Open an existing project on the author's branch, optionally pinned
    /// to an exact commit.
    pub async fn open(
        backend: Arc<dyn StorageBackend>,
        project_id: &str,
        author: &str,
        version: Option<&Id>,
    ) -> Result<Project> {
        if !backend.project_exists(project_id).await? {
            return Err(Error::NotFound(format!(
                "project \"{}\" not found",
                project_id
            )));
        }
        let storage = ProjectStorage::open(backend, project_id, author, version).await?;
        Self::from_storage(storage)
    }

    /// Bind a project to an already opened checkout.
    pub fn from_storage(storage: ProjectStorage) -> Result<Project> {
        let manifest: ProjectManifest = storage.read_json(PROJECT_FILE)?;
        Ok(Self::bind(manifest, storage))
    }

    fn bind(manifest: ProjectManifest, storage: ProjectStorage) -> Project {
        Project {
            manifest,
            storage,
            spiders: RwLock::new(Registry::new()),
            schemas: RwLock::new(Registry::new()),
            extractors: RwLock::new(Registry::new()),
        }
    }

    /// All project ids known to the backend.
    pub async fn list(backend: &dyn StorageBackend) -> Result<Vec<Id>> {
        backend.projects().await
    }

    /// Manifests of every project, read through the author's own checkout
    /// of each one.
    pub async fn manifests(
        backend: Arc<dyn StorageBackend>,
        author: &str,
    ) -> Result<Vec<ProjectManifest>> {
        let mut manifests = Vec::new();
        for id in backend.projects().await? {
            let storage = ProjectStorage::open(Arc::clone(&backend), id, author, None).await?;
            manifests.push(storage.read_json(PROJECT_FILE)?);
        }
        Ok(manifests)
    }

    pub fn id(&self) -> &Id {
        &self.manifest.id
    }

    pub fn name(&self) -> &str {
        &self.manifest.name
    }

    pub fn manifest(&self) -> &ProjectManifest {
        &self.manifest
    }

    pub fn storage(&self) -> &ProjectStorage {
        &self.storage
    }

    // --- spiders ---

    fn ensure_spiders_loaded(&self) -> Result<()> {
        if self.spiders.read().is_loaded() {
            return Ok(());
        }
        let mut entries = BTreeMap::new();
        let (_, files) = self.storage.list_dir(SPIDERS_DIR);
        for file in files {
            let Some(id) = file.strip_suffix(".json") else {
                continue;
            };
            let spider: Spider = self.storage.read_json(&spider_path(id))?;
            entries.insert(spider.id.clone(), spider);
        }
        let mut registry = self.spiders.write();
        if !registry.is_loaded() {
            registry.load(entries);
        }
        Ok(())
    }

    pub fn spiders(&self) -> Result<Vec<Spider>> {
        self.ensure_spiders_loaded()?;
        Ok(self.spiders.read().values().cloned().collect())
    }

    pub fn spider_ids(&self) -> Result<Vec<Id>> {
        self.ensure_spiders_loaded()?;
        Ok(self.spiders.read().ids())
    }

    pub fn spider(&self, spider_id: &str) -> Result<Spider> {
        self.ensure_spiders_loaded()?;
        self.spiders.read().get(spider_id).cloned().ok_or_else(|| {
            Error::NotFound(format!(
                "spider \"{}\" not found in project \"{}\"",
                spider_id, self.manifest.id
            ))
        })
    }

    pub fn has_spider(&self, spider_id: &str) -> Result<bool> {
        self.ensure_spiders_loaded()?;
        Ok(self.spiders.read().contains(spider_id))
    }

    /// Stage a spider definition. Overwrites any previous definition with
    /// the same id.
    pub fn save_spider(&self, spider: &Spider) -> Result<()> {
        self.storage.stage_json(spider_path(&spider.id), spider)?;
        let mut registry = self.spiders.write();
        if registry.is_loaded() {
            registry.upsert(spider.id.clone(), spider.clone());
        }
        Ok(())
    }

    // --- samples ---

    /// Sample stubs for a spider, in the spider's recorded order. Bodies
    /// are not read; materialize with [`Sample::with_snapshots`].
    pub fn samples(&self, spider: &Spider) -> Vec<Sample> {
        spider
            .samples
            .iter()
            .map(|sample_id| Sample::stub(spider.id.clone(), sample_id.clone()))
            .collect()
    }

    /// Read one sample body, fully materialized.
    pub fn sample(&self, spider_id: &str, sample_id: &str) -> Result<Sample> {
        let path = sample_path(spider_id, sample_id);
        let mut sample: Sample = match self.storage.read_json(&path) {
            Ok(sample) => sample,
            Err(Error::NotFound(_)) => {
                return Err(Error::NotFound(format!(
                    "sample \"{}\" not found in spider \"{}\"",
                    sample_id, spider_id
                )))
            }
            Err(err) => return Err(err),
        };
        // A body file with no items is an empty sample, not a stub.
        sample.items.get_or_insert_with(Vec::new);
        Ok(sample)
    }

    /// Stage a sample body. The sample must be materialized: writing a stub
    /// would truncate the persisted item tree.
    pub fn save_sample(&self, sample: &Sample) -> Result<()> {
        if !sample.is_materialized() {
            return Err(Error::Validation(format!(
                "sample \"{}\" has not been materialized and cannot be saved",
                sample.id
            )));
        }
        self.storage
            .stage_json(sample_path(&sample.spider, &sample.id), sample)
    }

    // --- schemas ---

    fn ensure_schemas_loaded(&self) -> Result<()> {
        if self.schemas.read().is_loaded() {
            return Ok(());
        }
        let entries = match self.storage.read_json::<BTreeMap<Id, Schema>>(SCHEMAS_FILE) {
            Ok(entries) => entries,
            Err(Error::NotFound(_)) => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        let mut registry = self.schemas.write();
        if !registry.is_loaded() {
            registry.load(entries);
        }
        Ok(())
    }

    pub fn schemas(&self) -> Result<Vec<Schema>> {
        self.ensure_schemas_loaded()?;
        Ok(self.schemas.read().values().cloned().collect())
    }

    pub fn schema(&self, schema_id: &str) -> Result<Schema> {
        self.ensure_schemas_loaded()?;
        self.schemas.read().get(schema_id).cloned().ok_or_else(|| {
            Error::NotFound(format!(
                "schema \"{}\" not found in project \"{}\"",
                schema_id, self.manifest.id
            ))
        })
    }

    pub fn has_schema(&self, schema_id: &str) -> Result<bool> {
        self.ensure_schemas_loaded()?;
        Ok(self.schemas.read().contains(schema_id))
    }

    /// Add a schema to the shared registry. Returns false when a schema
    /// with this id is already present; the existing one wins.
    pub fn add_schema(&self, schema: Schema) -> Result<bool> {
        self.ensure_schemas_loaded()?;
        Ok(self.schemas.write().insert(schema.id.clone(), schema))
    }

    /// Stage the whole schema registry file.
    pub fn save_schemas(&self) -> Result<()> {
        self.ensure_schemas_loaded()?;
        let map = self.schemas.read().to_map();
        self.storage.stage_json(SCHEMAS_FILE, &map)
    }

    // --- extractors ---

    fn ensure_extractors_loaded(&self) -> Result<()> {
        if self.extractors.read().is_loaded() {
            return Ok(());
        }
        let entries = match self
            .storage
            .read_json::<BTreeMap<Id, Extractor>>(EXTRACTORS_FILE)
        {
            Ok(entries) => entries,
            Err(Error::NotFound(_)) => BTreeMap::new(),
            Err(err) => return Err(err),
        };
        let mut registry = self.extractors.write();
        if !registry.is_loaded() {
            registry.load(entries);
        }
        Ok(())
    }

    pub fn extractors(&self) -> Result<Vec<Extractor>> {
        self.ensure_extractors_loaded()?;
        Ok(self.extractors.read().values().cloned().collect())
    }

    pub fn extractor(&self, extractor_id: &str) -> Result<Extractor> {
        self.ensure_extractors_loaded()?;
        self.extractors
            .read()
            .get(extractor_id)
            .cloned()
            .ok_or_else(|| {
                Error::NotFound(format!(
                    "extractor \"{}\" not found in project \"{}\"",
                    extractor_id, self.manifest.id
                ))
            })
    }

    pub fn has_extractor(&self, extractor_id: &str) -> Result<bool> {
        self.ensure_extractors_loaded()?;
        Ok(self.extractors.read().contains(extractor_id))
    }

    /// Add an extractor to the shared registry, same id rules as
    /// [`Project::add_schema`].
    pub fn add_extractor(&self, extractor: Extractor) -> Result<bool> {
        self.ensure_extractors_loaded()?;
        Ok(self
            .extractors
            .write()
            .insert(extractor.id.clone(), extractor))
    }

    /// Stage the whole extractor registry file.
    pub fn save_extractors(&self) -> Result<()> {
        self.ensure_extractors_loaded()?;
        let map = self.extractors.read().to_map();
        self.storage.stage_json(EXTRACTORS_FILE, &map)
    }

    /// Drop all staged writes and forget the registries, so the next
    /// access reloads from the checked-out tree. Used to unwind multi-step
    /// operations that fail after they have started mutating.
    pub fn discard(&self) {
        self.storage.discard();
        *self.spiders.write() = Registry::new();
        *self.schemas.write() = Registry::new();
        *self.extractors.write() = Registry::new();
    }

    // --- extension points, not implemented for any current backend ---

    pub fn update(&self, _name: &str) -> Result<()> {
        Err(Error::FeatureNotAvailable)
    }

    pub async fn destroy(self) -> Result<()> {
        Err(Error::FeatureNotAvailable)
    }
}
