use parking_lot::Mutex;
use std::sync::Arc;

use spindle::{
    changed_files, copy_from, has_changes, project_status, publish, reset, schedule_spider,
    Annotation, ChangeKind, CommitId, CopySelection, Extractor, Id, Item, JobScheduler,
    JsonApiSerializer, NoopDeployTrigger, Project, Sample, Schema, SchemaField, Spider,
    StorageBackend, VersionedStore,
};

/// Scheduler stand-in that records every request and hands out
/// predictable job ids.
#[derive(Default)]
struct RecordingScheduler {
    calls: Mutex<Vec<(Id, Id, Option<CommitId>)>>,
}

#[async_trait::async_trait]
impl JobScheduler for RecordingScheduler {
    async fn schedule(
        &self,
        project: &Id,
        spider: &Id,
        version: Option<&CommitId>,
    ) -> anyhow::Result<Id> {
        let mut calls = self.calls.lock();
        calls.push((project.clone(), spider.clone(), version.cloned()));
        Ok(format!("job-{}", calls.len()))
    }
}

#[tokio::test]
async fn test_project_lifecycle_complete_workflow() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend: Arc<dyn StorageBackend> = Arc::new(VersionedStore::new());
    let scheduler = RecordingScheduler::default();

    println!("🚀 Starting project lifecycle test");

    // Step 1: Create the project
    println!("1. Creating the fashion-store project");
    Project::create(Arc::clone(&backend), "fashion-store", "admin")
        .await
        .expect("Failed to create project");
    let projects = Project::list(backend.as_ref())
        .await
        .expect("Failed to list projects");
    assert_eq!(projects, vec!["fashion-store".to_string()]);

    // Step 2: Alice opens her own working copy
    println!("2. Opening alice's working copy");
    let alice = Project::open(Arc::clone(&backend), "fashion-store", "alice", None)
        .await
        .expect("Failed to open project for alice");
    let status = project_status(&alice).await.expect("Failed to read status");
    assert_eq!(status.branch, "alice");
    assert!(status.commit.is_some(), "new checkouts start at master's head");
    assert!(!status.has_changes(), "a fresh working copy has no changes");

    // Step 3: Alice builds the product spider on her branch
    println!("3. Building the product spider on alice's branch");
    let mut schema = Schema::new("product");
    schema.add_field(SchemaField::text("title"));
    let extractor = Extractor::regex(r"\$(\d+\.\d{2})");

    let mut spider = Spider::new("product-spider").with_start_url("http://fashion.example/");
    let mut sample = Sample::new("product-spider", "detail page", "http://fashion.example/item/1");
    sample.add_item(
        Item::new(schema.id.clone()).with_annotation(
            Annotation::new("title", "h1.product-name::text").with_extractor(extractor.id.clone()),
        ),
    );
    spider.add_sample(sample.id.clone());

    alice.add_schema(schema.clone()).expect("Failed to add schema");
    alice
        .add_extractor(extractor.clone())
        .expect("Failed to add extractor");
    alice.save_spider(&spider).expect("Failed to save spider");
    alice.save_sample(&sample).expect("Failed to save sample");
    alice.save_schemas().expect("Failed to save schemas");
    alice.save_extractors().expect("Failed to save extractors");
    alice
        .storage()
        .commit("add product spider")
        .await
        .expect("Failed to commit");
    let alice_head = alice.storage().current_commit_id();
    assert!(alice_head.is_some());
    println!("✅ Alice committed her spider at {:?}", alice_head);

    // Step 4: Her branch now reports the committed changes against master
    println!("4. Checking alice's change list");
    let changes = changed_files(&alice).await.expect("Failed to diff branch");
    let listed: Vec<(&str, ChangeKind)> = changes
        .iter()
        .map(|change| (change.path.as_str(), change.kind))
        .collect();
    assert_eq!(listed.len(), 4);
    assert_eq!(listed[0], ("extractors.json", ChangeKind::Modified));
    assert_eq!(listed[1], ("schemas.json", ChangeKind::Modified));
    assert_eq!(listed[2], ("spiders/product-spider.json", ChangeKind::Added));
    assert_eq!(listed[3].1, ChangeKind::Added); // the sample body

    // Step 5: Bob's working copy still tracks master and sees none of it
    println!("5. Verifying bob's copy is unaffected");
    let bob = Project::open(Arc::clone(&backend), "fashion-store", "bob", None)
        .await
        .expect("Failed to open project for bob");
    assert!(!bob.has_spider("product-spider").expect("Failed to check spider"));

    // Step 6: Scheduling for alice pins the job to her branch head
    println!("6. Scheduling a crawl from alice's branch");
    let job = schedule_spider(
        Arc::clone(&backend),
        "fashion-store",
        "product-spider",
        "alice",
        None,
        None,
        &scheduler,
    )
    .await
    .expect("Failed to schedule from alice's branch");
    assert_eq!(job.job_id, "job-1");
    assert_eq!(job.branch, "alice");
    assert_eq!(job.version, alice_head);

    // Step 7: Alice publishes; her branch merges into master and retires
    println!("7. Publishing alice's branch");
    let published = publish(&alice, false, &NoopDeployTrigger)
        .await
        .expect("Failed to publish");
    assert_eq!(published.storage().current_commit_id(), alice_head);
    assert!(published
        .has_spider("product-spider")
        .expect("Failed to check spider"));
    println!(
        "✅ Published, master now at {:?}",
        published.storage().current_commit_id()
    );

    // Step 8: A fresh checkout for bob sees the published spider
    println!("8. Re-opening bob's copy after the publish");
    let bob = Project::open(Arc::clone(&backend), "fashion-store", "bob", None)
        .await
        .expect("Failed to reopen project for bob");
    assert!(bob.has_spider("product-spider").expect("Failed to check spider"));
    assert!(!has_changes(&bob).await.expect("Failed to read bob's status"));

    // Bob never branched, so his jobs run from master at the same commit.
    let job = schedule_spider(
        Arc::clone(&backend),
        "fashion-store",
        "product-spider",
        "bob",
        None,
        None,
        &scheduler,
    )
    .await
    .expect("Failed to schedule from master");
    assert_eq!(job.branch, "master");
    assert_eq!(job.version, alice_head);
    assert_eq!(scheduler.calls.lock().len(), 2);

    // Step 9: Carol abandons an experiment with a reset
    println!("9. Resetting carol's unpublished work");
    let carol = Project::open(Arc::clone(&backend), "fashion-store", "carol", None)
        .await
        .expect("Failed to open project for carol");
    carol
        .save_spider(&Spider::new("experimental-spider"))
        .expect("Failed to save spider");
    carol
        .storage()
        .commit("experiment")
        .await
        .expect("Failed to commit");
    assert!(has_changes(&carol).await.expect("Failed to read carol's status"));

    let carol = reset(&carol).await.expect("Failed to reset");
    assert!(!has_changes(&carol).await.expect("Failed to read carol's status"));
    assert!(!carol
        .has_spider("experimental-spider")
        .expect("Failed to check spider"));

    println!("✅ Lifecycle complete: publish, schedule and reset all behaved");
}

#[tokio::test]
async fn test_cross_project_copy_workflow() {
    let _ = env_logger::builder().is_test(true).try_init();
    let backend: Arc<dyn StorageBackend> = Arc::new(VersionedStore::new());

    println!("🚀 Starting cross-project copy test");

    // Step 1: Seed the legacy store straight on master
    println!("1. Seeding the legacy-store project");
    let legacy = Project::create(Arc::clone(&backend), "legacy-store", "admin")
        .await
        .expect("Failed to create legacy-store");

    let mut schema = Schema::new("product");
    schema.add_field(SchemaField::text("title"));
    let extractor = Extractor::regex(r"(\d+)");
    let mut spider = Spider::new("catalog-spider").with_start_url("http://legacy.example/");
    let mut sample = Sample::new("catalog-spider", "catalog", "http://legacy.example/catalog");
    sample.add_item(
        Item::new(schema.id.clone()).with_annotation(
            Annotation::new("title", "h2 a::text").with_extractor(extractor.id.clone()),
        ),
    );
    spider.add_sample(sample.id.clone());

    legacy.add_schema(schema.clone()).expect("Failed to add schema");
    legacy
        .add_extractor(extractor.clone())
        .expect("Failed to add extractor");
    legacy.save_spider(&spider).expect("Failed to save spider");
    legacy.save_sample(&sample).expect("Failed to save sample");
    legacy.save_schemas().expect("Failed to save schemas");
    legacy.save_extractors().expect("Failed to save extractors");
    legacy
        .storage()
        .commit("seed catalog spider")
        .await
        .expect("Failed to commit seed");

    // Step 2: Create the empty flagship store
    println!("2. Creating the flagship-store project");
    Project::create(Arc::clone(&backend), "flagship-store", "admin")
        .await
        .expect("Failed to create flagship-store");

    // Step 3: Dana copies the catalog spider across projects
    println!("3. Copying catalog-spider into flagship-store");
    let source = Project::open(Arc::clone(&backend), "legacy-store", "dana", None)
        .await
        .expect("Failed to open source");
    let dest = Project::open(Arc::clone(&backend), "flagship-store", "dana", None)
        .await
        .expect("Failed to open destination");

    let outcome = copy_from(
        &dest,
        &source,
        &CopySelection::spiders(["catalog-spider"]),
        &JsonApiSerializer,
    )
    .await
    .expect("Failed to copy spider");

    let data = outcome.payload["data"]
        .as_array()
        .expect("payload data should be an array");
    assert_eq!(data.len(), 1);
    assert_eq!(data[0]["type"], "spiders");
    assert_eq!(data[0]["id"], "catalog-spider");
    let included = outcome.payload["included"]
        .as_array()
        .expect("payload included should be an array");
    assert_eq!(included.len(), 3); // schema, extractor and the sample
    println!("✅ Copy returned the spider with {} included entities", included.len());

    // Step 4: The copy sits on dana's branch until she publishes it
    println!("4. Publishing the copied spider");
    let copied_changes = changed_files(&dest).await.expect("Failed to diff destination");
    assert!(copied_changes
        .iter()
        .any(|change| change.path == "spiders/catalog-spider.json"));

    publish(&dest, false, &NoopDeployTrigger)
        .await
        .expect("Failed to publish destination");

    let fresh = Project::open(Arc::clone(&backend), "flagship-store", "erin", None)
        .await
        .expect("Failed to reopen destination");
    let copied = fresh
        .spider("catalog-spider")
        .expect("Copied spider should exist");
    assert_eq!(copied.start_urls, vec!["http://legacy.example/"]);
    assert!(fresh.has_schema(&schema.id).expect("Failed to check schema"));
    assert!(fresh
        .has_extractor(&extractor.id)
        .expect("Failed to check extractor"));
    let copied_sample = fresh
        .sample("catalog-spider", &sample.id)
        .expect("Copied sample should exist");
    assert_eq!(copied_sample.items().len(), 1);

    // Step 5: The copied spider is immediately schedulable
    println!("5. Scheduling the copied spider");
    let scheduler = RecordingScheduler::default();
    let job = schedule_spider(
        Arc::clone(&backend),
        "flagship-store",
        "catalog-spider",
        "erin",
        None,
        None,
        &scheduler,
    )
    .await
    .expect("Failed to schedule copied spider");
    assert_eq!(job.project, "flagship-store");
    assert_eq!(job.branch, "master");

    println!("✅ Copy workflow complete");
}
