use std::sync::Arc;

use async_trait::async_trait;

use arbor_model::{Node, Object};
use arbor_store::{MemoryStore, Query, Store};

use crate::{Bus, BusError, Result, Rule, RuleRegistry, Worker};

const ALICE: &str = "/accounts/alice";
const BOB: &str = "/accounts/bob";

fn shared() -> Arc<dyn Store> {
    MemoryStore::shared()
}

fn collection(id: &str, owner: &str, audience: Option<&str>) -> Object {
    let mut collection = Object::with_id(id, ["Collection"]);
    collection.attributed_to = vec![owner.into()];
    if let Some(audience) = audience {
        collection.audience = vec![audience.into()];
    }
    collection.touch();
    collection
}

async fn seed(store: &Arc<dyn Store>, object: Object) {
    store.store(&object, true).await.unwrap();
}

fn create_activity(objects: Vec<Node>) -> Object {
    let mut activity = Object::new(["Create"]);
    activity.objects = objects;
    activity
}

/// The `after` token embedded in a page's `next` link.
fn next_token(page: &Object) -> Option<String> {
    match &page.next {
        Some(Node::Id(url)) => url.split_once("after=").map(|(_, token)| token.to_string()),
        _ => None,
    }
}

#[tokio::test]
async fn stock_documents_resolve_without_the_store() {
    let bus = Bus::anonymous(shared());
    let root = bus.dereference(&Node::from("/")).await.unwrap().unwrap();
    assert!(root.is_collection());
    assert_eq!(root.id.as_deref(), Some("/"));
}

#[tokio::test]
async fn not_found_is_distinct_from_forbidden() {
    let store = shared();
    seed(&store, collection("/alice/private", ALICE, None)).await;

    let anonymous = Bus::anonymous(store.clone());
    assert!(matches!(
        anonymous.dereference(&Node::from("/alice/private")).await,
        Err(BusError::Forbidden)
    ));
    assert!(anonymous
        .dereference(&Node::from("/alice/missing-entirely"))
        .await
        .unwrap()
        .is_none());

    let alice = Bus::new(Some(ALICE), store);
    assert!(alice
        .dereference(&Node::from("/alice/private"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn visibility_is_inherited_from_the_nearest_ancestor() {
    let store = shared();
    seed(&store, collection("/alice/notes", ALICE, Some("Public"))).await;
    seed(&store, Object::with_id("/alice/notes/1", ["Note"])).await;
    seed(&store, collection("/bob/drafts", BOB, None)).await;
    seed(&store, Object::with_id("/bob/drafts/1", ["Note"])).await;

    let anonymous = Bus::anonymous(store);
    // no audience of its own, public ancestor
    assert!(anonymous
        .dereference(&Node::from("/alice/notes/1"))
        .await
        .unwrap()
        .is_some());
    // no audience of its own, private ancestor
    assert!(matches!(
        anonymous.dereference(&Node::from("/bob/drafts/1")).await,
        Err(BusError::Forbidden)
    ));
}

#[tokio::test]
async fn sys_reads_and_writes_unconditionally() {
    let store = shared();
    seed(&store, collection("/bob/drafts", BOB, None)).await;

    let sys = Bus::system(store);
    assert!(sys
        .dereference(&Node::from("/bob/drafts"))
        .await
        .unwrap()
        .is_some());
    assert!(sys.can_write(&Node::from("/bob/drafts/anything")).await.unwrap());
}

#[tokio::test]
async fn write_authorization_walks_up_to_an_owned_ancestor() {
    let store = shared();
    seed(&store, collection("/alice/notes", ALICE, Some("Public"))).await;

    let alice = Bus::new(Some(ALICE), store.clone());
    // the child address does not exist yet; the owned ancestor authorizes it
    assert!(alice.can_write(&Node::from("/alice/notes/new")).await.unwrap());

    let bob = Bus::new(Some(BOB), store.clone());
    assert!(!bob.can_write(&Node::from("/alice/notes/new")).await.unwrap());

    let anonymous = Bus::anonymous(store);
    assert!(!anonymous.can_write(&Node::from("/alice/notes/new")).await.unwrap());
}

#[tokio::test]
async fn send_stamps_provenance_and_lists_in_the_outbox() {
    let store = shared();
    let alice = Bus::new(Some(ALICE), store);

    let mut activity = create_activity(vec![]);
    alice.send(&mut activity).await.unwrap();

    let id = activity.id.clone().unwrap();
    assert!(id.starts_with("/accounts/alice/outbox/"), "{id}");
    assert_eq!(activity.actor, vec![Node::Id(ALICE.into())]);
    assert_eq!(activity.attributed_to, vec![Node::Id(ALICE.into())]);
    assert!(activity.published.is_some());

    // the submission is listed before any processing happens
    let page = alice
        .load_collection_page("/accounts/alice/outbox", 42, None)
        .await
        .unwrap();
    assert_eq!(page.total_items, Some(1));
    assert_eq!(page.items[0].id(), Some(id.as_str()));
}

#[tokio::test]
async fn anonymous_identities_cannot_send() {
    let bus = Bus::anonymous(shared());
    let mut activity = create_activity(vec![]);
    assert!(matches!(
        bus.send(&mut activity).await,
        Err(BusError::Forbidden)
    ));
}

#[tokio::test]
async fn collection_pages_enumerate_members_exactly_once() {
    let store = shared();
    seed(&store, collection("/alice/notes", ALICE, Some("Public"))).await;
    for i in 0..5u32 {
        let mut note = Object::with_id(format!("/alice/notes/{i}"), ["Note"]);
        note.updated = Some(
            chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 8, 25, 12, i, 0).unwrap(),
        );
        store.add("/alice/notes", &note, true).await.unwrap();
    }

    let bus = Bus::anonymous(store);
    let mut seen = Vec::new();
    let mut after: Option<String> = None;
    let mut first_link = None;
    loop {
        let page = bus
            .load_collection_page("/alice/notes", 2, after.as_deref())
            .await
            .unwrap();
        assert_eq!(page.total_items, Some(5));
        if page.items.is_empty() {
            break;
        }
        first_link = page.first.clone();
        seen.extend(
            page.items
                .iter()
                .filter_map(Node::id)
                .map(str::to_string)
                .collect::<Vec<_>>(),
        );
        match next_token(&page) {
            Some(token) => after = Some(token),
            None => break,
        }
    }

    // update-time descending, every member exactly once
    assert_eq!(
        seen,
        [
            "/alice/notes/4",
            "/alice/notes/3",
            "/alice/notes/2",
            "/alice/notes/1",
            "/alice/notes/0"
        ]
    );
    // the first link always resets the cursor; it never equals next
    assert_eq!(
        first_link,
        Some(Node::Id("/alice/notes?after=".to_string()))
    );
}

#[tokio::test]
async fn empty_collections_page_without_links() {
    let store = shared();
    seed(&store, collection("/alice/notes", ALICE, Some("Public"))).await;

    let bus = Bus::anonymous(store);
    let page = bus
        .load_collection_page("/alice/notes", 42, None)
        .await
        .unwrap();
    assert_eq!(page.total_items, Some(0));
    assert!(page.items.is_empty());
    assert!(page.first.is_none());
    assert!(page.next.is_none());
}

#[tokio::test]
async fn unregistered_types_produce_an_empty_result() {
    let store = shared();
    let worker = Worker::new(store.clone(), RuleRegistry::builtin());

    let alice = Bus::new(Some(ALICE), store);
    let mut activity = Object::new(["Fnord"]);
    alice.send(&mut activity).await.unwrap();

    let done = worker.run(activity).await.unwrap();
    assert!(done.result.is_empty());
    assert!(done.duration.is_some());
}

#[tokio::test]
async fn create_persists_and_fills_attribution() {
    let store = shared();
    seed(&store, collection("/alice/notes", ALICE, Some("Public"))).await;
    let worker = Worker::new(store.clone(), RuleRegistry::builtin()).strict(true);

    let alice = Bus::new(Some(ALICE), store.clone());
    let mut note = Object::with_id("/alice/notes/1", ["Note"]);
    note.content = vec![serde_json::json!("Hello, world!")];
    let mut activity = create_activity(vec![Node::from(note)]);
    activity.audience = vec!["Public".into()];
    alice.send(&mut activity).await.unwrap();

    let done = worker.run(activity).await.unwrap();
    assert_eq!(done.result.len(), 1);

    let stored = store.load("/alice/notes/1").await.unwrap().unwrap();
    assert_eq!(stored.attributed_to, vec![Node::Id(ALICE.into())]);
    assert_eq!(stored.audience, vec![Node::Id("Public".into())]);
    assert!(stored.published.is_some());
    assert!(stored.updated.is_some());
}

#[tokio::test]
async fn create_requires_an_identifier() {
    let store = shared();
    let worker = Worker::new(store.clone(), RuleRegistry::builtin()).strict(true);

    let alice = Bus::new(Some(ALICE), store);
    let mut activity = create_activity(vec![Node::from(Object::new(["Note"]))]);
    alice.send(&mut activity).await.unwrap();

    assert!(matches!(
        worker.run(activity).await,
        Err(BusError::Validation(_))
    ));
}

#[tokio::test]
async fn create_refuses_unauthorized_addresses() {
    let store = shared();
    seed(&store, collection("/alice/notes", ALICE, Some("Public"))).await;
    let worker = Worker::new(store.clone(), RuleRegistry::builtin()).strict(true);

    let bob = Bus::new(Some(BOB), store.clone());
    let mut activity =
        create_activity(vec![Node::from(Object::with_id("/alice/notes/2", ["Note"]))]);
    bob.send(&mut activity).await.unwrap();

    assert!(matches!(
        worker.run(activity).await,
        Err(BusError::Forbidden)
    ));
    assert_eq!(store.load("/alice/notes/2").await.unwrap(), None);
}

#[tokio::test]
async fn add_requires_a_collection_target() {
    let store = shared();
    seed(&store, collection("/alice/notes", ALICE, Some("Public"))).await;
    seed(&store, {
        let mut note = Object::with_id("/alice/notes/1", ["Note"]);
        note.audience = vec!["Public".into()];
        note
    })
    .await;
    let worker = Worker::new(store.clone(), RuleRegistry::builtin()).strict(true);

    let alice = Bus::new(Some(ALICE), store);
    let mut activity = Object::new(["Add"]);
    activity.objects = vec![Node::from("/alice/notes/1")];
    activity.targets = vec![Node::from("/alice/notes/1")];
    alice.send(&mut activity).await.unwrap();

    assert!(matches!(
        worker.run(activity).await,
        Err(BusError::Validation(_))
    ));
}

#[tokio::test]
async fn retried_adds_duplicate_membership_rows() {
    let store = shared();
    seed(&store, collection("/alice/notes", ALICE, Some("Public"))).await;
    let worker = Worker::new(store.clone(), RuleRegistry::builtin()).strict(true);
    let alice = Bus::new(Some(ALICE), store.clone());

    for _ in 0..2 {
        let mut activity = Object::new(["Add"]);
        activity.objects = vec![Node::from(Object::with_id("/alice/notes/1", ["Note"]))];
        activity.targets = vec![Node::from("/alice/notes")];
        alice.send(&mut activity).await.unwrap();
        worker.run(activity).await.unwrap();
    }

    let results = store.search(&Query::collection("/alice/notes")).await.unwrap();
    assert_eq!(results.total, 2);
}

struct Boom;

#[async_trait]
impl Rule for Boom {
    async fn apply(&self, _store: &Arc<dyn Store>, _activity: &Object) -> Result<Vec<Object>> {
        Err(BusError::Validation("boom".to_string()))
    }
}

#[tokio::test]
async fn failures_are_captured_and_durably_recorded() {
    let store = shared();
    let mut registry = RuleRegistry::new();
    registry.register("Explode", Arc::new(Boom));
    let worker = Worker::new(store.clone(), registry);

    let alice = Bus::new(Some(ALICE), store.clone());
    let mut activity = Object::new(["Explode"]);
    alice.send(&mut activity).await.unwrap();
    let id = activity.id.clone().unwrap();

    let done = worker.run(activity).await.unwrap();
    assert_eq!(done.result.len(), 1);
    let error = done.result[0].as_object().unwrap();
    assert!(error.has_type("Error"));
    assert_eq!(error.name, vec!["ValidationError"]);
    assert!(done.duration.is_some());

    // the attempt is a permanent audit record
    let recorded = store.load(&id).await.unwrap().unwrap();
    assert_eq!(recorded.result.len(), 1);
}

#[tokio::test]
async fn strict_mode_propagates_but_still_persists() {
    let store = shared();
    let mut registry = RuleRegistry::new();
    registry.register("Explode", Arc::new(Boom));
    let worker = Worker::new(store.clone(), registry).strict(true);

    let alice = Bus::new(Some(ALICE), store.clone());
    let mut activity = Object::new(["Explode"]);
    alice.send(&mut activity).await.unwrap();
    let id = activity.id.clone().unwrap();

    assert!(matches!(
        worker.run(activity).await,
        Err(BusError::Validation(_))
    ));
    let recorded = store.load(&id).await.unwrap().unwrap();
    assert!(recorded.result.is_empty());
    assert!(recorded.duration.is_some());
}

#[tokio::test]
async fn fail_dead_letters_with_a_tombstone() {
    let store = shared();
    let worker = Worker::new(store.clone(), RuleRegistry::builtin());

    let alice = Bus::new(Some(ALICE), store.clone());
    let mut activity = Object::new(["Create"]);
    alice.send(&mut activity).await.unwrap();
    let id = activity.id.clone().unwrap();

    let verdict = vec![Node::from(Object::error("Unrecoverable", "gave up", ""))];
    let dead = worker.fail(activity, verdict).await.unwrap();
    assert_eq!(dead.types, vec!["Tombstone"]);
    assert_eq!(dead.former_types, vec!["Create"]);
    assert_eq!(dead.result.len(), 1);

    let recorded = store.load(&id).await.unwrap().unwrap();
    assert_eq!(recorded.types, vec!["Tombstone"]);
}

#[tokio::test]
async fn sys_provisions_user_roots_through_the_pipeline() {
    let store = shared();
    let worker = Worker::new(store.clone(), RuleRegistry::builtin()).strict(true);

    let sys = Bus::system(store.clone());
    let mut activity = create_activity(vec![Node::from(collection("/alice", ALICE, None))]);
    sys.send(&mut activity).await.unwrap();
    worker.run(activity).await.unwrap();

    let root = store.load("/alice").await.unwrap().unwrap();
    assert_eq!(root.attributed_to, vec![Node::Id(ALICE.into())]);
}

#[tokio::test]
async fn query_reaches_the_shared_store() {
    let store = shared();
    let mut note = Object::with_id("/alice/notes/1", ["Note"]);
    note.touch();
    store.add("/alice/notes", &note, true).await.unwrap();

    let bus = Bus::system(store);
    let results = bus.query(&Query::collection("/alice/notes")).await.unwrap();
    assert_eq!(results.total, 1);
}

#[tokio::test]
async fn end_to_end_create_link_and_list() {
    let store = shared();
    let worker = Worker::new(store.clone(), RuleRegistry::builtin()).strict(true);
    // user root provisioned at signup, outside the pipeline
    seed(&store, collection("/alice", ALICE, None)).await;

    let alice = Bus::new(Some(ALICE), store.clone());

    // create the collection
    let mut create_collection =
        create_activity(vec![Node::from(collection("/alice/notes", ALICE, Some("Public")))]);
    alice.send(&mut create_collection).await.unwrap();
    worker.run(create_collection).await.unwrap();

    // create the note
    let mut note = Object::with_id("/alice/notes/1", ["Note"]);
    note.content = vec![serde_json::json!("Hello, world!")];
    let mut create_note = create_activity(vec![Node::from(note)]);
    alice.send(&mut create_note).await.unwrap();
    let done = worker.run(create_note).await.unwrap();
    let created = done.result[0].clone();

    // link it into the collection
    let mut add = Object::new(["Add"]);
    add.objects = vec![created];
    add.targets = vec![Node::from("/alice/notes")];
    alice.send(&mut add).await.unwrap();
    worker.run(add).await.unwrap();

    // the listing shows the member, world-readable
    let anonymous = Bus::anonymous(store);
    let page = anonymous
        .load_collection_page("/alice/notes", 42, None)
        .await
        .unwrap();
    assert_eq!(page.total_items, Some(1));
    let member = page.items[0].as_object().unwrap();
    assert_eq!(member.content, vec![serde_json::json!("Hello, world!")]);

    // and the note dereferences directly
    let fetched = anonymous
        .dereference(&Node::from("/alice/notes/1"))
        .await
        .unwrap()
        .unwrap();
    assert!(fetched.has_type("Note"));
    assert_eq!(fetched.content, vec![serde_json::json!("Hello, world!")]);
}
