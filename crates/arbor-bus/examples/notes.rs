//! A minimal walk through the activity pipeline: provision a user root,
//! create a public collection and a note, link the note in, then list the
//! collection anonymously.
//!
//! Run with `cargo run --example notes`.

use std::sync::Arc;

use arbor_bus::{Bus, RuleRegistry, Worker};
use arbor_model::{Node, Object};
use arbor_store::MemoryStore;

const ALICE: &str = "/accounts/alice";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "debug".into()),
        )
        .init();

    let store = MemoryStore::shared();
    let worker = Worker::new(store.clone(), RuleRegistry::builtin()).strict(true);

    // user root, provisioned by the system principal at signup
    let sys = Bus::system(store.clone());
    let mut root = Object::with_id("/alice", ["Collection"]);
    root.attributed_to = vec![ALICE.into()];
    let mut signup = Object::new(["Create"]);
    signup.objects = vec![Node::from(root)];
    sys.send(&mut signup).await?;
    worker.run(signup).await?;

    let alice = Bus::new(Some(ALICE), store.clone());

    let mut notes = Object::with_id("/alice/notes", ["Collection"]);
    notes.audience = vec!["Public".into()];
    let mut create_notes = Object::new(["Create"]);
    create_notes.objects = vec![Node::from(notes)];
    alice.send(&mut create_notes).await?;
    worker.run(create_notes).await?;

    let mut note = Object::with_id("/alice/notes/1", ["Note"]);
    note.content = vec!["Hello, world!".into()];
    let mut create_note = Object::new(["Create"]);
    create_note.objects = vec![Node::from(note)];
    alice.send(&mut create_note).await?;
    let done = worker.run(create_note).await?;

    let mut add = Object::new(["Add"]);
    add.objects = vec![done.result[0].clone()];
    add.targets = vec![Node::from("/alice/notes")];
    alice.send(&mut add).await?;
    worker.run(add).await?;

    let anonymous = Bus::anonymous(store);
    let page = anonymous.load_collection_page("/alice/notes", 42, None).await?;
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}
