use scenebook_core::{
    Document, EditorConfig, EditorError, EntityDraft, EntityKind, EntityRecord, InMemoryRegistry,
    Mark, Node, RegistryError, SceneAttrs, SceneEditor, SceneNode, ScenePatch,
};
use std::sync::Arc;
use uuid::Uuid;

fn character(id: &str, name: &str) -> EntityRecord {
    EntityRecord::new(id, name, "", EntityKind::Character)
}

fn setup(records: Vec<EntityRecord>, text: &str) -> (SceneEditor, Arc<InMemoryRegistry>, Uuid) {
    let registry = Arc::new(InMemoryRegistry::with_records(records));
    let attrs = SceneAttrs::new();
    let id = attrs.id;
    let doc = Document::from_nodes(vec![Node::Scene(SceneNode::new(
        attrs,
        vec![Node::paragraph(text)],
    ))])
    .unwrap();
    let editor = SceneEditor::with_document(doc, registry.clone(), EditorConfig::default());
    (editor, registry, id)
}

#[test]
fn participants_are_an_idempotent_set() {
    let (mut editor, _, id) = setup(Vec::new(), "x");

    assert!(editor.add_participant(id, "c1").unwrap());
    assert!(!editor.add_participant(id, "c1").unwrap());
    assert_eq!(editor.scene_attrs(id).unwrap().participants.len(), 1);

    assert!(!editor.remove_participant(id, "ghost").unwrap());
    assert!(editor.remove_participant(id, "c1").unwrap());
    assert!(editor.scene_attrs(id).unwrap().participants.is_empty());
}

#[tokio::test]
async fn registry_delete_leaves_stale_participant() {
    let (mut editor, registry, id) = setup(vec![character("e", "Eve")], "x");
    editor.add_participant(id, "e").unwrap();

    registry.remove("e").await.unwrap();
    assert!(editor.scene_attrs(id).unwrap().participants.contains("e"));
    assert!(editor.referenced_entities().contains("e"));
}

#[tokio::test]
async fn mention_lookup_filters_and_caps_candidates() {
    let mut records: Vec<EntityRecord> = (0..12)
        .map(|i| character(&format!("c{i}"), &format!("Sailor {i}")))
        .collect();
    records.push(EntityRecord::new("x", "Anchor", "rusted sailor relic", EntityKind::Item));
    let (mut editor, _, _) = setup(records, "x");

    let pending = editor.begin_mention_lookup("SAILOR");
    let completed = pending.run().await;
    let candidates = editor.finish_lookup(completed).unwrap().unwrap();
    assert_eq!(candidates.len(), 10);
    assert_eq!(candidates[0].id, "c0");
}

#[tokio::test]
async fn long_queries_filter_on_every_character() {
    let name = "a".repeat(64);
    let (mut editor, _, _) = setup(vec![character("c1", &name)], "x");

    let pending = editor.begin_mention_lookup(&format!("{name}zzz"));
    assert_eq!(pending.query().chars().count(), 67);
    let completed = pending.run().await;
    assert_eq!(editor.finish_lookup(completed).unwrap(), Some(Vec::new()));

    let completed = editor.begin_mention_lookup(&name).run().await;
    assert_eq!(editor.finish_lookup(completed).unwrap().unwrap().len(), 1);
}

#[tokio::test]
async fn superseded_lookup_results_are_dropped() {
    let (mut editor, _, _) = setup(vec![character("c1", "Ann"), character("c2", "Bob")], "x");

    let first = editor.begin_mention_lookup("a");
    let second = editor.begin_mention_lookup("b");
    let second_done = second.run().await;
    let first_done = first.run().await;

    let latest = editor.finish_lookup(second_done).unwrap().unwrap();
    assert_eq!(latest.len(), 1);
    assert_eq!(latest[0].id, "c2");
    assert_eq!(editor.finish_lookup(first_done).unwrap(), None);
}

#[tokio::test]
async fn lookup_transport_errors_are_surfaced() {
    let (mut editor, registry, _) = setup(vec![character("c1", "Ann")], "x");
    registry.set_available(false).await;

    let completed = editor.begin_mention_lookup("ann").run().await;
    let err = editor.finish_lookup(completed).unwrap_err();
    assert!(matches!(err, EditorError::Transport(RegistryError::Transport(_))));
    assert_eq!(err.kind(), "TransportError");
}

#[test]
fn trigger_detection_and_completion_insert_mention() {
    let (mut editor, _, _) = setup(Vec::new(), "Hi @an");
    // 0 scene, 1 paragraph, 2..8 "Hi @an" -> cursor at 8.
    let trigger = editor.mention_trigger_at(8).unwrap().unwrap();
    assert_eq!(trigger.from, 5);
    assert_eq!(trigger.to, 8);
    assert_eq!(trigger.trigger, '@');
    assert_eq!(trigger.query, "an");

    editor.complete_mention(&trigger, &character("c1", "Ann")).unwrap();
    assert_eq!(editor.document().text_content(), "Hi Ann ");
    let paragraph = &editor.document().content()[0].children().unwrap()[0];
    let inline = paragraph.children().unwrap();
    assert!(matches!(&inline[1], Node::Mention(attrs) if attrs.id == "c1" && attrs.label == "Ann"));
    assert!(editor.referenced_entities().contains("c1"));
}

#[test]
fn trigger_requires_word_start() {
    let (editor, _, _) = setup(Vec::new(), "mail@host and more");
    // "mail@host" ends at 11; the word does not start with the trigger.
    assert!(editor.mention_trigger_at(11).unwrap().is_none());
    assert!(editor.mention_trigger_at(12).unwrap().is_none());
    assert!(editor.mention_trigger_at(2).unwrap().is_none());

    let err = editor.mention_trigger_at(1).unwrap_err();
    assert_eq!(err.kind(), "PositionError");
}

#[test]
fn mentions_outside_textblocks_are_rejected() {
    let (mut editor, _, _) = setup(Vec::new(), "x");
    let before = editor.document().clone();
    let err = editor.insert_mention(1, &character("c1", "Ann")).unwrap_err();
    assert_eq!(err.kind(), "PositionError");
    assert_eq!(editor.document(), &before);
}

#[test]
fn mention_inside_text_splits_the_run() {
    let (mut editor, _, _) = setup(Vec::new(), "ab");
    editor.insert_mention(3, &character("c1", "Ann")).unwrap();
    assert_eq!(editor.document().text_content(), "aAnnb");
}

#[test]
fn entity_marks_apply_and_remove() {
    let (mut editor, _, _) = setup(Vec::new(), "Hello world");
    let ann = character("c1", "Ann");
    editor.apply_entity_mark(8, 13, &ann).unwrap();

    let paragraph = &editor.document().content()[0].children().unwrap()[0];
    let marked = match &paragraph.children().unwrap()[1] {
        Node::Text(run) => run.clone(),
        other => panic!("expected text, got {other:?}"),
    };
    assert_eq!(marked.text, "world");
    assert!(matches!(&marked.marks[0], Mark::Entity(attrs) if attrs.entity_id == "c1"));
    assert!(editor.referenced_entities().contains("c1"));

    editor.remove_entity_mark(2, 13, "c1").unwrap();
    assert!(editor.referenced_entities().is_empty());
}

#[tokio::test]
async fn location_creation_assigns_on_success() {
    let (mut editor, registry, id) = setup(Vec::new(), "x");

    let pending = editor
        .begin_location_creation(id, EntityDraft::new("Harbor", EntityKind::Location))
        .unwrap();
    let completed = pending.run().await;
    let record = editor.finish_location_creation(completed).unwrap();

    let attrs = editor.scene_attrs(id).unwrap();
    assert_eq!(attrs.location, "Harbor");
    assert_eq!(attrs.location_id.as_deref(), Some(record.id.as_str()));
    assert!(!editor.is_creation_pending(id));
    assert_eq!(registry.get(&record.id).await, Some(record));
}

#[tokio::test]
async fn location_creation_failure_leaves_location_unchanged() {
    let (mut editor, registry, id) = setup(Vec::new(), "x");
    editor
        .assign_location(id, &EntityRecord::new("l0", "Inn", "", EntityKind::Location))
        .unwrap();
    registry.set_available(false).await;

    let completed = editor
        .begin_location_creation(id, EntityDraft::new("Harbor", EntityKind::Location))
        .unwrap()
        .run()
        .await;
    let err = editor.finish_location_creation(completed).unwrap_err();
    assert_eq!(err.kind(), "TransportError");

    let attrs = editor.scene_attrs(id).unwrap();
    assert_eq!(attrs.location, "Inn");
    assert_eq!(attrs.location_id.as_deref(), Some("l0"));
    assert!(!editor.is_creation_pending(id));
}

#[tokio::test]
async fn location_creation_for_deleted_scene_reports_not_found() {
    let (mut editor, _, id) = setup(Vec::new(), "x");
    editor.insert_scene(None, ScenePatch::default()).unwrap();

    let pending = editor
        .begin_location_creation(id, EntityDraft::new("Harbor", EntityKind::Location))
        .unwrap();
    editor.delete_scene(id).unwrap();
    let err = editor.finish_location_creation(pending.run().await).unwrap_err();
    assert_eq!(err.kind(), "NotFound");
}

#[tokio::test]
async fn location_lookup_only_offers_places() {
    let (mut editor, _, id) = setup(
        vec![
            character("c1", "Harbor master"),
            EntityRecord::new("l1", "Harbor", "", EntityKind::Location),
        ],
        "x",
    );
    let candidates = {
        let completed = editor.begin_location_lookup("harbor").run().await;
        editor.finish_lookup(completed).unwrap().unwrap()
    };
    assert_eq!(candidates.len(), 1);

    editor.assign_location(id, &candidates[0]).unwrap();
    editor.clear_location(id).unwrap();
    let attrs = editor.scene_attrs(id).unwrap();
    assert!(attrs.location.is_empty());
    assert!(attrs.location_id.is_none());
}
