use scenebook_core::{migrate, Document, WireError};
use serde_json::{json, Value};
use std::collections::BTreeSet;

fn legacy_payload() -> Value {
    json!({
        "type": "doc",
        "content": [
            { "type": "paragraph", "content": [{ "type": "text", "text": "Before" }] },
            {
                "type": "scene",
                "attrs": { "id": "6f1c3c1e-2b7a-4c55-9f43-0d1d6a4bb001", "slug": "Dock" },
                "content": [
                    {
                        "type": "paragraph",
                        "content": [
                            { "type": "text", "text": "Ann", "marks": [
                                { "type": "entity",
                                  "attrs": { "entityId": "c1", "entityType": "character" } },
                                { "type": "bold" }
                            ]},
                            { "type": "mention", "attrs": { "id": "c2", "label": "Bob" } }
                        ]
                    }
                ]
            },
            {
                "type": "scene",
                "attrs": { "id": "6f1c3c1e-2b7a-4c55-9f43-0d1d6a4bb001" }
            },
            { "type": "horizontalRule" }
        ]
    })
}

#[test]
fn migrated_documents_survive_json_round_trip() {
    let decoded = Document::from_json_value(legacy_payload()).unwrap();
    assert!(decoded.partition_violation().is_some());

    let migrated = migrate(&decoded);
    assert!(migrated.partition_violation().is_none());
    assert_eq!(migrated.scene_count(), 4);

    let reloaded = Document::from_json_str(&migrated.to_json_string()).unwrap();
    assert_eq!(reloaded, migrated);
    assert_eq!(reloaded.to_json_value(), migrated.to_json_value());
}

#[test]
fn migration_is_idempotent_through_wire_form() {
    let once = migrate(&Document::from_json_value(legacy_payload()).unwrap());
    let reparsed = Document::from_json_str(&once.to_json_string()).unwrap();
    let twice = migrate(&reparsed);
    assert_eq!(twice, once);
}

#[test]
fn migration_preserves_text_order() {
    let decoded = Document::from_json_value(legacy_payload()).unwrap();
    assert_eq!(decoded.text_content(), "Before\nAnnBob");
    // The empty duplicate scene gains an empty paragraph, hence the trailing line.
    assert_eq!(migrate(&decoded).text_content(), "Before\nAnnBob\n");
}

#[test]
fn scene_attrs_use_persisted_key_names() {
    let doc = migrate(&Document::from_json_value(legacy_payload()).unwrap());
    let value = doc.to_json_value();
    let scene = &value["content"][1];
    assert_eq!(scene["type"], "scene");

    let keys: BTreeSet<&str> = scene["attrs"]
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    let expected: BTreeSet<&str> = [
        "id",
        "slug",
        "location",
        "locationId",
        "status",
        "collapsed",
        "characters",
        "goal",
        "event",
        "change",
        "metaExpanded",
    ]
    .into_iter()
    .collect();
    assert_eq!(keys, expected);
    assert_eq!(scene["attrs"]["slug"], "Dock");
    assert_eq!(scene["attrs"]["status"], "draft");
    assert_eq!(scene["attrs"]["characters"], json!([]));
}

#[test]
fn unknown_marks_round_trip_untouched() {
    let doc = Document::from_json_value(legacy_payload()).unwrap();
    let value = doc.to_json_value();
    let marks = &value["content"][1]["content"][0]["content"][0]["marks"];
    assert_eq!(marks[1], json!({ "type": "bold" }));
    assert_eq!(marks[0]["attrs"]["entityId"], "c1");
}

#[test]
fn malformed_payloads_are_rejected() {
    let err = Document::from_json_str("{ not json").unwrap_err();
    assert!(matches!(err, WireError::Json(_)));

    let err = Document::from_json_value(json!({
        "type": "doc",
        "content": [{ "type": "scene", "attrs": { "status": "published" }, "content": [
            { "type": "paragraph" }
        ]}]
    }))
    .unwrap_err();
    assert!(matches!(err, WireError::InvalidAttrs { .. }));
}

#[test]
fn empty_document_round_trips() {
    let doc = Document::empty();
    assert_eq!(doc.to_json_value(), json!({ "type": "doc", "content": [] }));
    assert_eq!(Document::from_json_value(json!({ "type": "doc" })).unwrap(), doc);
    assert!(doc.content().is_empty());
}

#[test]
fn foreign_attrs_and_node_types_round_trip() {
    let value = json!({
        "type": "doc",
        "content": [{
            "type": "scene",
            "attrs": {
                "id": "6f1c3c1e-2b7a-4c55-9f43-0d1d6a4bb002",
                "slug": "Keep", "location": "", "locationId": null, "status": "draft",
                "collapsed": false, "characters": [], "goal": "", "event": "",
                "change": "", "metaExpanded": false
            },
            "content": [
                {
                    "type": "paragraph",
                    "attrs": { "textAlign": "center" },
                    "content": [
                        { "type": "text", "text": "Guild", "marks": [
                            { "type": "entity",
                              "attrs": { "entityId": "f1", "entityType": "faction" } }
                        ]},
                        { "type": "mention", "attrs": {
                            "id": "f2", "label": "Crown", "entityType": "faction"
                        }},
                        { "type": "emoji", "attrs": { "name": "crown" } }
                    ]
                },
                {
                    "type": "heading",
                    "attrs": { "level": 3, "id": "h-1" },
                    "content": [{ "type": "text", "text": "Oath" }]
                },
                {
                    "type": "blockquote",
                    "attrs": { "cite": "ledger" },
                    "content": [{ "type": "paragraph" }]
                },
                {
                    "type": "bulletList",
                    "content": [{ "type": "listItem", "content": [
                        { "type": "paragraph", "content": [{ "type": "text", "text": "one" }] }
                    ]}]
                },
                { "type": "codeBlock", "attrs": { "language": "rust" },
                  "content": [{ "type": "text", "text": "fn main() {}" }] }
            ]
        }]
    });

    let doc = Document::from_json_value(value.clone()).unwrap();
    assert_eq!(doc.to_json_value(), value);
    assert_eq!(migrate(&doc), doc);

    let encoded = doc.to_json_value();
    let line = &encoded["content"][0]["content"][0]["content"];
    assert_eq!(line[0]["marks"][0]["attrs"]["entityType"], "faction");
    assert_eq!(line[1]["attrs"]["entityType"], "faction");
    assert_eq!(doc.text_content(), "GuildCrown\nOath\n");
}
