use super::*;
use std::collections::BTreeSet;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Map};
use shared::domain::Subject;
use storage::MemoryDocumentStore;

struct UnreachableStore;

#[async_trait]
impl DocumentStore for UnreachableStore {
    fn backend_name(&self) -> &'static str {
        "unreachable"
    }

    async fn get(&self, _path: &DocumentPath) -> Result<Option<Value>> {
        Err(anyhow!("connection refused"))
    }

    async fn set(&self, _path: &DocumentPath, _value: Value) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn update(&self, _path: &DocumentPath, _fields: Map<String, Value>) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn remove(&self, _path: &DocumentPath) -> Result<()> {
        Err(anyhow!("connection refused"))
    }

    async fn push(&self, _collection: &str, _value: Value) -> Result<String> {
        Err(anyhow!("connection refused"))
    }

    async fn health_check(&self) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}

fn setup() -> ApiContext {
    ApiContext::new(Arc::new(MemoryDocumentStore::new()))
}

fn ann() -> StudentFields {
    StudentFields {
        name: "Ann".into(),
        age: 20,
        roll_no: 1,
        subjects: BTreeSet::from([Subject::Mathematics]),
    }
}

#[tokio::test]
async fn empty_store_lists_no_records() {
    let ctx = setup();
    assert!(list_records(&ctx).await.expect("list").is_empty());
}

#[tokio::test]
async fn created_record_is_listed_with_assigned_id() {
    let ctx = setup();
    let created = create_record(&ctx, ann()).await.expect("create");
    assert!(!created.id.as_str().is_empty());
    assert_eq!(created.fields(), ann());

    let listed = list_records(&ctx).await.expect("list");
    assert_eq!(listed, vec![created]);
}

#[tokio::test]
async fn records_list_in_creation_order() {
    let ctx = setup();
    let mut expected = Vec::new();
    for (name, roll_no) in [("Ann", 7), ("Bob", 17), ("Cy", 3)] {
        let fields = StudentFields {
            name: name.into(),
            roll_no,
            ..ann()
        };
        expected.push(create_record(&ctx, fields).await.expect("create"));
    }
    assert_eq!(list_records(&ctx).await.expect("list"), expected);
}

#[tokio::test]
async fn update_merges_only_supplied_fields() {
    let ctx = setup();
    let created = create_record(&ctx, ann()).await.expect("create");

    update_record(
        &ctx,
        &created.id,
        StudentPatch {
            roll_no: Some(2),
            ..StudentPatch::default()
        },
    )
    .await
    .expect("update");

    let listed = list_records(&ctx).await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].roll_no, 2);
    assert_eq!(listed[0].name, "Ann");
    assert_eq!(listed[0].subjects, ann().subjects);
}

#[tokio::test]
async fn update_of_unknown_id_is_not_found_and_creates_nothing() {
    let ctx = setup();
    let err = update_record(
        &ctx,
        &RecordId::new("missing"),
        StudentPatch {
            name: Some("Ghost".into()),
            ..StudentPatch::default()
        },
    )
    .await
    .expect_err("should fail");
    assert_eq!(err.code, ErrorCode::NotFound);
    assert!(list_records(&ctx).await.expect("list").is_empty());
}

#[tokio::test]
async fn delete_is_idempotent() {
    let ctx = setup();
    let created = create_record(&ctx, ann()).await.expect("create");
    delete_record(&ctx, &created.id).await.expect("first delete");
    delete_record(&ctx, &created.id).await.expect("second delete");
    assert!(list_records(&ctx).await.expect("list").is_empty());
}

#[tokio::test]
async fn ids_that_are_not_plain_keys_are_rejected() {
    let ctx = setup();
    for bad in ["", "a/b", "../records", "x.y"] {
        let err = delete_record(&ctx, &RecordId::new(bad))
            .await
            .expect_err("should fail");
        assert_eq!(err.code, ErrorCode::Validation, "id {bad:?}");
    }
}

#[tokio::test]
async fn legacy_and_malformed_documents_are_handled() {
    let ctx = setup();
    ctx.store
        .set(
            &DocumentPath::document(RECORDS_COLLECTION, "legacy").expect("path"),
            json!({ "name": "Old", "age": "19", "rollNo": "5", "subjects": ["History"] }),
        )
        .await
        .expect("seed legacy");
    ctx.store
        .set(
            &DocumentPath::document(RECORDS_COLLECTION, "broken").expect("path"),
            json!({ "title": "not a student" }),
        )
        .await
        .expect("seed broken");

    let listed = list_records(&ctx).await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, RecordId::new("legacy"));
    assert_eq!(listed[0].age, 19);
    assert_eq!(listed[0].roll_no, 5);
}

#[tokio::test]
async fn store_failures_surface_as_store_unavailable() {
    let ctx = ApiContext::new(Arc::new(UnreachableStore));
    let id = RecordId::new("abc");

    let errors = [
        list_records(&ctx).await.expect_err("list"),
        create_record(&ctx, ann()).await.map(|_| ()).expect_err("create"),
        update_record(&ctx, &id, StudentPatch::default())
            .await
            .expect_err("update"),
        delete_record(&ctx, &id).await.expect_err("delete"),
        health(&ctx).await.expect_err("health"),
    ];
    for err in errors {
        assert_eq!(err.code, ErrorCode::StoreUnavailable, "{}", err.message);
    }
}
