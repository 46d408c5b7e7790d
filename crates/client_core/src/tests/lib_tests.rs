use super::*;

use std::sync::Arc;

use server::{build_router, AppState};
use server_api::ApiContext;
use shared::{domain::Subject, error::ErrorCode};
use storage::MemoryDocumentStore;
use tokio::net::TcpListener;

async fn spawn_records_server() -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let api = ApiContext::new(Arc::new(MemoryDocumentStore::new()));
    let app = build_router(Arc::new(AppState::new(api)));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}"))
}

fn ann() -> StudentFields {
    StudentFields {
        name: "Ann".into(),
        age: 20,
        roll_no: 1,
        subjects: [Subject::Mathematics].into(),
    }
}

#[test]
fn records_url_is_joined_onto_server_url() {
    let client = RecordsClient::new("http://127.0.0.1:8080/").expect("client");
    assert_eq!(client.records_url().as_str(), "http://127.0.0.1:8080/records");
    let client = RecordsClient::new("http://127.0.0.1:8080").expect("client");
    assert_eq!(client.records_url().as_str(), "http://127.0.0.1:8080/records");
    assert!(RecordsClient::new("not a url").is_err());
}

#[test]
fn records_url_keeps_server_path_prefix() {
    for server_url in ["http://host/api", "http://host/api/"] {
        let client = RecordsClient::new(server_url).expect("client");
        assert_eq!(client.records_url().as_str(), "http://host/api/records");
    }
}

#[tokio::test]
async fn client_round_trips_through_http() -> Result<()> {
    let server_url = spawn_records_server().await?;
    let client = RecordsClient::new(&server_url)?;

    assert!(client.list_records().await?.is_empty());

    let created = client.create_record(&ann()).await?;
    assert_eq!(created.name, "Ann");

    let patch = StudentPatch {
        roll_no: Some(2),
        ..StudentPatch::default()
    };
    client.update_record(&created.id, &patch).await?;

    let listed = client.list_records().await?;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].roll_no, 2);
    assert_eq!(listed[0].age, 20);

    client.delete_record(&created.id).await?;
    client.delete_record(&created.id).await?;
    assert!(client.list_records().await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn server_error_body_becomes_api_exception() -> Result<()> {
    let server_url = spawn_records_server().await?;
    let client = RecordsClient::new(&server_url)?;

    let patch = StudentPatch {
        name: Some("Ghost".into()),
        ..StudentPatch::default()
    };
    let err = client
        .update_record(&RecordId::new("missing"), &patch)
        .await
        .expect_err("unknown id");
    let api = err.downcast_ref::<ApiException>().expect("api exception");
    assert_eq!(api.code, ErrorCode::NotFound);

    let err = client
        .delete_record(&RecordId::new("   "))
        .await
        .expect_err("blank id");
    let api = err.downcast_ref::<ApiException>().expect("api exception");
    assert_eq!(api.code, ErrorCode::MissingParameter);
    Ok(())
}

#[tokio::test]
async fn controller_drives_the_http_client() -> Result<()> {
    let server_url = spawn_records_server().await?;
    let mut controller = StudentController::new(RecordsClient::new(&server_url)?);
    controller.load().await?;

    let draft = Draft {
        name: "Bob".into(),
        age: "22".into(),
        roll_no: "7".into(),
        subjects: vec![Subject::Physics, Subject::Chemistry],
    };
    let bob = controller.add_record(draft).await?;

    let mut reloaded = StudentController::new(RecordsClient::new(&server_url)?);
    reloaded.load().await?;
    assert_eq!(reloaded.all_records(), &[bob]);
    Ok(())
}

#[tokio::test]
async fn unreachable_server_is_a_request_error() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");

    let mut controller = StudentController::new(RecordsClient::new(&format!("http://{addr}"))?);
    let err = controller.load().await.expect_err("nothing listening");
    assert!(matches!(err, ControllerError::Request { action: "load records", .. }));
    assert!(controller.error().is_some());
    Ok(())
}
