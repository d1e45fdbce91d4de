use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use csv_pager::error::{ClientError, GENERIC_UPLOAD_ERROR};
use csv_pager::models::{FileId, FileStatus, UploadOutcome};
use csv_pager::upload::{ProgressCallback, UploadEndpoint, UploadSource};
use csv_pager::viewer::table_rows;
use csv_pager::{ApiClient, RemoteData};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use url::Url;

#[derive(Default)]
struct Seen {
    page_queries: Vec<(String, u32, u32)>,
    upload_fields: Vec<String>,
}

type Shared = Arc<Mutex<Seen>>;

#[derive(Deserialize)]
struct PageQuery {
    page: u32,
    page_size: u32,
}

async fn list_files() -> Json<Value> {
    Json(json!({
        "files": [
            {
                "file_id": "a1",
                "filename": "sales.csv",
                "file_size": 2048,
                "status": "completed",
                "processing_progress": 100.0,
                "total_rows": 250,
                "created_at": "2024-03-01T10:00:00Z"
            },
            {
                "file_id": "b2",
                "filename": "big.csv",
                "file_size": 734003200,
                "status": "processing",
                "processing_progress": 42.5,
                "created_at": "2024-03-01T11:00:00Z"
            }
        ]
    }))
}

async fn file_status(Path(id): Path<String>) -> impl IntoResponse {
    if id != "a1" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "File not found" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "file_id": "a1",
            "filename": "sales.csv",
            "file_size": 2048,
            "status": "completed",
            "total_rows": 250,
            "created_at": "2024-03-01T10:00:00Z"
        })),
    )
}

async fn file_data(
    State(seen): State<Shared>,
    Path(id): Path<String>,
    Query(query): Query<PageQuery>,
) -> impl IntoResponse {
    seen.lock()
        .unwrap()
        .page_queries
        .push((id.clone(), query.page, query.page_size));

    match id.as_str() {
        "a1" => {
            let total: u32 = 250;
            let start = (query.page - 1) * query.page_size;
            let end = (start + query.page_size).min(total);
            let data: Vec<Value> = (start..end)
                .map(|i| json!({ "id": i + 1, "name": format!("row {}", i + 1) }))
                .collect();
            let total_pages = total.div_ceil(query.page_size);
            (
                StatusCode::OK,
                Json(json!({
                    "columns": ["id", "name"],
                    "data": data,
                    "page": query.page,
                    "page_size": query.page_size,
                    "total_rows": total,
                    "total_pages": total_pages,
                    "has_previous": query.page > 1,
                    "has_next": query.page < total_pages
                })),
            )
        }
        "b2" => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "File processing not completed" })),
        ),
        _ => (StatusCode::NOT_FOUND, Json(json!({ "error": "File not found" }))),
    }
}

async fn delete_file(Path(id): Path<String>) -> impl IntoResponse {
    if id == "a1" {
        (StatusCode::OK, Json(json!({ "message": "deleted" })))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({ "error": "File not found" })))
    }
}

async fn upload_small(State(seen): State<Shared>, mut multipart: Multipart) -> impl IntoResponse {
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        let filename = field.file_name().unwrap_or_default().to_string();
        let body = field.bytes().await.unwrap();
        seen.lock().unwrap().upload_fields.push(name.clone());

        if name != "file" {
            continue;
        }
        if !filename.ends_with(".csv") {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "File must be a CSV" })),
            );
        }

        let text = String::from_utf8(body.to_vec()).unwrap();
        let mut lines = text.lines();
        let columns: Vec<String> = lines
            .next()
            .unwrap_or_default()
            .split(',')
            .map(String::from)
            .collect();
        let rows: Vec<Value> = lines
            .map(|line| {
                let record: serde_json::Map<String, Value> = columns
                    .iter()
                    .zip(line.split(','))
                    .map(|(c, v)| (c.clone(), Value::String(v.to_string())))
                    .collect();
                Value::Object(record)
            })
            .collect();

        return (
            StatusCode::OK,
            Json(json!({
                "message": "File uploaded successfully",
                "filename": filename,
                "dataframe_info": {
                    "shape": [rows.len(), columns.len()],
                    "columns": columns,
                    "dtypes": { "id": "int64", "name": "object" },
                    "head": rows,
                    "info": { "memory_usage": 4096, "null_counts": { "id": 0, "name": 0 } }
                }
            })),
        );
    }

    (StatusCode::BAD_REQUEST, Json(json!({ "error": "No file provided" })))
}

async fn upload_large() -> impl IntoResponse {
    (StatusCode::INTERNAL_SERVER_ERROR, "boom")
}

async fn disk_space() -> Json<Value> {
    Json(json!({
        "free_space": { "bytes": 53687091200u64, "formatted": "50 GB" },
        "total_space": { "bytes": 107374182400u64, "formatted": "100 GB" },
        "used_space": { "bytes": 53687091200u64, "formatted": "50 GB" },
        "usage_percentage": 50.0
    }))
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn spawn_server() -> (ApiClient, Shared) {
    let seen: Shared = Arc::default();
    let app = Router::new()
        .route("/api/files/", get(list_files))
        .route("/api/files/:id/", get(file_status))
        .route("/api/files/:id/data/", get(file_data))
        .route("/api/files/:id/delete/", delete(delete_file))
        .route("/api/upload-csv/", post(upload_small))
        .route("/api/upload-large-csv/", post(upload_large))
        .route("/api/disk-space/", get(disk_space))
        .route("/api/health/", get(health))
        .with_state(seen.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base_url = Url::parse(&format!("http://{}", addr)).unwrap();
    (ApiClient::new(base_url), seen)
}

fn recorder() -> (ProgressCallback, Arc<Mutex<Vec<f32>>>) {
    let values = Arc::new(Mutex::new(Vec::new()));
    let sink = values.clone();
    let callback: ProgressCallback = Arc::new(move |p| sink.lock().unwrap().push(p));
    (callback, values)
}

#[tokio::test]
async fn test_list_files_parses_both_statuses() {
    let (client, _) = spawn_server().await;

    let files = client.list_files().await.unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].file_id, FileId::from("a1"));
    assert_eq!(files[0].status, FileStatus::Completed);
    assert_eq!(files[0].total_rows, Some(250));
    assert_eq!(files[1].status, FileStatus::Processing);
    assert_eq!(files[1].total_rows, None);
    assert!((files[1].processing_progress - 42.5).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_file_status_and_missing_file() {
    let (client, _) = spawn_server().await;

    let file = client.file_status(&FileId::from("a1")).await.unwrap();
    assert_eq!(file.filename, "sales.csv");

    let err = client.file_status(&FileId::from("zz")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_fetch_page_sends_window_and_reads_flags() {
    let (client, seen) = spawn_server().await;

    let page = client.fetch_page(&FileId::from("a1"), 2, 100).await.unwrap();

    assert_eq!(
        seen.lock().unwrap().page_queries,
        vec![("a1".to_string(), 2, 100)]
    );
    assert_eq!(page.columns, vec!["id", "name"]);
    assert_eq!(page.data.len(), 100);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_previous);
    assert!(page.has_next);
    assert_eq!(page.range_label(), "Showing 101 to 200 of 250 rows");
    assert_eq!(page.page_label(), "Page 2 of 3");

    let last = client.fetch_page(&FileId::from("a1"), 3, 100).await.unwrap();
    assert_eq!(last.data.len(), 50);
    assert!(!last.has_next);
    assert_eq!(last.range_label(), "Showing 201 to 250 of 250 rows");
}

#[tokio::test]
async fn test_fetch_page_maps_missing_and_unfinished_files() {
    let (client, _) = spawn_server().await;

    let err = client.fetch_page(&FileId::from("zz"), 1, 100).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(ref id) if id.as_str() == "zz"));

    let err = client.fetch_page(&FileId::from("b2"), 1, 100).await.unwrap_err();
    match err {
        ClientError::NotReady { id, message } => {
            assert_eq!(id.as_str(), "b2");
            assert_eq!(message, "File processing not completed");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_delete_treats_missing_file_as_deleted() {
    let (client, _) = spawn_server().await;

    client.delete_file(&FileId::from("a1")).await.unwrap();
    client.delete_file(&FileId::from("already-gone")).await.unwrap();
}

#[tokio::test]
async fn test_small_upload_returns_dataframe_info() {
    let (client, seen) = spawn_server().await;

    let mut csv = String::from("id,name\n");
    for i in 1..=10 {
        csv.push_str(&format!("{},row {}\n", i, i));
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ten.csv");
    std::fs::write(&path, &csv).unwrap();

    let source = UploadSource::from_path(&path).unwrap();
    assert_eq!(source.len(), csv.len() as u64);

    let (callback, progress) = recorder();
    let outcome = client
        .upload_file(source, UploadEndpoint::Small, callback)
        .await
        .unwrap();

    assert_eq!(seen.lock().unwrap().upload_fields, vec!["file"]);

    let response = match outcome {
        UploadOutcome::Parsed(response) => response,
        other => panic!("expected parsed outcome, got {:?}", other),
    };
    assert_eq!(response.filename, "ten.csv");
    assert_eq!(response.dataframe_info.shape, [10, 2]);
    assert_eq!(response.dataframe_info.memory_usage_kb(), 4);

    let rows = table_rows(&response.dataframe_info.columns, &response.dataframe_info.head);
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[9], vec!["10", "row 10"]);

    let progress = progress.lock().unwrap().clone();
    assert_eq!(progress.first(), Some(&0.0));
    assert_eq!(progress.last(), Some(&100.0));
    assert!(progress.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_upload_rejection_uses_service_message() {
    let (client, _) = spawn_server().await;

    let source = UploadSource::from_bytes("notes.txt", "hello");
    let (callback, _) = recorder();
    let err = client
        .upload_file(source, UploadEndpoint::Small, callback)
        .await
        .unwrap_err();

    match err {
        ClientError::Rejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "File must be a CSV");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_upload_rejection_without_payload_falls_back() {
    let (client, _) = spawn_server().await;

    let source = UploadSource::from_bytes("big.csv", "a,b\n1,2\n");
    let (callback, _) = recorder();
    let err = client
        .upload_file(source, UploadEndpoint::Large, callback)
        .await
        .unwrap_err();

    match err {
        ClientError::Rejected { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, GENERIC_UPLOAD_ERROR);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_disk_space_and_health() {
    let (client, _) = spawn_server().await;

    let disk = client.fetch_disk_space().await.unwrap();
    assert_eq!(disk.free_space.formatted, "50 GB");
    assert_eq!(disk.total_space.bytes, 107374182400);
    assert!((disk.usage_percentage - 50.0).abs() < f32::EPSILON);

    let health = client.health_check().await.unwrap();
    assert_eq!(health.status, "healthy");
}
