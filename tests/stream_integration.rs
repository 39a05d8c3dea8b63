//! End-to-end tests: a real server (or a scripted raw socket standing in
//! for one) on one side, the real streaming consumer on the other.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use corpus_chat::config::{
    ChunkingConfig, ClientConfig, Config, DbConfig, GeneratorConfig, RetrievalConfig,
    ServerConfig, StreamConfig,
};
use corpus_chat::consumer::ChatClient;
use corpus_chat::models::ChatRequest;
use corpus_chat::server;
use corpus_chat::session::SessionStatus;

fn test_config(db_path: PathBuf) -> Config {
    Config {
        db: DbConfig { path: db_path },
        chunking: ChunkingConfig::default(),
        retrieval: RetrievalConfig::default(),
        generator: GeneratorConfig::default(),
        stream: StreamConfig::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
        client: ClientConfig::default(),
        sync: None,
    }
}

/// Spawn the real server on an ephemeral port; returns its base URL.
async fn spawn_server(config: &Config) -> String {
    let app = server::build_app(config).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client_for(base_url: &str) -> ChatClient {
    let client_config = ClientConfig {
        base_url: base_url.to_string(),
        connect_timeout_secs: 5,
    };
    ChatClient::new(&client_config, &StreamConfig::default()).unwrap()
}

enum Step {
    Write(&'static str),
    Sleep(u64),
}

/// Spawn a one-shot scripted HTTP responder. Lets tests control framing,
/// pacing, and abrupt closes at the byte level.
async fn spawn_scripted_stream(status_line: &'static str, script: Vec<Step>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            // Drain the request head; the exact bytes don't matter.
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;

            let head = format!(
                "{}\r\ncontent-type: text/event-stream\r\nconnection: close\r\n\r\n",
                status_line
            );
            let _ = socket.write_all(head.as_bytes()).await;
            let _ = socket.flush().await;

            for step in script {
                match step {
                    Step::Write(s) => {
                        let _ = socket.write_all(s.as_bytes()).await;
                        let _ = socket.flush().await;
                    }
                    Step::Sleep(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
                }
            }
            // Socket drops here: connection closed.
        }
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_chat_stream_completes_against_real_server() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = test_config(tmp.path().join("chat.sqlite"));
    let base = spawn_server(&config).await;

    let client = client_for(&base);
    let handle = client
        .submit(ChatRequest::new("what is corpus-chat?", false))
        .unwrap();
    let status = handle.wait().await;

    assert_eq!(status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_chat_stream_renders_answer_and_metadata() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = test_config(tmp.path().join("chat.sqlite"));
    let base = spawn_server(&config).await;

    let client = client_for(&base);
    let handle = client
        .submit(ChatRequest::new("hello there", false))
        .unwrap();

    // Snapshot observers keep working while the task finishes.
    while !handle.status().is_terminal() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(handle.status(), SessionStatus::Completed);
    let units = handle.display_units();
    assert!(!units.is_empty());
    let answer: String = units.iter().map(|u| u.text.as_str()).collect();
    assert!(answer.contains("You asked: \"hello there\""));
    assert!(handle
        .metadata()
        .iter()
        .any(|m| m.contains("model=canned-echo-1")));
    // Ungrounded: no context banner.
    assert_eq!(handle.context_banner(), None);
    assert_eq!(handle.error(), None);
}

#[tokio::test]
async fn test_grounded_chat_emits_context_banner() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = test_config(tmp.path().join("chat.sqlite"));
    let base = spawn_server(&config).await;

    // Seed the corpus through the REST API.
    let http = reqwest::Client::new();
    let resp = http
        .post(format!("{}/documents/add", base))
        .json(&serde_json::json!({
            "title": "deploy.md",
            "body": "Deployment uses kubernetes manifests and a staging cluster."
        }))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let client = client_for(&base);
    let handle = client
        .submit(ChatRequest::new(
            "how does deployment to the staging cluster work?",
            true,
        ))
        .unwrap();
    let status = handle.wait().await;

    assert_eq!(status, SessionStatus::Completed);
}

#[tokio::test]
async fn test_grounded_chat_banner_names_sources() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = test_config(tmp.path().join("chat.sqlite"));
    let base = spawn_server(&config).await;

    let http = reqwest::Client::new();
    http.post(format!("{}/documents/add", base))
        .json(&serde_json::json!({
            "title": "deploy.md",
            "body": "Deployment uses kubernetes manifests and a staging cluster."
        }))
        .send()
        .await
        .unwrap();

    let client = client_for(&base);
    let handle = client
        .submit(ChatRequest::new(
            "how does deployment to the staging cluster work?",
            true,
        ))
        .unwrap();
    while !handle.status().is_terminal() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let banner = handle.context_banner().expect("grounded stream has a banner");
    assert!(banner.contains("deploy.md"), "banner was: {}", banner);
}

#[tokio::test]
async fn test_server_rejects_empty_message() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = test_config(tmp.path().join("chat.sqlite"));
    let base = spawn_server(&config).await;

    let http = reqwest::Client::new();
    let resp = http
        .post(format!("{}/chat/stream", base))
        .json(&serde_json::json!({ "message": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");
}

#[tokio::test]
async fn test_non_success_status_fails_session() {
    let base = spawn_scripted_stream(
        "HTTP/1.1 500 Internal Server Error",
        vec![Step::Write("backend exploded")],
    )
    .await;

    let client = client_for(&base);
    let handle = client.submit(ChatRequest::new("hello", false)).unwrap();
    let status = handle.wait().await;

    assert_eq!(status, SessionStatus::Failed);
}

#[tokio::test]
async fn test_abrupt_close_fails_but_retains_partial_output() {
    let base = spawn_scripted_stream(
        "HTTP/1.1 200 OK",
        vec![Step::Write("data: partial answer text\n\n")],
    )
    .await;

    let client = client_for(&base);
    let handle = client.submit(ChatRequest::new("hello", false)).unwrap();
    while !handle.status().is_terminal() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(handle.status(), SessionStatus::Failed);
    let units = handle.display_units();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].text, "partial answer text");
    assert!(handle.error().is_some());
}

#[tokio::test]
async fn test_error_frame_fails_with_verbatim_message() {
    let base = spawn_scripted_stream(
        "HTTP/1.1 200 OK",
        vec![Step::Write("data: [ERROR] model unavailable\n\n")],
    )
    .await;

    let client = client_for(&base);
    let handle = client.submit(ChatRequest::new("hello", false)).unwrap();
    while !handle.status().is_terminal() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(handle.status(), SessionStatus::Failed);
    assert_eq!(handle.error().as_deref(), Some("model unavailable"));
    assert!(handle.display_units().is_empty());
}

#[tokio::test]
async fn test_frames_after_done_are_ignored() {
    let base = spawn_scripted_stream(
        "HTTP/1.1 200 OK",
        vec![Step::Write(
            "data: kept\n\ndata: [DONE]\n\ndata: dropped\n\ndata: [ERROR] too late\n\n",
        )],
    )
    .await;

    let client = client_for(&base);
    let handle = client.submit(ChatRequest::new("hello", false)).unwrap();
    while !handle.status().is_terminal() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(handle.status(), SessionStatus::Completed);
    let units = handle.display_units();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].text, "kept");
    assert_eq!(handle.error(), None);
}

#[tokio::test]
async fn test_cancel_midstream_retains_units_silently() {
    let base = spawn_scripted_stream(
        "HTTP/1.1 200 OK",
        vec![
            Step::Write("data: - first point\n\ndata: - second point\n\ndata: - th"),
            // Hold the connection open; the client must not need the
            // producer to finish in order to cancel.
            Step::Sleep(60_000),
        ],
    )
    .await;

    let client = client_for(&base);
    let handle = client.submit(ChatRequest::new("hello", false)).unwrap();

    // Wait until the first bullet has materialized.
    let mut waited = 0;
    while handle.display_units().len() < 1 && waited < 500 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        waited += 1;
    }
    assert!(!handle.display_units().is_empty(), "no units before cancel");

    handle.cancel();
    let status = handle.wait().await;

    assert_eq!(status, SessionStatus::Cancelled);
}

#[tokio::test]
async fn test_cancel_records_no_error() {
    let base = spawn_scripted_stream(
        "HTTP/1.1 200 OK",
        vec![
            Step::Write("data: streaming text here\n\n"),
            Step::Sleep(60_000),
        ],
    )
    .await;

    let client = client_for(&base);
    let handle = client.submit(ChatRequest::new("hello", false)).unwrap();
    while handle.display_units().is_empty() && !handle.status().is_terminal() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    handle.cancel();
    while !handle.status().is_terminal() {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(handle.status(), SessionStatus::Cancelled);
    assert_eq!(handle.error(), None);
    assert_eq!(handle.display_units().len(), 1);
    assert_eq!(handle.display_units()[0].text, "streaming text here");
}

#[tokio::test]
async fn test_handle_signals_updates_without_polling() {
    let base = spawn_scripted_stream(
        "HTTP/1.1 200 OK",
        vec![Step::Write("data: first line\n\ndata: [DONE]\n\n")],
    )
    .await;

    let client = client_for(&base);
    let handle = client.submit(ChatRequest::new("hello", false)).unwrap();
    let mut updates = handle.updates();

    // Wait on the update signal only; no sleep-based polling.
    while !handle.status().is_terminal() {
        tokio::time::timeout(Duration::from_secs(5), updates.changed())
            .await
            .expect("no update signal before terminal state")
            .ok();
    }

    assert_eq!(handle.status(), SessionStatus::Completed);
    let units = handle.display_units();
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].text, "first line");
}

#[tokio::test]
async fn test_documents_crud_round_trip() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = test_config(tmp.path().join("docs.sqlite"));
    let base = spawn_server(&config).await;
    let http = reqwest::Client::new();

    // Empty corpus
    let stats: serde_json::Value = http
        .get(format!("{}/documents/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["documents"], 0);

    // Add
    let added: serde_json::Value = http
        .post(format!("{}/documents/add", base))
        .json(&serde_json::json!({ "title": "alpha.md", "body": "Alpha body text." }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let id = added["id"].as_str().unwrap().to_string();
    assert_eq!(added["title"], "alpha.md");

    // List
    let list: serde_json::Value = http
        .get(format!("{}/documents", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["documents"].as_array().unwrap().len(), 1);

    // Remove
    let resp = http
        .delete(format!("{}/documents/{}", base, id))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    // Removing again is a 404 with the JSON error contract
    let resp = http
        .delete(format!("{}/documents/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    let stats: serde_json::Value = http
        .get(format!("{}/documents/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["documents"], 0);
}

#[tokio::test]
async fn test_documents_clear() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = test_config(tmp.path().join("docs.sqlite"));
    let base = spawn_server(&config).await;
    let http = reqwest::Client::new();

    for title in ["a.md", "b.md"] {
        http.post(format!("{}/documents/add", base))
            .json(&serde_json::json!({ "title": title, "body": "some body" }))
            .send()
            .await
            .unwrap();
    }

    let resp = http
        .delete(format!("{}/documents/clear", base))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());

    let stats: serde_json::Value = http
        .get(format!("{}/documents/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["documents"], 0);
    assert_eq!(stats["chunks"], 0);
}

#[tokio::test]
async fn test_corpus_stats_via_chat_client() {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = test_config(tmp.path().join("stats.sqlite"));
    let base = spawn_server(&config).await;

    let client = client_for(&base);
    let stats = client.corpus_stats().await.unwrap();
    assert_eq!(stats.documents, 0);
    assert_eq!(stats.chunks, 0);
}

#[tokio::test]
async fn test_connection_refused_fails_session() {
    // Bind-then-drop guarantees nothing listens on the port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client_for(&format!("http://{}", addr));
    let handle = client.submit(ChatRequest::new("hello", false)).unwrap();
    let status = handle.wait().await;

    assert_eq!(status, SessionStatus::Failed);
}
