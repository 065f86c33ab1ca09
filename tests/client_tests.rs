use axum::extract::State;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use quineroom::clients::openai::OpenAIClient;
use quineroom::clients::{init_client, shared_client, ClientConfig};
use quineroom::{
    init_logger, ChatMessage, ChatOptions, ClientError, ClientWrapper, ConfigError,
    ConvergenceChecker, EmbeddingClient, ModelAgent, Role, Room, SimilarityMetric,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone, Default)]
struct Captured {
    bodies: Arc<Mutex<Vec<Value>>>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
}

impl Captured {
    fn record(&self, headers: &HeaderMap, body: &Value) {
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        self.auth.lock().unwrap().push(auth);
        self.bodies.lock().unwrap().push(body.clone());
    }
}

fn model_failure(model: &Value) -> Option<Response> {
    match model.as_str() {
        Some("missing") => Some((StatusCode::NOT_FOUND, "model not found").into_response()),
        Some("broken") => Some((StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()),
        _ => None,
    }
}

async fn chat_completions(
    State(state): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&headers, &body);
    if let Some(failure) = model_failure(&body["model"]) {
        return failure;
    }
    if body["model"] == "slow" {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Json(json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [
            { "index": 0, "message": { "role": "assistant", "content": "LOL" } }
        ]
    }))
    .into_response()
}

async fn embeddings(
    State(state): State<Captured>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.record(&headers, &body);
    if let Some(failure) = model_failure(&body["model"]) {
        return failure;
    }
    Json(json!({
        "object": "list",
        "data": [ { "index": 0, "embedding": [0.5, 0.25, 1.0] } ]
    }))
    .into_response()
}

async fn spawn_server(state: Captured) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/embeddings", post(embeddings))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1/", addr)
}

fn config(api_url: String) -> ClientConfig {
    ClientConfig {
        api_url,
        api_key: "sk-test".to_string(),
        basic_auth: None,
        timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_chat_sends_model_messages_and_seed() {
    init_logger();
    let state = Captured::default();
    let client = OpenAIClient::new(config(spawn_server(state.clone()).await)).unwrap();

    let reply = client
        .chat(
            "qwen:0.5b-chat",
            &[
                ChatMessage::new(Role::System, "Reply with LOL"),
                ChatMessage::new(Role::User, "Hi"),
            ],
            &ChatOptions::default().with_seed(42).with_temperature(0.5),
        )
        .await
        .unwrap();
    assert_eq!(reply, "LOL");

    let bodies = state.bodies.lock().unwrap();
    assert_eq!(bodies[0]["model"], "qwen:0.5b-chat");
    assert_eq!(bodies[0]["seed"], 42);
    assert_eq!(bodies[0]["temperature"], 0.5);
    assert_eq!(bodies[0]["messages"][0]["role"], "system");
    assert_eq!(bodies[0]["messages"][1]["content"], "Hi");
    assert_eq!(
        state.auth.lock().unwrap()[0].as_deref(),
        Some("Bearer sk-test")
    );
}

#[tokio::test]
async fn test_basic_auth_replaces_bearer_key() {
    let state = Captured::default();
    let mut cfg = config(spawn_server(state.clone()).await);
    cfg.basic_auth = Some(("alice".to_string(), "secret".to_string()));
    let client = OpenAIClient::new(cfg).unwrap();

    client
        .chat("m", &[ChatMessage::new(Role::User, "Hi")], &ChatOptions::default())
        .await
        .unwrap();
    assert_eq!(
        state.auth.lock().unwrap()[0].as_deref(),
        Some("Basic YWxpY2U6c2VjcmV0")
    );
}

#[tokio::test]
async fn test_http_failures_are_classified() {
    let client = OpenAIClient::new(config(spawn_server(Captured::default()).await)).unwrap();
    let messages = [ChatMessage::new(Role::User, "Hi")];
    let options = ChatOptions::default();

    assert_eq!(
        client.chat("missing", &messages, &options).await,
        Err(ClientError::ModelNotFound("missing".to_string()))
    );
    assert_eq!(
        client.chat("broken", &messages, &options).await,
        Err(ClientError::Http {
            status: 500,
            body: "boom".to_string()
        })
    );
}

#[tokio::test]
async fn test_requests_are_bounded_by_timeout() {
    let cfg = config(spawn_server(Captured::default()).await)
        .with_timeout(Duration::from_millis(100));
    let client = OpenAIClient::new(cfg).unwrap();

    let result = client
        .chat("slow", &[ChatMessage::new(Role::User, "Hi")], &ChatOptions::default())
        .await;
    assert_eq!(result, Err(ClientError::Timeout));
}

#[tokio::test]
async fn test_embeddings() {
    let state = Captured::default();
    let client = OpenAIClient::new(config(spawn_server(state.clone()).await)).unwrap();

    let embedding = client.embed("nomic-embed-text", "LOL").await.unwrap();
    assert_eq!(embedding, vec![0.5, 0.25, 1.0]);
    assert_eq!(state.bodies.lock().unwrap()[0]["input"], "LOL");

    assert_eq!(
        client.embed("missing", "LOL").await,
        Err(ClientError::ModelNotFound("missing".to_string()))
    );
}

#[tokio::test]
async fn test_room_over_http_backend() {
    let state = Captured::default();
    let client = Arc::new(OpenAIClient::new(config(spawn_server(state.clone()).await)).unwrap());
    let agents = vec![
        ModelAgent::new("qwen:0.5b-chat", client.clone()),
        ModelAgent::new("tinydolphin:1.1b", client.clone())
            .with_system_prompt("Reply to any question with LOL."),
    ];
    let metric = SimilarityMetric::cosine(client.clone(), "nomic-embed-text", 0.99);
    let checker = ConvergenceChecker::new(3, 5, metric).unwrap();
    let mut room = Room::new(agents, vec!["Hi".to_string()], 10, 50, checker)
        .unwrap()
        .with_rng_seed(3);

    // Identical embeddings for every message: converged as soon as three are available.
    assert_eq!(room.run().await.unwrap(), 2);
    assert_eq!(room.chat_history().len(), 3);
    assert!(room.chat_history()[1..].iter().all(|m| m.content == "LOL"));

    let bodies = state.bodies.lock().unwrap();
    let chat_seeds: Vec<&Value> = bodies
        .iter()
        .filter(|b| b.get("messages").is_some())
        .map(|b| &b["seed"])
        .collect();
    assert_eq!(chat_seeds.len(), 2);
    assert!(chat_seeds.iter().all(|s| s.is_u64()));
}

#[tokio::test]
async fn test_shared_client_initialises_once() {
    let url = spawn_server(Captured::default()).await;
    let first = init_client(config(url.clone())).unwrap();
    assert_eq!(first.base_url(), url.trim_end_matches('/'));
    assert!(shared_client().is_some());

    assert_eq!(
        init_client(config(url)).err(),
        Some(ConfigError::ClientAlreadyInitialized)
    );
}
