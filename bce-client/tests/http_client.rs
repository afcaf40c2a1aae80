//! HttpClient against a local mock of the provider's REST endpoints.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, Method, StatusCode, Uri, header::USER_AGENT};
use axum::response::{IntoResponse, Response};
use bce_client::{
    ApiError, BackendServer, BlbApi, CreateLoadBalancerArgs, EipApi, EipInstanceType, HttpClient,
    HttpClientConfig, InstanceApi, InstanceStatus, LoadBalancerStatus,
};
use serde_json::{Value, json};

#[derive(Debug, Clone)]
struct Recorded {
    method: String,
    path: String,
    query: String,
    body: String,
    user_agent: String,
}

type Shared = Arc<Mutex<Vec<Recorded>>>;

async fn mock(
    State(recorded): State<Shared>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: String,
) -> Response {
    let path = uri.path().to_string();
    recorded.lock().unwrap().push(Recorded {
        method: method.to_string(),
        path: path.clone(),
        query: uri.query().unwrap_or_default().to_string(),
        body,
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    });

    match (method.as_str(), path.as_str()) {
        ("GET", "/internal-api/v1/blb") => Json(json!({
            "blbList": [
                {"blbId": "lb-1", "name": "default-web", "address": "10.0.0.1", "status": "available", "publicIp": "180.76.0.9"}
            ],
            "isTruncated": false
        }))
        .into_response(),
        ("POST", "/internal-api/v1/blb") => Json(json!({
            "blbId": "lb-2", "name": "default-web", "address": "10.0.0.2"
        }))
        .into_response(),
        ("GET", "/internal-api/v1/blb/lb-1/backendserver") => Json(json!({
            "backendServerList": [
                {"instanceId": "i-1", "weight": 100},
                {"instanceId": "i-2", "weight": 50}
            ]
        }))
        .into_response(),
        ("GET", "/internal-api/v1/blb/lb-2/backendserver") => Json(json!({})).into_response(),
        ("DELETE", p) if p.starts_with("/internal-api/v1/eip/") => (
            StatusCode::NOT_FOUND,
            Json(json!({"code": "NoSuchObject", "message": "eip missing", "requestId": "r-9"})),
        )
            .into_response(),
        ("GET", "/internal-api/v1/cluster/c-1/instances") => Json(json!({
            "instances": [
                {"id": "i-1", "name": "node-1", "status": "Running", "internalIp": "10.0.0.11", "zoneName": "cn-bj-a", "vpcId": "vpc-1"}
            ]
        }))
        .into_response(),
        _ => StatusCode::OK.into_response(),
    }
}

async fn spawn_mock() -> (HttpClient, Shared) {
    let recorded: Shared = Arc::new(Mutex::new(vec![]));
    let app = Router::new().fallback(mock).with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let client = HttpClient::new(HttpClientConfig {
        endpoint: format!("{}/internal-api", addr),
        user_agent: "cce-k8s:c-1".to_string(),
        timeout: Duration::from_secs(5),
    })
    .unwrap();
    (client, recorded)
}

fn last(recorded: &Shared) -> Recorded {
    recorded.lock().unwrap().last().cloned().unwrap()
}

#[tokio::test]
async fn test_describe_load_balancers_by_name() {
    let (client, recorded) = spawn_mock().await;

    let lbs = client.describe_load_balancers("default-web").await.unwrap();
    assert_eq!(lbs.len(), 1);
    assert_eq!(lbs[0].status, LoadBalancerStatus::Available);
    assert_eq!(lbs[0].public_ip(), Some("180.76.0.9"));

    let req = last(&recorded);
    assert_eq!(req.method, "GET");
    assert_eq!(req.query, "name=default-web");
    assert_eq!(req.user_agent, "cce-k8s:c-1");
}

#[tokio::test]
async fn test_describe_backend_servers() {
    let (client, recorded) = spawn_mock().await;

    let servers = client.describe_backend_servers("lb-1").await.unwrap();
    assert_eq!(
        servers,
        vec![
            BackendServer {
                instance_id: "i-1".to_string(),
                weight: 100,
            },
            BackendServer {
                instance_id: "i-2".to_string(),
                weight: 50,
            },
        ]
    );
    assert_eq!(last(&recorded).path, "/internal-api/v1/blb/lb-1/backendserver");

    // A balancer without backends omits the list entirely.
    let empty = client.describe_backend_servers("lb-2").await.unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_create_load_balancer_sends_client_token() {
    let (client, recorded) = spawn_mock().await;

    let created = client
        .create_load_balancer(&CreateLoadBalancerArgs {
            name: "default-web".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(created.blb_id, "lb-2");

    let req = last(&recorded);
    assert!(req.query.starts_with("clientToken="));
    assert!(req.query.len() > "clientToken=".len());
    let body: Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body, json!({"name": "default-web"}));
}

#[tokio::test]
async fn test_bind_eip_request_shape() {
    let (client, recorded) = spawn_mock().await;

    client
        .bind_eip("180.76.0.1", EipInstanceType::Blb, "lb-1")
        .await
        .unwrap();

    let req = last(&recorded);
    assert_eq!(req.method, "PUT");
    assert_eq!(req.path, "/internal-api/v1/eip/180.76.0.1");
    assert!(req.query.contains("bind="));
    let body: Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body, json!({"instanceType": "BLB", "instanceId": "lb-1"}));
}

#[tokio::test]
async fn test_batch_delete_listeners() {
    let (client, recorded) = spawn_mock().await;

    client.delete_listeners("lb-1", &[443, 8443]).await.unwrap();

    let req = last(&recorded);
    assert_eq!(req.method, "PUT");
    assert_eq!(req.path, "/internal-api/v1/blb/lb-1/listener");
    assert!(req.query.contains("batchdelete"));
    let body: Value = serde_json::from_str(&req.body).unwrap();
    assert_eq!(body, json!({"portList": [443, 8443]}));
}

#[tokio::test]
async fn test_error_body_becomes_status_error() {
    let (client, _) = spawn_mock().await;

    let err = client.delete_eip("180.76.0.1").await.unwrap_err();
    match err {
        ApiError::Status {
            status,
            code,
            request_id,
            ..
        } => {
            assert_eq!(status, 404);
            assert_eq!(code, "NoSuchObject");
            assert_eq!(request_id, "r-9");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_list_instances() {
    let (client, _) = spawn_mock().await;

    let instances = client.list_instances("c-1").await.unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].instance_id, "i-1");
    assert_eq!(instances[0].status, InstanceStatus::Running);
    assert_eq!(instances[0].internal_ip, "10.0.0.11");
}

#[tokio::test]
async fn test_rejects_empty_arguments_before_sending() {
    let (client, recorded) = spawn_mock().await;

    let err = client.unbind_eip("").await.unwrap_err();
    assert!(matches!(err, ApiError::InvalidArgument(_)));
    assert!(recorded.lock().unwrap().is_empty());
}
