use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};

use axum::extract::{Extension, Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use roadline::api::{RouteAPI, UnitAPI};
use roadline::config::ApiConfig;
use roadline::entities::{Coordinate, RouteDraft, RouteForm};
use roadline::external::ruas_api::RuasClient;
use roadline::viewer::{load_dashboard_routes, DetailFallback};

#[derive(Default)]
struct Backend {
    records: Vec<Value>,
    writes: Vec<Value>,
    authorization: Option<String>,
}

type Shared = Arc<Mutex<Backend>>;

fn record(id: i64, status: &str, coordinates: &[&str]) -> Value {
    let coordinates: Vec<Value> = coordinates
        .iter()
        .enumerate()
        .map(|(i, c)| {
            json!({
                "id": id * 10 + i as i64,
                "ruas_id": id,
                "ordering": i,
                "coordinates": c,
            })
        })
        .collect();

    json!({
        "id": id,
        "unit_id": 1,
        "ruas_name": format!("Ruas {}", id),
        "long": "10.5",
        "km_awal": "0",
        "km_akhir": "10",
        "status": status,
        "created_at": "2024-05-01T08:00:00.000000Z",
        "updated_at": "2024-05-01T08:00:00.000000Z",
        "unit": {"id": 1, "unit": "Metropolitan", "status": 1},
        "coordinates": coordinates,
    })
}

async fn list(
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Extension(state): Extension<Shared>,
) -> Json<Value> {
    let mut state = state.lock().unwrap();
    state.authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let rows: Vec<Value> = state
        .records
        .iter()
        .map(|r| {
            let mut row = r.clone();
            if let Some(object) = row.as_object_mut() {
                object.remove("coordinates");
            }
            row
        })
        .collect();

    Json(json!({
        "current_page": params.get("page").and_then(|p| p.parse::<u32>().ok()).unwrap_or(1),
        "data": rows,
        "last_page": 1,
        "per_page": params.get("per_page").and_then(|p| p.parse::<u32>().ok()).unwrap_or(10),
        "total": state.records.len(),
    }))
}

async fn detail(
    Path(id): Path<i64>,
    Extension(state): Extension<Shared>,
) -> Result<Json<Value>, StatusCode> {
    if id == 500 {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    let state = state.lock().unwrap();
    let found = state.records.iter().find(|r| r["id"] == id).cloned();

    match found {
        Some(record) => Ok(Json(json!({"status": true, "message": "ok", "data": record}))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

fn stored(id: i64, body: &Value) -> Value {
    let coordinates: Vec<Value> = body["coordinates"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, c)| {
            json!({
                "id": 100 + i as i64,
                "ruas_id": id,
                "ordering": c["ordering"],
                "coordinates": c["coordinates"],
            })
        })
        .collect();

    json!({
        "id": id,
        "unit_id": body["unit_id"],
        "ruas_name": body["ruas_name"],
        "long": body["long"],
        "km_awal": body["km_awal"],
        "km_akhir": body["km_akhir"],
        "status": body["status"],
        "coordinates": coordinates,
    })
}

async fn create(Extension(state): Extension<Shared>, Json(body): Json<Value>) -> Json<Value> {
    let mut state = state.lock().unwrap();
    let id = 40 + state.writes.len() as i64;
    state.writes.push(body.clone());

    Json(json!({"status": true, "message": "created", "data": stored(id, &body)}))
}

async fn update(
    Path(id): Path<i64>,
    Extension(state): Extension<Shared>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if body["_method"] != "PUT" {
        return Err(StatusCode::METHOD_NOT_ALLOWED);
    }

    if body["ruas_name"] == "" {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    state.lock().unwrap().writes.push(body.clone());

    Ok(Json(json!({"status": true, "message": "updated", "data": stored(id, &body)})))
}

async fn remove(Path(id): Path<i64>, Extension(state): Extension<Shared>) -> Json<Value> {
    state.lock().unwrap().records.retain(|r| r["id"] != id);

    Json(json!({"status": true, "message": "deleted"}))
}

async fn units() -> Json<Value> {
    Json(json!({
        "status": true,
        "message": "ok",
        "data": [
            {"id": 1, "unit": "Metropolitan", "status": 1},
            {"id": 2, "unit": "Purbaleunyi", "status": 0},
        ],
    }))
}

fn serve(state: Shared) -> SocketAddr {
    let app = Router::new()
        .route("/ruas", get(list).post(create))
        .route("/ruas/:id", get(detail).post(update).delete(remove))
        .route("/unit", get(units))
        .layer(Extension(state));

    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });

    addr
}

fn client(addr: SocketAddr) -> RuasClient {
    RuasClient::new(&ApiConfig {
        base_url: format!("http://{}", addr),
        token: Some("secret".into()),
        page_size: 100,
    })
}

fn form(name: &str) -> RouteForm {
    RouteForm {
        unit_id: 1,
        name: name.into(),
        length_km: 7.25,
        start_marker: "3".into(),
        end_marker: "10".into(),
        active: true,
    }
}

fn geometry() -> Vec<Coordinate> {
    vec![
        Coordinate::persisted(1, 5, "-6.1,106.7"),
        Coordinate::persisted(2, 8, "-6.2,106.8"),
    ]
}

#[tokio::test]
async fn list_and_detail_test() {
    let state = Shared::default();
    state.lock().unwrap().records = vec![
        record(1, "1", &["-6.1,106.7", "-6.2,106.8"]),
        record(2, "0", &["-6.3,106.9"]),
    ];
    let api = client(serve(state.clone()));

    let page = api.fetch_route_list(1, 100).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.total_pages, 1);
    assert!(page.items[0].active);
    assert!(!page.items[1].active);
    assert_eq!(page.items[0].length_km, 10.5);
    assert_eq!(
        state.lock().unwrap().authorization.as_deref(),
        Some("Bearer secret")
    );

    let route = api.fetch_route_detail(1).await.unwrap();
    assert_eq!(route.name, "Ruas 1");
    assert_eq!(route.coordinates.len(), 2);
    assert_eq!(route.unit.unwrap().name, "Metropolitan");

    assert_eq!(api.fetch_route_detail(99).await.unwrap_err().code, 112);
    assert_eq!(api.fetch_route_detail(500).await.unwrap_err().code, 4);
}

#[tokio::test]
async fn create_update_delete_test() {
    let state = Shared::default();
    state.lock().unwrap().records = vec![record(1, "1", &["-6.1,106.7", "-6.2,106.8"])];
    let api = client(serve(state.clone()));

    let draft = RouteDraft::new(form("Cawang - Tomang"), &geometry()).unwrap();
    let created = api.create_route(draft.clone()).await.unwrap();

    assert_eq!(created.id, 40);
    assert_eq!(created.length_km, 7.25);
    assert_eq!(created.coordinates[1].ordering, 1);
    assert_eq!(created.coordinates[1].coordinates, "-6.2,106.8");

    let updated = api.update_route(1, draft.clone()).await.unwrap();
    assert_eq!(updated.id, 1);

    let writes = state.lock().unwrap().writes.clone();
    assert!(writes[0].get("_method").is_none());
    assert_eq!(writes[1]["_method"], "PUT");
    assert_eq!(writes[1]["status"], "1");

    let mut rejected = draft;
    rejected.name = String::new();
    assert_eq!(api.update_route(1, rejected).await.unwrap_err().code, 101);

    api.delete_route(1).await.unwrap();
    assert!(state.lock().unwrap().records.is_empty());
}

#[tokio::test]
async fn units_test() {
    let api = client(serve(Shared::default()));

    let units = api.fetch_units().await.unwrap();

    assert_eq!(units.len(), 2);
    assert_eq!(units[0].name, "Metropolitan");
    assert!(units[0].active);
    assert!(!units[1].active);
}

#[tokio::test]
async fn dashboard_drops_failed_details_test() {
    let state = Shared::default();
    state.lock().unwrap().records = vec![
        record(1, "1", &["-6.1,106.7", "-6.2,106.8"]),
        record(2, "0", &["-6.3,106.9", "-6.4,107.0"]),
        record(500, "1", &["-7.0,110.0", "-7.1,110.1"]),
    ];
    let api = client(serve(state));

    let routes = load_dashboard_routes(&api, 100, DetailFallback::Exclude)
        .await
        .unwrap();

    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].id, 1);
    assert_eq!(routes[0].coordinates.len(), 2);
}
