use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::api::{RouteAPI, UnitAPI, API};
use crate::config::ApiConfig;
use crate::entities::{Coordinate, Route, RouteDraft, RoutePage, RouteSummary, Unit};
use crate::error::{invalid_input_error, not_found_error, upstream_error, Error};

#[derive(Clone, Debug)]
pub struct RuasClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Paginated<T> {
    current_page: u32,
    data: Vec<T>,
    last_page: u32,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    status: bool,
    #[serde(default)]
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct RuasRecord {
    id: i64,
    unit_id: i64,
    ruas_name: String,
    #[serde(deserialize_with = "number_or_string")]
    long: f64,
    #[serde(deserialize_with = "text")]
    km_awal: String,
    #[serde(deserialize_with = "text")]
    km_akhir: String,
    #[serde(deserialize_with = "flag")]
    status: bool,
    #[serde(default)]
    unit: Option<UnitRecord>,
    #[serde(default)]
    coordinates: Option<Vec<CoordinateRecord>>,
    #[serde(default, deserialize_with = "timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp")]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CoordinateRecord {
    id: i64,
    ordering: i64,
    coordinates: String,
}

#[derive(Debug, Deserialize)]
struct UnitRecord {
    id: i64,
    unit: String,
    #[serde(deserialize_with = "flag")]
    status: bool,
}

#[derive(Debug, Serialize)]
struct RuasPayload<'a> {
    unit_id: i64,
    ruas_name: &'a str,
    long: String,
    km_awal: &'a str,
    km_akhir: &'a str,
    status: &'static str,
    coordinates: &'a [crate::entities::CoordinatePayload],
    #[serde(rename = "_method", skip_serializing_if = "Option::is_none")]
    method: Option<&'static str>,
}

impl<'a> RuasPayload<'a> {
    fn new(draft: &'a RouteDraft, method: Option<&'static str>) -> Self {
        Self {
            unit_id: draft.unit_id,
            ruas_name: &draft.name,
            long: draft.length_km.to_string(),
            km_awal: &draft.start_marker,
            km_akhir: &draft.end_marker,
            status: if draft.active { "1" } else { "0" },
            coordinates: &draft.coordinates,
            method,
        }
    }
}

impl From<UnitRecord> for Unit {
    fn from(record: UnitRecord) -> Self {
        Self {
            id: record.id,
            name: record.unit,
            active: record.status,
        }
    }
}

impl From<CoordinateRecord> for Coordinate {
    fn from(record: CoordinateRecord) -> Self {
        Coordinate::persisted(record.id, record.ordering, record.coordinates)
    }
}

impl From<RuasRecord> for Route {
    fn from(record: RuasRecord) -> Self {
        Self {
            id: record.id,
            name: record.ruas_name,
            unit_id: record.unit_id,
            unit: record.unit.map(Unit::from),
            length_km: record.long,
            start_marker: record.km_awal,
            end_marker: record.km_akhir,
            active: record.status,
            coordinates: record
                .coordinates
                .unwrap_or_default()
                .into_iter()
                .map(Coordinate::from)
                .collect(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<RuasRecord> for RouteSummary {
    fn from(record: RuasRecord) -> Self {
        Self {
            id: record.id,
            name: record.ruas_name,
            unit_id: record.unit_id,
            length_km: record.long,
            start_marker: record.km_awal,
            end_marker: record.km_akhir,
            active: record.status,
        }
    }
}

impl<T> Envelope<T> {
    fn into_data(self) -> Result<T, Error> {
        if !self.status {
            tracing::warn!("backend reported failure: {}", self.message);
            return Err(upstream_error());
        }

        self.data.ok_or_else(upstream_error)
    }
}

impl RuasClient {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            token: config.token.clone(),
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");

        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response, Error> {
        let res = builder.send().await?;
        let status_code = res.status().as_u16();

        if status_code == 404 {
            return Err(not_found_error());
        } else if (400..500).contains(&status_code) {
            return Err(invalid_input_error());
        } else if !(200..300).contains(&status_code) {
            tracing::warn!(status_code, "backend request failed");
            return Err(upstream_error());
        }

        Ok(res)
    }

    async fn write_route(
        &self,
        path: &str,
        draft: &RouteDraft,
        method: Option<&'static str>,
    ) -> Result<Route, Error> {
        let payload = RuasPayload::new(draft, method);
        let res = self
            .send(self.request(reqwest::Method::POST, path).json(&payload))
            .await?;

        let data: Envelope<RuasRecord> = res.json().await?;

        Ok(data.into_data()?.into())
    }
}

#[async_trait]
impl RouteAPI for RuasClient {
    #[tracing::instrument(skip(self))]
    async fn fetch_route_list(&self, page: u32, page_size: u32) -> Result<RoutePage, Error> {
        let builder = self
            .request(reqwest::Method::GET, "/ruas")
            .query(&[("page", page), ("per_page", page_size)]);

        let data: Paginated<RuasRecord> = self.send(builder).await?.json().await?;

        tracing::debug!(page = data.current_page, rows = data.data.len(), "route list fetched");

        Ok(RoutePage {
            items: data.data.into_iter().map(RouteSummary::from).collect(),
            total_pages: data.last_page,
            total: data.total,
        })
    }

    #[tracing::instrument(skip(self))]
    async fn fetch_route_detail(&self, id: i64) -> Result<Route, Error> {
        let path = format!("/ruas/{}", id);
        let data: Envelope<RuasRecord> = self
            .send(self.request(reqwest::Method::GET, &path))
            .await?
            .json()
            .await?;

        Ok(data.into_data()?.into())
    }

    #[tracing::instrument(skip_all)]
    async fn create_route(&self, draft: RouteDraft) -> Result<Route, Error> {
        self.write_route("/ruas", &draft, None).await
    }

    #[tracing::instrument(skip(self, draft))]
    async fn update_route(&self, id: i64, draft: RouteDraft) -> Result<Route, Error> {
        let path = format!("/ruas/{}", id);
        self.write_route(&path, &draft, Some("PUT")).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_route(&self, id: i64) -> Result<(), Error> {
        let path = format!("/ruas/{}", id);
        self.send(self.request(reqwest::Method::DELETE, &path))
            .await?;

        Ok(())
    }
}

#[async_trait]
impl UnitAPI for RuasClient {
    #[tracing::instrument(skip(self))]
    async fn fetch_units(&self) -> Result<Vec<Unit>, Error> {
        let data: Envelope<Vec<UnitRecord>> = self
            .send(self.request(reqwest::Method::GET, "/unit"))
            .await?
            .json()
            .await?;

        Ok(data.into_data()?.into_iter().map(Unit::from).collect())
    }
}

impl API for RuasClient {}

fn number_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    use serde::de::Error as _;

    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| D::Error::custom("number out of range")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("not a number: {}", s))),
        other => Err(D::Error::custom(format!("expected number, got {}", other))),
    }
}

fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        other => Ok(other.to_string()),
    }
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    use serde::de::Error as _;

    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Number(n) => Ok(n.as_i64() == Some(1)),
        Value::String(s) => Ok(s == "1" || s.eq_ignore_ascii_case("true")),
        other => Err(D::Error::custom(format!("expected status flag, got {}", other))),
    }
}

fn timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match Option::<String>::deserialize(deserializer)? {
        Some(raw) => raw,
        None => return Ok(None),
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }

    match NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S") {
        Ok(naive) => Ok(Some(Utc.from_utc_datetime(&naive))),
        Err(_) => {
            tracing::debug!(raw = %raw, "ignoring unparseable timestamp");
            Ok(None)
        }
    }
}

#[cfg(test)]
const DETAIL_BODY: &str = r#"{
    "status": true,
    "message": "ok",
    "data": {
        "id": 7,
        "unit_id": 2,
        "ruas_name": "Cawang - Tomang",
        "long": "12.50",
        "km_awal": "0",
        "km_akhir": "12",
        "photo_url": null,
        "doc_url": null,
        "status": "1",
        "created_at": "2024-05-01T08:00:00.000000Z",
        "updated_at": "2024-05-02 09:30:00",
        "unit": {"id": 2, "unit": "Metropolitan", "status": 1},
        "coordinates": [
            {"id": 31, "ruas_id": 7, "ordering": 1, "coordinates": "-6.2,106.8"},
            {"id": 30, "ruas_id": 7, "ordering": 0, "coordinates": "-6.1,106.7"}
        ]
    }
}"#;

#[test]
fn detail_record_maps_to_route_test() {
    let envelope: Envelope<RuasRecord> = serde_json::from_str(DETAIL_BODY).unwrap();
    let route: Route = envelope.into_data().unwrap().into();

    assert_eq!(route.name, "Cawang - Tomang");
    assert_eq!(route.length_km, 12.5);
    assert!(route.active);
    assert_eq!(route.unit_name(), "Metropolitan");
    assert_eq!(route.coordinates.len(), 2);
    assert_eq!(route.sorted_coordinates()[0].coordinates, "-6.1,106.7");
    assert!(route.created_at.is_some());
    assert!(route.updated_at.is_some());
}

#[test]
fn failed_envelope_is_upstream_error_test() {
    let envelope: Envelope<RuasRecord> =
        serde_json::from_str(r#"{"status": false, "message": "nope", "data": null}"#).unwrap();

    assert_eq!(envelope.into_data().unwrap_err().code, 4);
}

#[test]
fn length_accepts_numbers_and_strings_test() {
    let body = r#"{"id": 1, "unit_id": 1, "ruas_name": "A", "long": 3, "km_awal": 0,
        "km_akhir": "3", "status": "0"}"#;
    let record: RuasRecord = serde_json::from_str(body).unwrap();
    let summary = RouteSummary::from(record);

    assert_eq!(summary.length_km, 3.0);
    assert_eq!(summary.start_marker, "0");
    assert!(!summary.active);

    let bad = r#"{"id": 1, "unit_id": 1, "ruas_name": "A", "long": "far", "km_awal": "0",
        "km_akhir": "3", "status": "1"}"#;
    assert!(serde_json::from_str::<RuasRecord>(bad).is_err());
}

#[test]
fn update_payload_spoofs_put_test() {
    use crate::entities::sample_form;

    let snapshot = vec![
        Coordinate::persisted(1, 4, "-6.1,106.7"),
        Coordinate::persisted(2, 9, "-6.2,106.8"),
    ];
    let draft = RouteDraft::new(sample_form(), &snapshot).unwrap();

    let update = serde_json::to_value(RuasPayload::new(&draft, Some("PUT"))).unwrap();
    assert_eq!(update["_method"], "PUT");
    assert_eq!(update["status"], "1");
    assert_eq!(update["long"], "34");
    assert_eq!(update["coordinates"][1]["ordering"], 1);
    assert_eq!(update["coordinates"][1]["coordinates"], "-6.2,106.8");

    let create = serde_json::to_value(RuasPayload::new(&draft, None)).unwrap();
    assert!(create.get("_method").is_none());
}
