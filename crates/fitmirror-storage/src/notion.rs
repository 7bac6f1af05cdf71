//! Notion REST client: databases are collections, pages are documents.

use anyhow::Context;
use async_trait::async_trait;
use fitmirror_core::{Condition, Filter, Icon, Properties, PropertyValue, StoredDocument};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde_json::{json, Map, Value};
use tracing::{debug, debug_span, Instrument};

use crate::{DocumentStore, HttpClientConfig, RequestPacer, StoreError};

const QUERY_PAGE_SIZE: u64 = 100;

/// Message fragments Notion uses when a select option is refused.
const SELECT_REJECTION_MARKERS: &[&str] = &["select", "option", "is not a valid"];

#[derive(Debug)]
pub struct NotionClient {
    client: reqwest::Client,
    base_url: String,
    pacer: Option<RequestPacer>,
}

impl NotionClient {
    pub fn new(token: &str, config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).context("encoding notion token header")?,
        );
        headers.insert(
            "Notion-Version",
            HeaderValue::from_str(&config.api_version).context("encoding notion version header")?,
        );

        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .timeout(config.timeout)
            .default_headers(headers);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            pacer: config.pacing.map(RequestPacer::new),
        })
    }

    async fn send_json(&self, request: reqwest::RequestBuilder, body: &Value) -> Result<Value, StoreError> {
        if let Some(pacer) = &self.pacer {
            pacer.acquire().await;
        }

        let resp = request.json(body).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(classify_rejection(status, &text));
        }
        serde_json::from_str(&text).map_err(|err| StoreError::Decode(err.to_string()))
    }
}

#[async_trait]
impl DocumentStore for NotionClient {
    async fn query(&self, collection: &str, filter: &Filter) -> Result<Vec<StoredDocument>, StoreError> {
        let url = format!("{}/databases/{collection}/query", self.base_url);
        let span = debug_span!("notion_query", database = collection);

        async {
            let mut documents = Vec::new();
            let mut cursor: Option<String> = None;
            loop {
                let mut body = json!({
                    "filter": encode_filter(filter),
                    "page_size": QUERY_PAGE_SIZE,
                });
                if let Some(cursor) = &cursor {
                    body["start_cursor"] = json!(cursor);
                }

                let page = self.send_json(self.client.post(&url), &body).await?;
                let results = page
                    .get("results")
                    .and_then(Value::as_array)
                    .ok_or_else(|| StoreError::Decode("query response has no results array".into()))?;
                for raw in results {
                    documents.push(decode_page(raw)?);
                }

                cursor = match (page.get("has_more").and_then(Value::as_bool), page.get("next_cursor")) {
                    (Some(true), Some(Value::String(next))) => Some(next.clone()),
                    _ => None,
                };
                if cursor.is_none() {
                    break;
                }
            }
            debug!(matches = documents.len(), "query complete");
            Ok::<_, StoreError>(documents)
        }
        .instrument(span)
        .await
    }

    async fn create(
        &self,
        collection: &str,
        properties: &Properties,
        icon: Option<&Icon>,
    ) -> Result<StoredDocument, StoreError> {
        let mut body = json!({
            "parent": { "database_id": collection },
            "properties": encode_properties(properties),
        });
        if let Some(icon) = icon {
            body["icon"] = encode_icon(icon);
        }
        let url = format!("{}/pages", self.base_url);
        let page = self
            .send_json(self.client.post(url), &body)
            .instrument(debug_span!("notion_create", database = collection))
            .await?;
        decode_page(&page)
    }

    async fn update(
        &self,
        document_id: &str,
        properties: &Properties,
        icon: Option<&Icon>,
    ) -> Result<StoredDocument, StoreError> {
        let mut body = json!({ "properties": encode_properties(properties) });
        if let Some(icon) = icon {
            body["icon"] = encode_icon(icon);
        }
        let url = format!("{}/pages/{document_id}", self.base_url);
        let page = self
            .send_json(self.client.patch(url), &body)
            .instrument(debug_span!("notion_update", page = document_id))
            .await?;
        decode_page(&page)
    }
}

/// Turns a non-success response into a typed error. Only a 400
/// `validation_error` that names a select option counts as a schema rejection.
pub fn classify_rejection(status: StatusCode, body: &str) -> StoreError {
    let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let code = parsed
        .get("code")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let message = parsed
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.chars().take(200).collect());

    let lowered = message.to_lowercase();
    if status == StatusCode::BAD_REQUEST
        && code == "validation_error"
        && SELECT_REJECTION_MARKERS.iter().any(|marker| lowered.contains(marker))
    {
        return StoreError::SchemaValidation { message };
    }

    StoreError::Api {
        status: status.as_u16(),
        code,
        message,
    }
}

pub fn encode_filter(filter: &Filter) -> Value {
    match filter {
        Filter::And(parts) => json!({ "and": parts.iter().map(encode_filter).collect::<Vec<_>>() }),
        Filter::Or(parts) => json!({ "or": parts.iter().map(encode_filter).collect::<Vec<_>>() }),
        Filter::Property { property, condition } => {
            let (kind, clause) = match condition {
                Condition::NumberEquals(n) => ("number", json!({ "equals": json_number(*n) })),
                Condition::NumberIsEmpty => ("number", json!({ "is_empty": true })),
                Condition::SelectEquals(v) => ("select", json!({ "equals": v })),
                Condition::TitleEquals(v) => ("title", json!({ "equals": v })),
                Condition::RichTextEquals(v) => ("rich_text", json!({ "equals": v })),
                Condition::CheckboxEquals(v) => ("checkbox", json!({ "equals": v })),
                Condition::DateEquals(v) => ("date", json!({ "equals": v })),
                Condition::DateOnOrAfter(v) => ("date", json!({ "on_or_after": v })),
                Condition::DateBefore(v) => ("date", json!({ "before": v })),
            };
            let mut object = Map::new();
            object.insert("property".into(), json!(property));
            object.insert(kind.into(), clause);
            Value::Object(object)
        }
    }
}

pub fn encode_properties(properties: &Properties) -> Value {
    let object = properties
        .iter()
        .map(|(name, value)| {
            let encoded = match value {
                PropertyValue::Title(text) => json!({ "title": [{ "text": { "content": text } }] }),
                PropertyValue::RichText(text) => {
                    json!({ "rich_text": [{ "text": { "content": text } }] })
                }
                PropertyValue::Number(n) => json!({ "number": n.map(json_number) }),
                PropertyValue::Select(Some(option)) => json!({ "select": { "name": option } }),
                PropertyValue::Select(None) => json!({ "select": null }),
                PropertyValue::Date(Some(start)) => json!({ "date": { "start": start } }),
                PropertyValue::Date(None) => json!({ "date": null }),
                PropertyValue::Checkbox(flag) => json!({ "checkbox": flag }),
            };
            (name.clone(), encoded)
        })
        .collect::<Map<_, _>>();
    Value::Object(object)
}

pub fn encode_icon(icon: &Icon) -> Value {
    match icon {
        Icon::External(url) => json!({ "type": "external", "external": { "url": url } }),
        Icon::Emoji(emoji) => json!({ "type": "emoji", "emoji": emoji }),
    }
}

/// Whole numbers go out as integers so ids and counts stay exact.
fn json_number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9.0e15 {
        json!(n as i64)
    } else {
        json!(n)
    }
}

/// Property kinds this crate never writes are dropped on read.
pub fn decode_page(raw: &Value) -> Result<StoredDocument, StoreError> {
    let id = raw
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::Decode("page without id".into()))?;

    let mut properties = Properties::new();
    if let Some(map) = raw.get("properties").and_then(Value::as_object) {
        for (name, prop) in map {
            if let Some(value) = decode_property(prop) {
                properties.insert(name.clone(), value);
            }
        }
    }
    Ok(StoredDocument::new(id, properties))
}

fn decode_property(prop: &Value) -> Option<PropertyValue> {
    let kind = prop.get("type").and_then(Value::as_str)?;
    let value = prop.get(kind);
    Some(match kind {
        "title" => PropertyValue::Title(plain_text(value)),
        "rich_text" => PropertyValue::RichText(plain_text(value)),
        "number" => PropertyValue::Number(value.and_then(Value::as_f64)),
        "select" => PropertyValue::Select(
            value
                .and_then(|v| v.get("name"))
                .and_then(Value::as_str)
                .map(str::to_string),
        ),
        "date" => PropertyValue::Date(
            value
                .and_then(|v| v.get("start"))
                .and_then(Value::as_str)
                .map(str::to_string),
        ),
        "checkbox" => PropertyValue::Checkbox(value.and_then(Value::as_bool).unwrap_or(false)),
        _ => return None,
    })
}

fn plain_text(fragments: Option<&Value>) -> String {
    fragments
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| {
                    part.get("plain_text")
                        .or_else(|| part.get("text").and_then(|t| t.get("content")))
                        .and_then(Value::as_str)
                })
                .collect::<String>()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filters_encode_to_notion_shape() {
        let filter = Filter::And(vec![
            Filter::property("Date", Condition::DateOnOrAfter("2026-01-28T00:00:00+01:00".into())),
            Filter::property("Date", Condition::DateBefore("2026-01-29T00:00:00+01:00".into())),
            Filter::property("Garmin ID", Condition::NumberEquals(21_000_000_001.0)),
        ]);
        let encoded = encode_filter(&filter);
        assert_eq!(encoded["and"][0]["date"]["on_or_after"], "2026-01-28T00:00:00+01:00");
        assert_eq!(encoded["and"][1]["date"]["before"], "2026-01-29T00:00:00+01:00");
        assert_eq!(encoded["and"][2]["property"], "Garmin ID");
        assert_eq!(encoded["and"][2]["number"]["equals"], json!(21_000_000_001_i64));

        let unlinked = encode_filter(&Filter::property("Garmin ID", Condition::NumberIsEmpty));
        assert_eq!(unlinked, json!({ "property": "Garmin ID", "number": { "is_empty": true } }));
    }

    #[test]
    fn properties_encode_including_clears() {
        let mut props = Properties::new();
        props.insert("Activity Name".into(), PropertyValue::Title("Morning Run".into()));
        props.insert("Avg Pace".into(), PropertyValue::RichText("5:00 min/km".into()));
        props.insert("Distance (km)".into(), PropertyValue::Number(Some(10.02)));
        props.insert("Avg Power".into(), PropertyValue::Number(None));
        props.insert("Activity Type".into(), PropertyValue::Select(Some("Running".into())));
        props.insert("PR".into(), PropertyValue::Checkbox(true));

        let encoded = encode_properties(&props);
        assert_eq!(encoded["Activity Name"]["title"][0]["text"]["content"], "Morning Run");
        assert_eq!(encoded["Avg Pace"]["rich_text"][0]["text"]["content"], "5:00 min/km");
        assert_eq!(encoded["Distance (km)"]["number"], json!(10.02));
        assert!(encoded["Avg Power"]["number"].is_null());
        assert_eq!(encoded["Activity Type"]["select"]["name"], "Running");
        assert_eq!(encoded["PR"]["checkbox"], true);
    }

    #[test]
    fn pages_decode_known_kinds() {
        let raw = json!({
            "id": "page-1",
            "properties": {
                "Activity Name": { "type": "title", "title": [
                    { "plain_text": "Morning " }, { "plain_text": "Run" }
                ]},
                "Distance (km)": { "type": "number", "number": 10.02 },
                "Subactivity Type": { "type": "select", "select": null },
                "Date": { "type": "date", "date": { "start": "2026-01-28T19:37:00+01:00" } },
                "Fav": { "type": "checkbox", "checkbox": true },
                "Created": { "type": "created_time", "created_time": "2026-01-28T20:00:00Z" }
            }
        });
        let doc = decode_page(&raw).unwrap();
        assert_eq!(doc.id, "page-1");
        assert_eq!(doc.text("Activity Name"), "Morning Run");
        assert_eq!(doc.number("Distance (km)"), Some(10.02));
        assert_eq!(doc.select("Subactivity Type"), "");
        assert_eq!(doc.date("Date"), Some("2026-01-28T19:37:00+01:00"));
        assert!(doc.checkbox("Fav"));
        assert!(!doc.properties.contains_key("Created"));
    }

    #[test]
    fn select_rejections_are_schema_validation() {
        let body = r#"{"object":"error","status":400,"code":"validation_error","message":"Invalid select option: Padel is not a valid option."}"#;
        assert!(classify_rejection(StatusCode::BAD_REQUEST, body).is_schema_validation());
    }

    #[test]
    fn other_failures_stay_api_errors() {
        let body = r#"{"object":"error","status":400,"code":"validation_error","message":"body failed validation: body.parent should be defined"}"#;
        match classify_rejection(StatusCode::BAD_REQUEST, body) {
            StoreError::Api { status, code, .. } => {
                assert_eq!(status, 400);
                assert_eq!(code, "validation_error");
            }
            other => panic!("unexpected {other:?}"),
        }

        let limited = classify_rejection(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(!limited.is_schema_validation());
        assert!(limited.to_string().contains("429"));
    }
}
