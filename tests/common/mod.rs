#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

pub const ROOM: &str = "Room 3B";
pub const ROOM_CALENDAR_ID: &str = "room-3b-calendar";
pub const EVENTS_PATH: &str = "/calendars/room-3b-calendar/events";

const FIXTURE: &str = include_str!("../fixtures/service_account.json");

/// Writes the fixture key to `dir`, pointing its token endpoint at `server`.
pub fn write_credentials(dir: &Path, server: &MockServer) -> PathBuf {
    let mut key: Value = serde_json::from_str(FIXTURE).unwrap();
    key["token_uri"] = json!(format!("{}/token", server.uri()));

    let path = dir.join("service_account.json");
    std::fs::write(&path, serde_json::to_vec_pretty(&key).unwrap()).unwrap();
    path
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.integration",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .mount(server)
        .await;
}

pub async fn mount_calendar_list(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/users/me/calendarList"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "rooms@example.com", "summary": "rooms@example.com"},
                {"id": ROOM_CALENDAR_ID, "summary": ROOM},
                {"id": "room-4a-calendar", "summary": "Room 4A"}
            ]
        })))
        .mount(server)
        .await;
}

pub fn events_body(items: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "items": items }))
}

pub fn slow(template: ResponseTemplate) -> ResponseTemplate {
    template.set_delay(Duration::from_secs(10))
}

pub async fn request_count(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == request_path)
        .count()
}

/// Stores inserted events and serves them back from the list endpoint.
#[derive(Clone, Default)]
pub struct EventStore {
    events: Arc<Mutex<Vec<Value>>>,
}

impl EventStore {
    pub async fn mount(&self, server: &MockServer) {
        Mock::given(method("POST"))
            .and(path(EVENTS_PATH))
            .respond_with(InsertResponder(self.clone()))
            .mount(server)
            .await;

        Mock::given(method("GET"))
            .and(path(EVENTS_PATH))
            .respond_with(ListResponder(self.clone()))
            .mount(server)
            .await;
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

struct InsertResponder(EventStore);

impl Respond for InsertResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut body: Value = match serde_json::from_slice(&request.body) {
            Ok(body) => body,
            Err(_) => return ResponseTemplate::new(400),
        };

        let mut events = self.0.events.lock().unwrap();
        body["id"] = json!(format!("evt-{}", events.len() + 1));
        events.push(body.clone());

        ResponseTemplate::new(200).set_body_json(body)
    }
}

struct ListResponder(EventStore);

impl Respond for ListResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let events = self.0.events.lock().unwrap();
        events_body(Value::Array(events.clone()))
    }
}

/// Pulls the signed assertion out of a token request body.
pub fn assertion_from(request: &Request) -> String {
    let body = String::from_utf8(request.body.clone()).unwrap();
    body.split('&')
        .find_map(|pair| pair.strip_prefix("assertion="))
        .unwrap()
        .to_string()
}
