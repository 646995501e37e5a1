use std::{collections::HashMap, fmt, fs::File, net::SocketAddr};

use anyhow::Context;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use chrono::{Duration, NaiveDate, NaiveTime, Utc};
use cucumber::{given, then, when, World as _};
use planner::{
    config::{AppConfig, MailConfig},
    db::init_pool,
    models::{activity::Activity, participant::Participant},
    routes::create_router,
    services::mailer::Mailer,
    state::AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

const OWNER_NAME: &str = "Owner Example";
const OWNER_EMAIL: &str = "owner@example.com";

#[derive(Debug, cucumber::World, Default)]
struct AppWorld {
    state: Option<TestState>,
    last_response: Option<ApiResponse>,
    trip_id: Option<String>,
    second_trip_id: Option<String>,
    trip_start: Option<NaiveDate>,
    owner_id: Option<String>,
    activities: HashMap<String, String>,
    links: HashMap<String, String>,
}

impl AppWorld {
    fn app_state(&self) -> &AppState {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .app()
    }

    fn router(&self) -> Router {
        self.state
            .as_ref()
            .expect("state must be initialised first")
            .router()
    }

    fn trip_id(&self) -> &str {
        self.trip_id.as_deref().expect("trip must exist")
    }

    fn response(&self) -> &ApiResponse {
        self.last_response
            .as_ref()
            .expect("a request must have been sent")
    }

    async fn send(&mut self, method: &str, uri: &str, body: Option<Value>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(value) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(value.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        let response = self
            .router()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("response body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        self.last_response = Some(ApiResponse {
            status,
            location,
            body,
        });
    }

    async fn participant_id(&self, email: &str) -> String {
        let state = self.app_state();
        Participant::find_by_email(&state.db, self.trip_id(), email)
            .await
            .expect("participant query")
            .expect("participant must exist")
            .id
    }
}

#[derive(Debug, Clone)]
struct ApiResponse {
    status: StatusCode,
    location: Option<String>,
    body: Value,
}

struct TestState {
    app: AppState,
    router: Router,
    _root: TempDir,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState").finish()
    }
}

impl TestState {
    async fn new() -> anyhow::Result<Self> {
        let root = TempDir::new().context("create temp dir for bdd world")?;
        let db_path = root.path().join("bdd.sqlite");
        File::create(&db_path)?;
        let database_url = format!("sqlite://{}", db_path.to_string_lossy());

        let config = AppConfig {
            database_url: database_url.clone(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            api_base_url: "http://localhost:3333".into(),
            web_base_url: "http://localhost:3000".into(),
            mail: MailConfig {
                smtp_host: "localhost".into(),
                smtp_port: 2525,
                smtp_username: "bdd".into(),
                smtp_password: "bdd".into(),
                sender: "Trip Planner <team@planner.dev>".into(),
            },
        };

        let db = init_pool(&config.database_url).await?;
        sqlx::migrate!("./migrations").run(&db).await?;

        let mailer = Mailer::noop(&config);
        let app = AppState::new(config, db, mailer);
        let router = create_router(app.clone());
        Ok(Self {
            app,
            router,
            _root: root,
        })
    }

    fn app(&self) -> &AppState {
        &self.app
    }

    fn router(&self) -> Router {
        self.router.clone()
    }
}

fn trip_dates(start_offset: i64, lasting: i64) -> (NaiveDate, Value, Value) {
    let start_date = Utc::now().date_naive() + Duration::days(start_offset);
    let end_date = start_date + Duration::days(lasting);
    let starts_at = start_date.and_time(NaiveTime::MIN).and_utc();
    let ends_at = end_date.and_time(NaiveTime::MIN).and_utc();
    (
        start_date,
        json!(starts_at.to_rfc3339()),
        json!(ends_at.to_rfc3339()),
    )
}

async fn create_trip(
    world: &mut AppWorld,
    destination: String,
    start_offset: i64,
    lasting: i64,
    invitees: String,
) {
    let emails: Vec<String> = invitees
        .split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_string)
        .collect();
    let (start_date, starts_at, ends_at) = trip_dates(start_offset, lasting);
    let body = json!({
        "destination": destination,
        "starts_at": starts_at,
        "ends_at": ends_at,
        "owner_name": OWNER_NAME,
        "owner_email": OWNER_EMAIL,
        "emails_to_invite": emails,
    });
    world.send("POST", "/trips", Some(body)).await;

    if world.response().status == StatusCode::OK {
        let body = world.response().body.clone();
        world.trip_id = body["tripId"].as_str().map(str::to_string);
        world.owner_id = body["participantId"].as_str().map(str::to_string);
        world.trip_start = Some(start_date);
    }
}

#[given("a fresh application")]
async fn given_fresh_application(world: &mut AppWorld) {
    world.state = Some(TestState::new().await.expect("state"));
    world.last_response = None;
    world.trip_id = None;
    world.second_trip_id = None;
    world.trip_start = None;
    world.owner_id = None;
    world.activities.clear();
    world.links.clear();
}

#[given(
    regex = r#"^a trip to "([^"]+)" starting in (-?\d+) days? lasting (-?\d+) days? with invitees "([^"]*)"$"#
)]
async fn given_trip(
    world: &mut AppWorld,
    destination: String,
    start_offset: i64,
    lasting: i64,
    invitees: String,
) {
    create_trip(world, destination, start_offset, lasting, invitees).await;
    assert_eq!(world.response().status, StatusCode::OK, "trip setup failed");
}

#[when(
    regex = r#"^I create a trip to "([^"]+)" starting in (-?\d+) days? lasting (-?\d+) days? with invitees "([^"]*)"$"#
)]
async fn when_create_trip(
    world: &mut AppWorld,
    destination: String,
    start_offset: i64,
    lasting: i64,
    invitees: String,
) {
    create_trip(world, destination, start_offset, lasting, invitees).await;
}

#[given(regex = r#"^a second trip to "([^"]+)" starting in (\d+) days? lasting (\d+) days?$"#)]
async fn given_second_trip(
    world: &mut AppWorld,
    destination: String,
    start_offset: i64,
    lasting: i64,
) {
    let first_trip = world.trip_id.clone();
    let first_start = world.trip_start;
    let first_owner = world.owner_id.clone();
    create_trip(world, destination, start_offset, lasting, String::new()).await;
    assert_eq!(world.response().status, StatusCode::OK, "trip setup failed");
    world.second_trip_id = world.trip_id.clone();
    world.trip_id = first_trip;
    world.trip_start = first_start;
    world.owner_id = first_owner;
}

#[when(regex = r#"^"([^"]+)" updates the trip destination to "([^"]+)"$"#)]
async fn when_participant_updates_trip(world: &mut AppWorld, email: String, destination: String) {
    let participant_id = world.participant_id(&email).await;
    update_trip(world, &participant_id, &destination).await;
}

#[when(regex = r#"^the owner updates the trip destination to "([^"]+)"$"#)]
async fn when_owner_updates_trip(world: &mut AppWorld, destination: String) {
    let owner_id = world.owner_id.clone().expect("owner must exist");
    update_trip(world, &owner_id, &destination).await;
}

async fn update_trip(world: &mut AppWorld, participant_id: &str, destination: &str) {
    let (_, starts_at, ends_at) = trip_dates(10, 2);
    let uri = format!(
        "/trips/{}?participantId={}",
        world.trip_id(),
        participant_id
    );
    let body = json!({
        "destination": destination,
        "starts_at": starts_at,
        "ends_at": ends_at,
    });
    world.send("PATCH", &uri, Some(body)).await;
}

#[when(regex = r#"^"([^"]+)" deletes the trip$"#)]
async fn when_participant_deletes_trip(world: &mut AppWorld, email: String) {
    let participant_id = world.participant_id(&email).await;
    let uri = format!(
        "/trips/{}?participantId={}",
        world.trip_id(),
        participant_id
    );
    world.send("DELETE", &uri, None).await;
}

#[when("the owner deletes the trip")]
async fn when_owner_deletes_trip(world: &mut AppWorld) {
    let owner_id = world.owner_id.clone().expect("owner must exist");
    let uri = format!("/trips/{}?participantId={}", world.trip_id(), owner_id);
    world.send("DELETE", &uri, None).await;
}

#[when(regex = r#"^"([^"]+)" confirms via the one-click link$"#)]
async fn when_one_click_confirm(world: &mut AppWorld, email: String) {
    let participant_id = world.participant_id(&email).await;
    let uri = format!("/participants/{participant_id}/confirm");
    world.send("GET", &uri, None).await;
}

#[when("an unknown participant confirms via the one-click link")]
async fn when_unknown_one_click_confirm(world: &mut AppWorld) {
    let uri = format!("/participants/{}/confirm", Uuid::new_v4());
    world.send("GET", &uri, None).await;
}

#[when(regex = r#"^"([^"]+)" confirms manually as "([^"]+)" using email "([^"]+)"$"#)]
async fn when_manual_confirm(
    world: &mut AppWorld,
    participant_email: String,
    name: String,
    supplied_email: String,
) {
    let participant_id = world.participant_id(&participant_email).await;
    let uri = format!("/participants/{participant_id}/confirm");
    let body = json!({ "name": name, "email": supplied_email });
    world.send("PATCH", &uri, Some(body)).await;
}

#[when(regex = r#"^the participant "([^"]+)" is deleted$"#)]
async fn when_delete_participant(world: &mut AppWorld, email: String) {
    let participant_id = world.participant_id(&email).await;
    let uri = format!("/participants/{participant_id}");
    world.send("DELETE", &uri, None).await;
}

#[when(regex = r#"^I fetch the participant "([^"]+)"$"#)]
async fn when_fetch_participant(world: &mut AppWorld, email: String) {
    let participant_id = world.participant_id(&email).await;
    let uri = format!("/participants/{participant_id}");
    world.send("GET", &uri, None).await;
}

#[when(regex = r#"^a participant "([^"]+)" with email "([^"]+)" is added to the trip$"#)]
async fn when_add_participant(world: &mut AppWorld, name: String, email: String) {
    let uri = format!("/trips/{}/participants", world.trip_id());
    let body = json!({ "name": name, "email": email });
    world.send("PATCH", &uri, Some(body)).await;
}

#[when(regex = r#"^"([^"]+)" is invited to the trip$"#)]
async fn when_create_invite(world: &mut AppWorld, email: String) {
    let uri = format!("/trips/{}/invites", world.trip_id());
    let body = json!({ "email": email });
    world.send("POST", &uri, Some(body)).await;
}

#[when(regex = r#"^I add an activity "([^"]+)" on trip day (\d+) at (\d+):(\d+)$"#)]
async fn when_add_activity(
    world: &mut AppWorld,
    title: String,
    day: i64,
    hour: u32,
    minute: u32,
) {
    let start = world.trip_start.expect("trip must exist");
    let occurs_at = (start + Duration::days(day))
        .and_time(NaiveTime::from_hms_opt(hour, minute, 0).expect("valid time"))
        .and_utc();
    let uri = format!("/trips/{}/activities", world.trip_id());
    let body = json!({ "title": title, "occurs_at": occurs_at.to_rfc3339() });
    world.send("POST", &uri, Some(body)).await;

    if world.response().status == StatusCode::OK {
        let id = world.response().body["activityId"].as_str().map(str::to_string);
        if let Some(id) = id {
            world.activities.insert(title, id);
        }
    }
}

#[when("I list the activities")]
async fn when_list_activities(world: &mut AppWorld) {
    let uri = format!("/trips/{}/activities", world.trip_id());
    world.send("GET", &uri, None).await;
}

#[when(regex = r#"^I delete the activity "([^"]+)"$"#)]
async fn when_delete_activity(world: &mut AppWorld, title: String) {
    let activity_id = world.activities.get(&title).expect("activity id").clone();
    let uri = format!("/trips/{}/activities", world.trip_id());
    world
        .send("DELETE", &uri, Some(json!({ "activityId": activity_id })))
        .await;
}

#[when(regex = r#"^I delete the activity "([^"]+)" through the second trip$"#)]
async fn when_delete_activity_cross_trip(world: &mut AppWorld, title: String) {
    let activity_id = world.activities.get(&title).expect("activity id").clone();
    let second_trip = world.second_trip_id.clone().expect("second trip");
    let uri = format!("/trips/{second_trip}/activities");
    world
        .send("DELETE", &uri, Some(json!({ "activityId": activity_id })))
        .await;
}

#[when(regex = r#"^I add a link "([^"]+)" pointing to "([^"]+)"$"#)]
async fn when_add_link(world: &mut AppWorld, title: String, url: String) {
    let uri = format!("/trips/{}/links", world.trip_id());
    let body = json!({ "title": title, "url": url });
    world.send("POST", &uri, Some(body)).await;

    if world.response().status == StatusCode::OK {
        let id = world.response().body["linkId"].as_str().map(str::to_string);
        if let Some(id) = id {
            world.links.insert(title, id);
        }
    }
}

#[when("I list the links")]
async fn when_list_links(world: &mut AppWorld) {
    let uri = format!("/trips/{}/links", world.trip_id());
    world.send("GET", &uri, None).await;
}

#[when(regex = r#"^I delete the link "([^"]+)"$"#)]
async fn when_delete_link(world: &mut AppWorld, title: String) {
    let link_id = world.links.get(&title).expect("link id").clone();
    let uri = format!("/trips/{}/links", world.trip_id());
    world
        .send("DELETE", &uri, Some(json!({ "linkId": link_id })))
        .await;
}

#[when(regex = r#"^I delete the link "([^"]+)" through the second trip$"#)]
async fn when_delete_link_cross_trip(world: &mut AppWorld, title: String) {
    let link_id = world.links.get(&title).expect("link id").clone();
    let second_trip = world.second_trip_id.clone().expect("second trip");
    let uri = format!("/trips/{second_trip}/links");
    world
        .send("DELETE", &uri, Some(json!({ "linkId": link_id })))
        .await;
}

#[then(regex = r"^the response status is (\d+)$")]
async fn then_response_status(world: &mut AppWorld, expected: u16) {
    assert_eq!(
        world.response().status.as_u16(),
        expected,
        "unexpected status, body: {}",
        world.response().body
    );
}

#[then(regex = r#"^the response error is "([^"]+)"$"#)]
async fn then_response_error(world: &mut AppWorld, expected: String) {
    assert_eq!(world.response().body["error"].as_str(), Some(expected.as_str()));
}

#[then("the response contains a trip id and a participant id")]
async fn then_response_has_ids(world: &mut AppWorld) {
    let body = &world.response().body;
    assert!(body["tripId"].as_str().is_some(), "missing tripId: {body}");
    assert!(
        body["participantId"].as_str().is_some(),
        "missing participantId: {body}"
    );
}

#[then("the response ok flag is set")]
async fn then_response_ok(world: &mut AppWorld) {
    assert_eq!(world.response().body["ok"].as_bool(), Some(true));
}

#[then(regex = r#"^the response "tripId" matches the trip$"#)]
async fn then_response_trip_id_matches(world: &mut AppWorld) {
    let expected = world.trip_id().to_string();
    assert_eq!(
        world.response().body["tripId"].as_str(),
        Some(expected.as_str())
    );
}

#[then(regex = r"^the trip has (\d+) participants$")]
async fn then_trip_participant_count(world: &mut AppWorld, expected: usize) {
    let state = world.app_state();
    let participants = Participant::list_for_trip(&state.db, world.trip_id())
        .await
        .expect("participant query");
    assert_eq!(participants.len(), expected);
}

#[then(regex = r#"^the participant "([^"]+)" is confirmed$"#)]
async fn then_participant_confirmed(world: &mut AppWorld, email: String) {
    let id = world.participant_id(&email).await;
    let state = world.app_state();
    let participant = Participant::find(&state.db, &id)
        .await
        .expect("participant query")
        .expect("participant must exist");
    assert!(participant.is_confirmed);
}

#[then(regex = r#"^the participant "([^"]+)" is not confirmed$"#)]
async fn then_participant_unconfirmed(world: &mut AppWorld, email: String) {
    let id = world.participant_id(&email).await;
    let state = world.app_state();
    let participant = Participant::find(&state.db, &id)
        .await
        .expect("participant query")
        .expect("participant must exist");
    assert!(!participant.is_confirmed);
}

#[then(regex = r#"^the participant "([^"]+)" is named "([^"]+)"$"#)]
async fn then_participant_named(world: &mut AppWorld, email: String, name: String) {
    let id = world.participant_id(&email).await;
    let state = world.app_state();
    let participant = Participant::find(&state.db, &id)
        .await
        .expect("participant query")
        .expect("participant must exist");
    assert_eq!(participant.name.as_deref(), Some(name.as_str()));
}

#[then("the redirect points to the participant confirmed page")]
async fn then_redirect_confirmed_page(world: &mut AppWorld) {
    let location = world
        .response()
        .location
        .as_deref()
        .expect("a redirect must carry a location header");
    assert!(
        location.starts_with("http://localhost:3000/participants/"),
        "unexpected location {location}"
    );
    let expected_suffix = format!("/confirmed?tripId={}", world.trip_id());
    assert!(
        location.ends_with(&expected_suffix),
        "unexpected location {location}"
    );
}

#[then(regex = r"^no trips exist$")]
async fn then_no_trips(world: &mut AppWorld) {
    let state = world.app_state();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trips")
        .fetch_one(&state.db)
        .await
        .expect("trip count");
    assert_eq!(count, 0);
}

#[then(regex = r"^no participants exist$")]
async fn then_no_participants(world: &mut AppWorld) {
    let state = world.app_state();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM participants")
        .fetch_one(&state.db)
        .await
        .expect("participant count");
    assert_eq!(count, 0);
}

#[then(regex = r#"^the stored trip destination is "([^"]+)"$"#)]
async fn then_trip_destination(world: &mut AppWorld, expected: String) {
    let state = world.app_state();
    let destination: String = sqlx::query_scalar("SELECT destination FROM trips WHERE id = ?1")
        .bind(world.trip_id())
        .fetch_one(&state.db)
        .await
        .expect("trip query");
    assert_eq!(destination, expected);
}

#[then(regex = r"^the response has (\d+) day buckets$")]
async fn then_day_bucket_count(world: &mut AppWorld, expected: usize) {
    let buckets = world.response().body["activities"]
        .as_array()
        .expect("activities array")
        .len();
    assert_eq!(buckets, expected);
}

#[then(regex = r"^day bucket (\d+) has (\d+) activities$")]
async fn then_day_bucket_size(world: &mut AppWorld, index: usize, expected: usize) {
    let bucket = &world.response().body["activities"][index];
    let count = bucket["activities"].as_array().expect("bucket array").len();
    assert_eq!(count, expected, "bucket {index}: {bucket}");
}

#[then(regex = r#"^day bucket (\d+) lists "([^"]+)" before "([^"]+)"$"#)]
async fn then_day_bucket_order(world: &mut AppWorld, index: usize, first: String, second: String) {
    let bucket = world.response().body["activities"][index]["activities"]
        .as_array()
        .expect("bucket array")
        .clone();
    let titles: Vec<&str> = bucket
        .iter()
        .filter_map(|activity| activity["title"].as_str())
        .collect();
    let first_pos = titles.iter().position(|title| *title == first);
    let second_pos = titles.iter().position(|title| *title == second);
    assert!(
        first_pos.is_some() && second_pos.is_some() && first_pos < second_pos,
        "unexpected order {titles:?}"
    );
}

#[then(regex = r#"^the activity "([^"]+)" still exists$"#)]
async fn then_activity_exists(world: &mut AppWorld, title: String) {
    let activity_id = world.activities.get(&title).expect("activity id").clone();
    let state = world.app_state();
    let activity = Activity::find(&state.db, &activity_id)
        .await
        .expect("activity query");
    assert!(activity.is_some());
}

#[then(regex = r"^the response lists (\d+) links$")]
async fn then_link_count(world: &mut AppWorld, expected: usize) {
    let links = world.response().body["links"]
        .as_array()
        .expect("links array")
        .len();
    assert_eq!(links, expected);
}

#[tokio::main]
async fn main() {
    AppWorld::cucumber()
        .fail_on_skipped()
        .with_default_cli()
        .run("tests/features")
        .await;
}
