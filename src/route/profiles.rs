use rocket::serde::json::Json;
use rocket::State;
use serde_json::{Map, Value};

use crate::data::profile::store::ProfileStore;
use crate::data::profile::{LoginData, Profile};
use crate::resp::problem::Problem;
use crate::resp::success::{LoginResponse, ServerStatus, Success};

/// List all profiles, passwords omitted
#[utoipa::path(
    responses(
        (status = 200, description = "Stored profiles without passwords", body = Vec<Profile>),
    )
)]
#[get("/profiles")]
#[tracing::instrument(skip(store))]
pub async fn profile_list(store: &State<ProfileStore>) -> Json<Vec<Profile>> {
    Json(store.list().await)
}

/// Log in with a username and password
#[utoipa::path(
    request_body = LoginData,
    responses(
        (status = 200, description = "Full stored profile", body = LoginResponse),
        (status = 401, description = "Invalid username or password", body = Problem),
    )
)]
#[post("/login", data = "<login>")]
#[tracing::instrument(skip(store))]
pub async fn login_submit(
    login: Json<LoginData>,
    store: &State<ProfileStore>,
) -> Result<Json<LoginResponse>, Problem> {
    // VULN: plaintext comparison, no rate limiting
    let profile = store.authenticate(&login.username, &login.password).await?;

    Ok(Json(LoginResponse::from(profile)))
}

/// Register a new profile
#[utoipa::path(
    request_body = Profile,
    responses(
        (status = 200, description = "Profile stored", body = Success),
        (status = 400, description = "Student ID or username already used", body = Problem),
    )
)]
#[post("/profiles", data = "<profile>")]
#[tracing::instrument(skip(profile, store), fields(student_id = %profile.student_id))]
pub async fn profile_create(
    profile: Json<Profile>,
    store: &State<ProfileStore>,
) -> Result<Json<Success>, Problem> {
    store.create(profile.into_inner()).await?;

    Ok(Json(Success::default()))
}

/// Replace top-level profile fields
#[utoipa::path(
    params(
        ("student_id", description = "student ID of the profile")
    ),
    request_body = ProfilePatch,
    responses(
        (status = 200, description = "Profile updated", body = Success),
        (status = 400, description = "Update doesn't produce a valid profile or takes a used username", body = Problem),
        (status = 404, description = "Profile doesn't exist", body = Problem),
    )
)]
#[put("/profiles/<student_id>", data = "<patch>")]
#[tracing::instrument(skip(patch, store))]
pub async fn profile_update(
    student_id: &str,
    patch: Json<Map<String, Value>>,
    store: &State<ProfileStore>,
) -> Result<Json<Success>, Problem> {
    store.update(student_id, patch.into_inner()).await?;

    Ok(Json(Success::default()))
}

/// Delete a profile
#[utoipa::path(
    params(
        ("student_id", description = "student ID of the profile")
    ),
    responses(
        (status = 200, description = "Profile deleted", body = Success),
        (status = 404, description = "Profile doesn't exist", body = Problem),
    )
)]
#[delete("/profiles/<student_id>")]
#[tracing::instrument(skip(store))]
pub async fn profile_delete(
    student_id: &str,
    store: &State<ProfileStore>,
) -> Result<Json<Success>, Problem> {
    store.delete(student_id).await?;

    Ok(Json(Success::default()))
}

#[utoipa::path(
    responses(
        (status = 200, description = "Server is up", body = ServerStatus),
    )
)]
#[get("/status")]
pub fn server_status() -> Json<ServerStatus> {
    Json(ServerStatus::default())
}

///////////////////////
//       TESTS
///////////////////////

#[cfg(test)]
mod profile_endpoints {
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
    };
    use serde_json::{json, Value};

    use crate::config::Config;
    use crate::data::profile::store::ProfileStore;
    use crate::data::profile::Profile;
    use crate::util::temp_path;

    async fn tracked_client() -> Client {
        let c = Config::with_database(temp_path("profiles.json"));
        Client::tracked(crate::build(c).expect("invalid backend"))
            .await
            .expect("invalid backend")
    }

    fn store(client: &Client) -> &ProfileStore {
        client.rocket().state().expect("store isn't managed")
    }

    fn ann() -> Value {
        json!({
            "name": "Ann",
            "studentId": "S1",
            "username": "ann",
            "password": "pw"
        })
    }

    async fn register(client: &Client, body: &Value) -> (Status, Value) {
        let response = client.post("/api/profiles").json(body).dispatch().await;
        let status = response.status();
        (status, response.into_json().await.expect("invalid response json"))
    }

    #[rocket::async_test]
    async fn list_starts_empty() {
        let client = tracked_client().await;
        let response = client.get("/api/profiles").dispatch().await;

        assert_eq!(response.status(), Status::Ok, "an ok response");
        assert_eq!(
            response.content_type(),
            Some(ContentType::JSON),
            "not a application/json response"
        );
        let profiles: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(profiles, json!([]));
    }

    #[rocket::async_test]
    async fn registered_profile_is_listed_as_sent() {
        let client = tracked_client().await;

        let (status, body) = register(&client, &ann()).await;
        assert_eq!(status, Status::Ok);
        assert_eq!(body, json!({"success": true}));

        let response = client.get("/api/profiles").dispatch().await;
        let profiles: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(
            profiles,
            json!([{"name": "Ann", "studentId": "S1", "username": "ann"}]),
            "password leaked or defaults injected"
        );
    }

    #[rocket::async_test]
    async fn duplicate_student_id_is_rejected() {
        let client = tracked_client().await;
        register(&client, &ann()).await;

        let (status, body) = register(
            &client,
            &json!({"studentId": "S1", "username": "other", "password": "x"}),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("Student ID already exists"));

        let (status, body) = register(
            &client,
            &json!({"studentId": "S2", "username": "ann", "password": "x"}),
        )
        .await;
        assert_eq!(status, Status::BadRequest);
        assert_eq!(body["error"], json!("Username already taken"));
    }

    #[rocket::async_test]
    async fn login_returns_full_record() {
        let client = tracked_client().await;
        register(&client, &ann()).await;

        let response = client
            .post("/api/login")
            .json(&json!({"username": "ann", "password": "pw"}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["profile"], ann());
    }

    #[rocket::async_test]
    async fn admin_login_works_without_profiles() {
        let client = tracked_client().await;

        let response = client
            .post("/api/login")
            .json(&json!({"username": "admin", "password": "admin"}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body["profile"]["studentId"], json!("ADMIN"));
        assert_eq!(body["profile"]["role"], json!("admin"));
        assert_eq!(body["profile"]["hearts"], json!(999));
        assert_eq!(body["profile"]["xp"], json!(0));
        assert!(!store(&client).path().exists(), "store was touched");
    }

    #[rocket::async_test]
    async fn bad_logins_look_the_same() {
        let client = tracked_client().await;
        register(&client, &ann()).await;

        let mut replies = vec![];
        for credentials in [
            json!({"username": "ann", "password": "wrong"}),
            json!({"username": "nobody", "password": "pw"}),
        ] {
            let response = client.post("/api/login").json(&credentials).dispatch().await;
            assert_eq!(response.status(), Status::Unauthorized);
            let body: Value = response.into_json().await.expect("invalid response json");
            replies.push(body);
        }

        assert_eq!(replies[0], replies[1]);
        assert_eq!(
            replies[0],
            json!({"success": false, "error": "Invalid username or password"})
        );
    }

    #[rocket::async_test]
    async fn update_merges_shallowly() {
        let client = tracked_client().await;
        let mut full = ann();
        full["stats"] = json!({"ohm": {"xp": 5, "time": 30}});
        full["topicProgress"] = json!({"ohm": 2});
        register(&client, &full).await;

        let response = client
            .put("/api/profiles/S1")
            .json(&json!({"hearts": 3}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client
            .put("/api/profiles/S1")
            .json(&json!({"xp": 12}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let stored = store(&client).load().await;
        let mut expected: Profile = serde_json::from_value(full).unwrap();
        expected.hearts = Some(3);
        expected.xp = Some(12);
        assert_eq!(stored, vec![expected]);
    }

    #[rocket::async_test]
    async fn update_of_unknown_profile_is_not_found() {
        let client = tracked_client().await;

        let response = client
            .put("/api/profiles/S404")
            .json(&json!({"hearts": 3}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::NotFound);

        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body["error"], json!("Profile not found"));
    }

    #[rocket::async_test]
    async fn mistyped_update_is_rejected() {
        let client = tracked_client().await;
        register(&client, &ann()).await;

        let response = client
            .put("/api/profiles/S1")
            .json(&json!({"hearts": "lots"}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[rocket::async_test]
    async fn update_cannot_take_another_username() {
        let client = tracked_client().await;
        register(&client, &ann()).await;
        register(
            &client,
            &json!({"studentId": "S2", "username": "bob", "password": "pw"}),
        )
        .await;

        let response = client
            .put("/api/profiles/S2")
            .json(&json!({"username": "ann"}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["error"], json!("Username already taken"));

        let bob = store(&client).authenticate("bob", "pw").await;
        assert!(bob.is_ok(), "rejected rename was stored");
    }

    #[rocket::async_test]
    async fn unknown_keys_are_kept() {
        let client = tracked_client().await;
        let mut with_avatar = ann();
        with_avatar["avatar"] = json!("fox");
        register(&client, &with_avatar).await;

        let response = client
            .put("/api/profiles/S1")
            .json(&json!({"streak": 3}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.get("/api/profiles").dispatch().await;
        let profiles: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(profiles[0]["avatar"], json!("fox"));
        assert_eq!(profiles[0]["streak"], json!(3));
    }

    #[rocket::async_test]
    async fn delete_twice_is_not_found() {
        let client = tracked_client().await;
        register(&client, &ann()).await;

        let response = client.delete("/api/profiles/S1").dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        let response = client.delete("/api/profiles/S1").dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body["success"], json!(false));
    }

    #[rocket::async_test]
    async fn status_reports_running() {
        let client = tracked_client().await;
        let response = client.get("/api/status").dispatch().await;

        assert_eq!(response.status(), Status::Ok);
        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(
            body,
            json!({"status": "Server is running", "message": "Welcome to Circuitly Backend!"})
        );
    }

    #[rocket::async_test]
    async fn malformed_bodies_use_failure_envelope() {
        let client = tracked_client().await;

        let response = client
            .post("/api/profiles")
            .header(ContentType::JSON)
            .body("{")
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body["success"], json!(false));

        let response = client
            .post("/api/profiles")
            .json(&json!({"name": "no id"}))
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::UnprocessableEntity);
        let body: Value = response.into_json().await.expect("invalid response json");
        assert_eq!(body["success"], json!(false));
    }
}
