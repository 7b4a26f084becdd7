use std::collections::BTreeMap;

use rocket::http::Status;
use rocket::{Build, Catcher, Request, Rocket, Route};

pub mod files;
pub mod profiles;

use files::*;
use profiles::*;

use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    data::profile::{LoginData, Profile, ProfilePatch, TopicStats},
    resp::{
        problem::{problems, Problem},
        success::{LoginResponse, ServerStatus, Success},
    },
    role::Role,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        profile_list,
        login_submit,
        profile_create,
        profile_update,
        profile_delete,
        server_status
    ),
    components(schemas(
        Role,
        Profile,
        ProfilePatch,
        TopicStats,
        LoginData,
        Success,
        LoginResponse,
        ServerStatus,
        Problem
    )),
    modifiers(&API_PREFIX)
)]
pub struct ApiDoc;

pub struct PathPrefix(pub &'static str);
static API_PREFIX: PathPrefix = PathPrefix("/api");

impl utoipa::Modify for PathPrefix {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let mut new_paths = BTreeMap::new();

        for (path, item) in std::mem::take(&mut openapi.paths.paths) {
            new_paths.insert(self.0.to_string() + &path, item);
        }

        openapi.paths.paths = new_paths;
    }
}

#[catch(400)]
fn bad_request() -> Problem {
    problems::parse_problem()
}

#[catch(404)]
fn not_found() -> Problem {
    problems::no_route()
}

#[catch(422)]
fn unprocessable() -> Problem {
    problems::unprocessable()
}

#[catch(default)]
fn any_problem(status: Status, _: &Request<'_>) -> Problem {
    Problem::new(status, status.reason().unwrap_or("Request failed."))
}

pub fn api() -> Vec<Route> {
    routes![
        profile_list,
        login_submit,
        profile_create,
        profile_update,
        profile_delete,
        server_status
    ]
}

pub fn api_catchers() -> Vec<Catcher> {
    catchers![bad_request, not_found, unprocessable, any_problem]
}

pub fn mount_api(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/api", api())
        .register("/api", api_catchers())
        .mount(
            "/",
            SwaggerUi::new("/swagger/<_..>").url("/api/openapi.json", ApiDoc::openapi()),
        )
        .mount("/", routes![app, app_path])
}
