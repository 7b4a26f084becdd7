use std::path::PathBuf;

use rocket::State;

use crate::config::Config;
use rocket::fs::NamedFile;

pub async fn app_index_file(c: &Config) -> Option<NamedFile> {
    let index = c.public_content.as_path().join("index.html");
    match NamedFile::open(&index).await {
        Ok(file) => Some(file),
        Err(_) => {
            tracing::warn!("'{}' does not exist!", index.display());
            None
        }
    }
}

#[get("/")]
pub async fn app(c: &State<Config>) -> Option<NamedFile> {
    app_index_file(c).await
}

/// Serves frontend files, anything unknown gets `index.html`.
#[get("/<path..>", rank = 10)]
pub async fn app_path(path: PathBuf, c: &State<Config>) -> Option<NamedFile> {
    match NamedFile::open(c.public_content.as_path().join(path.as_path())).await {
        Ok(file) => Some(file),
        Err(_) => app_index_file(c).await,
    }
}
