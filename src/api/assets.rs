//! Embedded chat page and its static assets

use axum::{
    http::{header, Uri},
    response::{IntoResponse, Response},
};
use rust_embed::Embed;

#[derive(Embed)]
#[folder = "ui"]
struct Assets;

/// Look up an embedded file by its path relative to the `ui` folder
pub fn asset(path: &str) -> Option<Response> {
    let content = Assets::get(path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    Some(([(header::CONTENT_TYPE, mime.as_ref().to_string())], content.data.into_owned()).into_response())
}

/// Path of a request for `/assets/*`, relative to the `ui` folder
pub fn asset_path(uri: &Uri) -> &str {
    uri.path().trim_start_matches('/')
}

/// The chat page
pub fn index_html() -> Option<String> {
    let content = Assets::get("index.html")?;
    String::from_utf8(content.data.into_owned()).ok()
}
