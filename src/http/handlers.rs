//! Index, repository file and health handlers.

use std::fmt::Write;

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
};

use crate::generator::model::RepoProxy;
use crate::http::server::AppState;

const NOT_READY: &str = "not ready\n";

/// `GET /`
pub async fn index(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(config) = state.snapshot.load() else {
        return not_ready();
    };

    let accept = header_str(&headers, header::ACCEPT);
    if preferred_media_type(accept, &["text/html", "text/plain"]) == Some("text/html") {
        return Html(render_index(&config.repo_proxies)).into_response();
    }

    let scheme = request_scheme(&headers, state.tls);
    let host = header_str(&headers, header::HOST);
    let mut body = String::new();
    for repo in &config.repo_proxies {
        write_repo_file(&mut body, repo, &url_for_repo(scheme, host, &repo.repo_id));
    }
    plain_text(StatusCode::OK, body)
}

/// `GET /{id}.repo`
pub async fn repo_file(
    State(state): State<AppState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Response {
    let Some(repo_id) = file.strip_suffix(".repo") else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let Some(config) = state.snapshot.load() else {
        return not_ready();
    };
    let Some(repo) = config.repo(repo_id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let scheme = request_scheme(&headers, state.tls);
    let host = header_str(&headers, header::HOST);
    let mut body = String::new();
    write_repo_file(&mut body, repo, &url_for_repo(scheme, host, &repo.repo_id));
    plain_text(StatusCode::OK, body)
}

/// `GET /healthz`
pub async fn healthz(State(state): State<AppState>) -> Response {
    let Some(config) = state.snapshot.load() else {
        return not_ready();
    };

    for repo in &config.repo_proxies {
        if let Err(e) = state.client.get(repo.url.clone()).send().await {
            tracing::debug!(repo = %repo.repo_id, error = %e, "Health check failed");
            return plain_text(StatusCode::INTERNAL_SERVER_ERROR, "not ok\n".to_string());
        }
    }
    plain_text(StatusCode::OK, "ok\n".to_string())
}

fn not_ready() -> Response {
    plain_text(StatusCode::SERVICE_UNAVAILABLE, NOT_READY.to_string())
}

fn plain_text(status: StatusCode, body: String) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain; charset=utf-8")], body).into_response()
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> &str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

/// Scheme clients used to reach us: `X-Forwarded-Proto` first, then our own listener.
fn request_scheme(headers: &HeaderMap, tls: bool) -> &'static str {
    match header_str(headers, header::HeaderName::from_static("x-forwarded-proto")) {
        "https" => "https",
        "http" => "http",
        _ if tls => "https",
        _ => "http",
    }
}

fn url_for_repo(scheme: &str, host: &str, repo_id: &str) -> String {
    format!("{}://{}/{}", scheme, host, repo_id)
}

/// First entry of `accept` that names one of `candidates`.
pub fn preferred_media_type<'a>(accept: &str, candidates: &[&'a str]) -> Option<&'a str> {
    accept.split(',').find_map(|entry| {
        let media_type = entry.split(';').next().unwrap_or_default().trim();
        candidates
            .iter()
            .find(|c| c.eq_ignore_ascii_case(media_type))
            .copied()
    })
}

fn write_repo_file(out: &mut String, repo: &RepoProxy, base_url: &str) {
    let _ = write!(
        out,
        "\n[{id}]\nid = {id}\nname = {id}\nbaseurl = {base_url}\nenabled = 1\ngpgcheck = 0\n",
        id = repo.repo_id,
        base_url = base_url
    );
}

fn render_index(repos: &[RepoProxy]) -> String {
    let mut html = String::from(
        "<!DOCTYPE html>\n<html lang='en'>\n  <head>\n    <meta charset='utf-8'>\n    \
         <title>Content Mirror</title>\n  </head>\n  <body>\n    <h1>Available content</h1>\n    <ul>\n",
    );
    for repo in repos {
        let id = escape_html(&repo.repo_id);
        let _ = writeln!(
            html,
            "      <li><a href=\"/{id}\">{id}</a> (<a href=\"/{id}.repo\">RPM repo</a>)</li>",
            id = id
        );
    }
    html.push_str("    </ul>\n  </body>\n</html>\n");
    html
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
