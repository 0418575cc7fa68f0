//! API documentation routes.
//!
//! Serves an embedded viewer for a caller-supplied OpenAPI document at a
//! configurable mount path, with an optional inline logo.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use base64::Engine;
use rust_embed::Embed;

/// Embedded viewer assets.
#[derive(Embed)]
#[folder = "assets/docs/"]
struct DocAssets;

/// Documentation bundle handed to the server builder.
#[derive(Debug, Clone)]
pub struct ApiDocs {
    path: String,
    spec: String,
    spec_content_type: &'static str,
    logo_data_url: Option<String>,
}

impl ApiDocs {
    /// Serve a JSON OpenAPI document under `path`.
    pub fn json(path: impl Into<String>, spec: impl Into<String>) -> Self {
        Self {
            path: normalize_mount(path.into()),
            spec: spec.into(),
            spec_content_type: "application/json; charset=utf-8",
            logo_data_url: None,
        }
    }

    /// Serve a YAML OpenAPI document under `path`.
    pub fn yaml(path: impl Into<String>, spec: impl Into<String>) -> Self {
        Self {
            path: normalize_mount(path.into()),
            spec: spec.into(),
            spec_content_type: "application/yaml; charset=utf-8",
            logo_data_url: None,
        }
    }

    /// Embed a logo into the viewer page as a data URL.
    pub fn with_logo(mut self, mime: &str, bytes: &[u8]) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        self.logo_data_url = Some(format!("data:{};base64,{}", mime, encoded));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

#[derive(Clone)]
struct DocsState {
    index_html: Arc<String>,
    spec: Arc<ApiDocs>,
}

/// Builds the documentation router mounted by the server builder.
pub fn router(docs: ApiDocs) -> Router {
    let mount = docs.path.clone();
    let state = DocsState {
        index_html: Arc::new(render_index(&docs)),
        spec: Arc::new(docs),
    };

    let redirect_to = format!("{}/", mount);
    Router::new()
        .route(
            &mount,
            get(move || {
                let target = redirect_to.clone();
                async move { Redirect::permanent(&target) }
            }),
        )
        .route(&format!("{}/", mount), get(index))
        .route(&format!("{}/openapi", mount), get(openapi_spec))
        .route(&format!("{}/assets/*file", mount), get(asset))
        .with_state(state)
}

/// Serve the rendered viewer page.
async fn index(State(state): State<DocsState>) -> Html<String> {
    Html(state.index_html.as_ref().clone())
}

/// Serve the OpenAPI document beside the viewer.
async fn openapi_spec(State(state): State<DocsState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, state.spec.spec_content_type)],
        state.spec.spec.clone(),
    )
}

/// Serve embedded static assets referenced by the viewer page.
async fn asset(Path(file): Path<String>) -> Response {
    match DocAssets::get(&file) {
        Some(content) => {
            let mime = mime_guess::from_path(&file).first_or_octet_stream();
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, mime.as_ref())
                .header(header::CACHE_CONTROL, "public, max-age=3600")
                .body(Body::from(content.data.into_owned()))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Renders the index template with the OpenAPI document URL and logo.
fn render_index(docs: &ApiDocs) -> String {
    let template = DocAssets::get("index.html")
        .map(|file| String::from_utf8_lossy(&file.data).into_owned())
        .unwrap_or_default();

    let logo = docs
        .logo_data_url
        .as_deref()
        .map(|url| format!(r#"<img class="api-logo" src="{}" alt="API logo" />"#, url))
        .unwrap_or_default();

    template
        .replace("{{SPEC_URL}}", "openapi")
        .replace("{{LOGO}}", &logo)
}

/// Guarantees a leading slash and no trailing slash on the mount path.
fn normalize_mount(path: String) -> String {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return "/docs".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewer_assets_are_embedded() {
        assert!(DocAssets::get("index.html").is_some());
        assert!(DocAssets::get("custom.css").is_some());
    }

    #[test]
    fn index_template_has_placeholders() {
        let template = DocAssets::get("index.html").unwrap();
        let template = String::from_utf8_lossy(&template.data);

        assert!(template.contains("{{SPEC_URL}}"));
        assert!(template.contains("{{LOGO}}"));
    }

    #[test]
    fn render_substitutes_spec_url() {
        let docs = ApiDocs::json("/api/docs", "{}");
        let rendered = render_index(&docs);

        assert!(rendered.contains("openapi"));
        assert!(!rendered.contains("{{SPEC_URL}}"));
        assert!(!rendered.contains("{{LOGO}}"));
    }

    #[test]
    fn render_embeds_logo_as_data_url() {
        let docs = ApiDocs::json("/api/docs", "{}").with_logo("image/png", &[0x89, 0x50]);
        let rendered = render_index(&docs);

        assert!(rendered.contains("data:image/png;base64,iVA="));
    }

    #[test]
    fn mount_paths_are_normalized() {
        assert_eq!(normalize_mount("/api/docs".into()), "/api/docs");
        assert_eq!(normalize_mount("/api/docs/".into()), "/api/docs");
        assert_eq!(normalize_mount("api/docs".into()), "/api/docs");
        assert_eq!(normalize_mount("".into()), "/docs");
    }

    #[test]
    fn yaml_docs_use_yaml_content_type() {
        let docs = ApiDocs::yaml("/api/docs", "openapi: 3.0.0");
        assert_eq!(docs.spec_content_type, "application/yaml; charset=utf-8");
    }
}
