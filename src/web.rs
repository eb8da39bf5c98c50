use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode, Uri},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use askama::Template;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::{info, warn};

use crate::config::Config;
use crate::expander::{self, RelayPorts};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
}

#[derive(Template)]
#[template(path = "debug.html")]
struct DebugTemplate {
    final_url: String,
    test_link: String,
}

#[derive(Template)]
#[template(path = "error.html")]
struct ErrorTemplate {
    message: String,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/", get(relay))
        .fallback(relay)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .with_state(state)
}

pub async fn run_server(config: Config) {
    let state = AppState {
        config: config.clone(),
    };
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.server_addr).await.unwrap();
    info!("Relay listening on {}", config.server_addr);
    axum::serve(listener, app).await.unwrap();
}

/// HTTP side of the relay ports: the outcome of the pipeline becomes the
/// response for the current request.
struct ResponseSink {
    response: Option<Response>,
}

impl RelayPorts for ResponseSink {
    fn navigate(&mut self, url: &str) {
        info!(%url, "Redirecting");
        self.response = Some(Redirect::to(url).into_response());
    }

    fn render_debug(&mut self, final_url: &str, test_link: &str) {
        info!(%final_url, "Debug render");
        let template = DebugTemplate {
            final_url: final_url.to_string(),
            test_link: test_link.to_string(),
        };
        self.response = Some(Html(template.render().unwrap()).into_response());
    }

    fn render_error(&mut self, message: &str) {
        warn!(%message, "Relay failed");
        let template = ErrorTemplate {
            message: message.to_string(),
        };
        self.response =
            Some((StatusCode::BAD_REQUEST, Html(template.render().unwrap())).into_response());
    }
}

async fn relay(State(state): State<AppState>, uri: Uri) -> Response {
    // The browser's full URL: configured public origin plus the request URI.
    let full_url = format!("{}{}", state.config.public_url.trim_end_matches('/'), uri);

    let mut sink = ResponseSink { response: None };
    expander::run(&full_url, &mut sink);
    sink.response
        .unwrap_or_else(|| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> Router {
        create_app(AppState {
            config: Config {
                server_addr: "127.0.0.1:0".to_string(),
                public_url: "http://relay.test".to_string(),
            },
        })
    }

    async fn get_response(uri: &str) -> Response {
        app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let response = get_response("/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "OK");
    }

    #[tokio::test]
    async fn redirects_with_expanded_params() {
        let response =
            get_response("/?redirectUrl=https://x.test&label_0=lb0&value_0=a,b,andc").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://x.test/?lb0=a&lb0=b&lb0=c"
        );
    }

    #[tokio::test]
    async fn relays_from_any_path() {
        let response =
            get_response("/go/here?redirectUrl=https://x.test/dash&hoge=hoge").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "https://x.test/dash?hoge=hoge"
        );
    }

    #[tokio::test]
    async fn debug_mode_renders_instead_of_redirecting() {
        let response = get_response(
            "/?redirectUrl=https://x.test&debug=true&label_0=lb0&value_0=a,b,andc",
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(header::LOCATION).is_none());

        let body = body_string(response).await;
        // Askama escapes the ampersands in the rendered URL.
        assert!(body.contains("https://x.test/?lb0=a&amp;lb0=b&amp;lb0=c"));
        assert!(body.contains("redirectUrl=https://google.com"));
        assert!(body.contains("hoge=hoge"));
    }

    #[tokio::test]
    async fn missing_redirect_url_renders_usage() {
        let response = get_response("/?label_0=lb0&value_0=a").await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers().get(header::LOCATION).is_none());

        let body = body_string(response).await;
        assert!(body.contains("param is not found in url"));
        assert!(body.contains("usage:"));
        assert!(body.contains("label_0="));
    }
}
