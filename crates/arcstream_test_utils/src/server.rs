//! A minimal HTTP server that serves fixed responses on an ephemeral port.
use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    Router,
    body::Body,
    extract::State,
    http::{
        Response, StatusCode, Uri,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    serve,
};
use futures::StreamExt;
use tokio::net::TcpListener;
use url::Url;

/// How the server answers a request for a path.
#[derive(Debug, Clone)]
pub enum Route {
    /// The whole body in one response with a `Content-Length` header.
    Body(Vec<u8>),
    /// The body as separate chunks, each preceded by `delay`.
    Chunked { chunks: Vec<Vec<u8>>, delay: Duration },
    /// An empty response with the given status.
    Status(StatusCode),
}

impl Route {
    /// Splits `body` into chunks of `chunk_size` bytes.
    pub fn chunked(body: &[u8], chunk_size: usize, delay: Duration) -> Self {
        Self::Chunked {
            chunks: body.chunks(chunk_size.max(1)).map(<[u8]>::to_vec).collect(),
            delay,
        }
    }
}

type Routes = Arc<HashMap<String, Route>>;

pub struct TestHttpServer {
    base: Url,
}

impl TestHttpServer {
    /// Binds to a random local port and serves `routes` until the runtime shuts down.
    pub async fn spawn<P: Into<String>>(routes: impl IntoIterator<Item = (P, Route)>) -> Self {
        let routes: Routes = Arc::new(
            routes
                .into_iter()
                .map(|(path, route)| (path.into(), route))
                .collect(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base = Url::parse(&format!("http://{addr}/")).unwrap();

        let router = Router::new().fallback(respond).with_state(routes);
        let server = serve(listener, router);
        tokio::spawn(async move {
            let _ = server.await;
        });

        Self { base }
    }

    /// The absolute URL of `path` on this server.
    pub fn url(&self, path: &str) -> Url {
        self.base.join(path.trim_start_matches('/')).unwrap()
    }
}

async fn respond(State(routes): State<Routes>, uri: Uri) -> Response<Body> {
    let Some(route) = routes.get(uri.path().trim_start_matches('/')) else {
        return Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Body::empty())
            .unwrap();
    };

    match route.clone() {
        Route::Body(body) => Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, body.len())
            .body(Body::from(body))
            .unwrap(),
        Route::Chunked { chunks, delay } => {
            let stream = futures::stream::iter(chunks).then(move |chunk| async move {
                tokio::time::sleep(delay).await;
                Ok::<_, std::io::Error>(chunk)
            });
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(Body::from_stream(stream))
                .unwrap()
        }
        Route::Status(status) => Response::builder()
            .status(status)
            .body(Body::empty())
            .unwrap(),
    }
}
