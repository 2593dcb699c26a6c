//! 测试用的本地 HTTP 服务（axum），每个测试独占一个随机端口。

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread;

use axum::Router;
use axum::body::{Body, Bytes};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;

#[derive(Clone)]
pub(crate) enum Route {
    Json(String),
    /// `declare_length` 为 false 时走 chunked，不带 Content-Length
    File { body: Vec<u8>, declare_length: bool },
    /// 声明 `declared_len`，发送 `head` 后连接出错
    Broken { head: Vec<u8>, declared_len: u64 },
    Status(u16),
}

impl Route {
    pub(crate) fn json(body: &str) -> Self {
        Route::Json(body.to_string())
    }

    pub(crate) fn file(body: &[u8]) -> Self {
        Route::File {
            body: body.to_vec(),
            declare_length: true,
        }
    }

    pub(crate) fn chunked(body: &[u8]) -> Self {
        Route::File {
            body: body.to_vec(),
            declare_length: false,
        }
    }

    fn respond(self) -> Response {
        match self {
            Route::Json(body) => {
                ([(header::CONTENT_TYPE, "application/json")], body).into_response()
            }
            Route::File {
                body,
                declare_length: true,
            } => {
                let len = body.len();
                let mut resp = Response::new(Body::from(body));
                resp.headers_mut()
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
                resp
            }
            Route::File {
                body,
                declare_length: false,
            } => {
                let chunks = body
                    .chunks(7)
                    .map(|c| Ok(Bytes::copy_from_slice(c)))
                    .collect();
                Response::new(Body::from_stream(ChunkStream { chunks }))
            }
            Route::Broken { head, declared_len } => {
                let chunks = VecDeque::from([
                    Ok(Bytes::from(head)),
                    Err(io::Error::new(io::ErrorKind::ConnectionReset, "boom")),
                ]);
                let mut resp = Response::new(Body::from_stream(ChunkStream { chunks }));
                resp.headers_mut()
                    .insert(header::CONTENT_LENGTH, HeaderValue::from(declared_len));
                resp
            }
            Route::Status(code) => StatusCode::from_u16(code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response(),
        }
    }
}

struct ChunkStream {
    chunks: VecDeque<Result<Bytes, io::Error>>,
}

impl futures_core::Stream for ChunkStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.chunks.pop_front())
    }
}

pub(crate) struct TestServer {
    addr: SocketAddr,
    shutdown: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    pub(crate) fn start(routes: Vec<(&'static str, Route)>) -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test server");
        listener.set_nonblocking(true).expect("nonblocking listener");
        let addr = listener.local_addr().expect("local addr");

        let mut router = Router::new();
        for (path, route) in routes {
            router = router.route(
                path,
                get(move || {
                    let route = route.clone();
                    async move { route.respond() }
                }),
            );
        }

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        thread::spawn(move || {
            let rt = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("test runtime");
            rt.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).expect("tokio listener");
                let _ = axum::serve(listener, router)
                    .with_graceful_shutdown(async move {
                        let _ = rx.await;
                    })
                    .await;
            });
        });

        Self {
            addr,
            shutdown: Some(tx),
        }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
