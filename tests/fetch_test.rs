//! URL sources served by a throwaway local HTTP responder.

use std::sync::Arc;

use parking_lot::Mutex;
use reqwest::Url;
use stylesync::capabilities::{NativeCapabilities, SandboxedCapabilities};
use stylesync::config::{FetchConfig, SourcesConfig};
use stylesync::engine::{Engine, StaticConfig};
use stylesync::error::LoadError;
use stylesync::loader::ContentLoader;
use stylesync::sink::StyleRegistry;
use stylesync::source::{FileType, Theme};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Serves fixed responses by path and records raw request heads.
struct Responder {
    base: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl Responder {
    async fn start(routes: Vec<(&'static str, u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let routes = routes.clone();
                let seen = seen.clone();

                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 1024];
                    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                        match stream.read(&mut chunk).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => buf.extend_from_slice(&chunk[..n]),
                        }
                    }

                    let head = String::from_utf8_lossy(&buf).into_owned();
                    let path = head.split_whitespace().nth(1).unwrap_or("/").to_string();
                    seen.lock().push(head);

                    let (status, body) = routes
                        .iter()
                        .find(|(route, _, _)| *route == path)
                        .map(|(_, status, body)| (*status, *body))
                        .unwrap_or((404, "missing"));
                    let reason = match status {
                        200 => "OK",
                        404 => "Not Found",
                        503 => "Service Unavailable",
                        _ => "Unknown",
                    };

                    let response = format!(
                        "HTTP/1.1 {status} {reason}\r\nContent-Type: text/css\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        Self { base, requests }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[tokio::test]
async fn test_load_url_detects_type_from_path() {
    let server = Responder::start(vec![("/theme.css", 200, "body { margin: 0; }")]).await;
    let loader = ContentLoader::new(&FetchConfig::default(), true).unwrap();

    let loaded = loader
        .load_url(&Url::parse(&server.url("/theme.css")).unwrap())
        .await
        .unwrap();
    assert_eq!(loaded.src, "body { margin: 0; }");
    assert_eq!(loaded.file_type, FileType::Css);
}

#[tokio::test]
async fn test_non_success_status_carries_status_text() {
    let server = Responder::start(vec![("/down.css", 503, "try later")]).await;
    let loader = ContentLoader::new(&FetchConfig::default(), true).unwrap();

    let err = loader
        .load_url(&Url::parse(&server.url("/down.css")).unwrap())
        .await
        .unwrap_err();
    match err {
        LoadError::Status { status, .. } => assert_eq!(status, "Service Unavailable"),
        other => panic!("expected status error, got {other:?}"),
    }

    let err = loader
        .load_url(&Url::parse(&server.url("/nothing.css")).unwrap())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Not Found"));
}

#[tokio::test]
async fn test_user_agent_sent_only_by_native_loader() {
    let server = Responder::start(vec![("/a.css", 200, "a{}")]).await;
    let url = Url::parse(&server.url("/a.css")).unwrap();

    ContentLoader::new(&FetchConfig::default(), true)
        .unwrap()
        .load_url(&url)
        .await
        .unwrap();
    ContentLoader::new(&FetchConfig::default(), false)
        .unwrap()
        .load_url(&url)
        .await
        .unwrap();

    let requests: Vec<String> = server.requests().iter().map(|r| r.to_lowercase()).collect();
    assert_eq!(requests.len(), 2);

    let tagged = requests
        .iter()
        .filter(|r| r.contains("user-agent: stylesync/"))
        .count();
    assert_eq!(tagged, 1);
}

#[tokio::test]
async fn test_engine_compiles_remote_sass_and_keeps_theme() {
    let server = Responder::start(vec![
        ("/dark.scss", 200, "$bg: black;\nbody { background: $bg; }"),
        ("/gone.css", 404, ""),
    ])
    .await;

    let dark = format!("@dark {}", server.url("/dark.scss"));
    let config = Arc::new(StaticConfig::new(SourcesConfig::new(
        [dark.clone(), server.url("/gone.css")],
        false,
    )));
    let engine = Engine::new(
        Arc::new(NativeCapabilities::new()),
        config,
        &FetchConfig::default(),
    )
    .unwrap();

    let registry = Arc::new(StyleRegistry::new());
    let handle = engine.init(registry.clone()).unwrap();
    handle.settled().await.unwrap();

    assert_eq!(registry.paths(), vec![dark.clone()]);
    let entry = registry.get(&dark).unwrap();
    assert_eq!(entry.theme, Theme::Dark);
    assert_eq!(entry.file_type, FileType::Sass);
    assert!(entry.src.contains("background: black"));

    handle.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_sandboxed_engine_skips_remote_sass() {
    let server = Responder::start(vec![
        ("/theme.scss", 200, "a { b: c; }"),
        ("/plain.css", 200, "p{}"),
    ])
    .await;

    let config = Arc::new(StaticConfig::new(SourcesConfig::new(
        [server.url("/theme.scss"), server.url("/plain.css")],
        false,
    )));
    let engine = Engine::new(Arc::new(SandboxedCapabilities), config, &FetchConfig::default()).unwrap();

    let registry = Arc::new(StyleRegistry::new());
    let handle = engine.init(registry.clone()).unwrap();
    handle.settled().await.unwrap();

    assert_eq!(registry.paths(), vec![server.url("/plain.css")]);
    assert!(
        server
            .requests()
            .iter()
            .all(|r| !r.to_lowercase().contains("user-agent: stylesync/"))
    );

    handle.shutdown().await.unwrap();
}
