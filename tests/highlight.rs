use std::{
    fmt,
    sync::{Arc, Mutex},
    time::Duration,
};

use serde_json::{Value, json};
use syntect_client::{Client, Context, HighlightError, Query, Response, ScopifiedRegion};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{
    Subscriber,
    field::{Field, Visit},
    span::{Id, Record},
};
use tracing_subscriber::{
    layer::{Context as LayerContext, Layer},
    prelude::*,
    registry::LookupSpan,
};

/// What the stub server saw.
#[derive(Debug)]
struct Recorded {
    request_line: String,
    content_type: Option<String>,
    body: Value,
}

enum Reply {
    Send { status: u16, body: &'static str },
    Hang,
}

/// Serve a single request on a local port, returning the base address.
async fn stub(reply: Reply) -> (String, JoinHandle<Recorded>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        let recorded = read_request(&mut stream).await;

        match reply {
            Reply::Send { status, body } => {
                let reason = if status == 400 { "Bad Request" } else { "OK" };
                let resp = format!(
                    "HTTP/1.1 {status} {reason}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                stream.write_all(resp.as_bytes()).await.unwrap();
                stream.flush().await.unwrap();
            }
            Reply::Hang => tokio::time::sleep(Duration::from_secs(30)).await,
        }
        recorded
    });

    (format!("http://{addr}"), handle)
}

async fn read_request(stream: &mut TcpStream) -> Recorded {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8(buf[..header_end].to_vec()).unwrap();
    let header = |name: &str| {
        head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.eq_ignore_ascii_case(name).then(|| value.trim().to_string())
        })
    };
    let content_length: usize = header("content-length")
        .map(|v| v.parse().unwrap())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body");
        buf.extend_from_slice(&chunk[..n]);
    }

    Recorded {
        request_line: head.lines().next().unwrap_or_default().to_string(),
        content_type: header("content-type"),
        body: serde_json::from_slice(&buf[header_end..header_end + content_length]).unwrap(),
    }
}

/// Talks to the stub directly, ignoring any proxy set in the environment.
fn client(server: impl Into<String>) -> Client {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    Client::with_http_client(server, http)
}

fn rust_query() -> Query {
    Query::highlight("main.rs", "InspiredGitHub", "fn main() {}").unwrap()
}

#[tokio::test]
async fn sends_json_post_to_root() {
    let (server, handle) = stub(Reply::Send {
        status: 200,
        body: r#"{"Data":"<pre>fn main() {}</pre>","Plaintext":false,"detected_language":"Rust"}"#,
    })
    .await;

    let client = client(format!("{server}/"));
    let resp = client
        .highlight(&Context::background(), &rust_query())
        .await
        .unwrap();
    let recorded = handle.await.unwrap();

    assert_eq!(recorded.request_line, "POST / HTTP/1.1");
    assert_eq!(recorded.content_type.as_deref(), Some("application/json"));
    assert_eq!(
        recorded.body,
        json!({
            "extension": "",
            "filepath": "main.rs",
            "theme": "InspiredGitHub",
            "scopify": false,
            "code": "fn main() {}",
        })
    );

    let highlighted = resp.into_highlighted().unwrap();
    assert_eq!(highlighted.data, "<pre>fn main() {}</pre>");
    assert_eq!(highlighted.detected_language, "Rust");
    assert!(!highlighted.plaintext);
}

#[tokio::test]
async fn scopify_response() {
    let (server, handle) = stub(Reply::Send {
        status: 200,
        body: r#"{"Data":"","Plaintext":false,"detected_language":"Rust",
                  "scopified_scope_names":["comment","string","keyword"],
                  "scopified_regions":[{"Offset":0,"Length":3,"Scopes":[1]}]}"#,
    })
    .await;

    let query = Query::scopify("x.rs", "// x");
    let resp = client(server)
        .highlight(&Context::background(), &query)
        .await
        .unwrap();
    assert_eq!(handle.await.unwrap().body["scopify"], json!(true));

    let Response::Scopified(scopified) = resp else {
        panic!("expected scopified response");
    };
    assert_eq!(
        scopified.regions,
        vec![ScopifiedRegion { offset: 0, length: 3, scopes: vec![1] }]
    );
    for region in &scopified.regions {
        assert!(region.range().end <= query.code().len());
        assert!(scopified.scope_names.resolve(&region.scopes).is_some());
    }
    assert_eq!(scopified.scope_names.get(1), Some("string"));
}

#[tokio::test]
async fn bad_request_is_too_large() {
    // the body is never decoded, whatever it says
    let (server, handle) = stub(Reply::Send {
        status: 400,
        body: r#"{"Error":"bad theme","Code":"invalid_theme"}"#,
    })
    .await;

    let err = client(server.as_str())
        .highlight(&Context::background(), &rust_query())
        .await
        .unwrap_err();
    handle.await.unwrap();

    assert!(matches!(err, HighlightError::RequestTooLarge { .. }));
    assert_eq!(err.server(), server);
    assert!(err.is_skippable());
}

#[tokio::test]
async fn service_error_codes() {
    let cases: [(&'static str, fn(&HighlightError) -> bool); 5] = [
        (r#"{"Error":"invalid theme","Code":"invalid_theme"}"#, |e| {
            matches!(e, HighlightError::InvalidTheme { .. })
        }),
        (r#"{"error":"not found","code":"resource_not_found"}"#, |e| {
            matches!(e, HighlightError::Internal { .. })
        }),
        (r#"{"Error":"panicked","Code":"panic"}"#, |e| {
            matches!(e, HighlightError::Panic { .. })
        }),
        (r#"{"Error":"invalid theme","Code":"Invalid_Theme"}"#, |e| {
            matches!(e, HighlightError::UnknownCode { .. })
        }),
        (r#"{"Error":"slow down","Code":"rate_limited"}"#, |e| {
            matches!(e, HighlightError::UnknownCode { error, code, .. }
                if error == "slow down" && code == "rate_limited")
        }),
    ];

    for (body, expected) in cases {
        let (server, handle) = stub(Reply::Send { status: 200, body }).await;

        let err = client(server.as_str())
            .highlight(&Context::background(), &rust_query())
            .await
            .unwrap_err();
        handle.await.unwrap();

        assert!(expected(&err), "{body} produced {err:?}");
        assert_eq!(err.server(), server);
        assert!(err.to_string().contains(&server));
    }
}

#[tokio::test]
async fn malformed_body_is_protocol_error() {
    let (server, handle) = stub(Reply::Send {
        status: 200,
        body: "<html>gateway timeout</html>",
    })
    .await;

    let err = client(server.as_str())
        .highlight(&Context::background(), &rust_query())
        .await
        .unwrap_err();
    handle.await.unwrap();

    match &err {
        HighlightError::Protocol { url, .. } => assert_eq!(url, &format!("{server}/")),
        other => panic!("expected protocol error, got {other:?}"),
    }
    assert!(!err.is_cancelled());
}

#[tokio::test]
async fn cancel_aborts_in_flight_request() {
    let (server, handle) = stub(Reply::Hang).await;

    let token = CancellationToken::new();
    let ctx = Context::background().with_cancel(token.clone());
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
    });

    let err = tokio::time::timeout(
        Duration::from_secs(5),
        client(server).highlight(&ctx, &rust_query()),
    )
    .await
    .expect("cancellation did not abort the request")
    .unwrap_err();
    handle.abort();

    assert!(matches!(err, HighlightError::Cancelled { .. }));
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn already_cancelled_never_succeeds() {
    let (server, handle) = stub(Reply::Send {
        status: 200,
        body: r#"{"Data":"<pre/>","detected_language":"Rust"}"#,
    })
    .await;

    let token = CancellationToken::new();
    token.cancel();
    let ctx = Context::background().with_cancel(token);

    let err = client(server)
        .highlight(&ctx, &rust_query())
        .await
        .unwrap_err();
    handle.abort();

    assert!(matches!(err, HighlightError::Cancelled { .. }));
}

#[tokio::test]
async fn deadline_exceeded() {
    let (server, handle) = stub(Reply::Hang).await;
    let ctx = Context::background().with_timeout(Duration::from_millis(100));

    let err = client(server)
        .highlight(&ctx, &rust_query())
        .await
        .unwrap_err();
    handle.abort();

    assert!(matches!(err, HighlightError::DeadlineExceeded { .. }));
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let server = format!("http://{addr}");
    let err = client(server.as_str())
        .highlight(&Context::background(), &rust_query())
        .await
        .unwrap_err();

    assert!(matches!(err, HighlightError::Transport { .. }));
    assert_eq!(err.server(), server);
    assert!(!err.is_cancelled());
}

/// Fields recorded on `Highlight` spans after the span was opened.
#[derive(Clone, Default)]
struct LateFields(Arc<Mutex<Vec<String>>>);

impl LateFields {
    fn names(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }
}

impl<S> Layer<S> for LateFields
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_record(&self, id: &Id, values: &Record<'_>, ctx: LayerContext<'_, S>) {
        if ctx.span(id).is_none_or(|span| span.name() != "Highlight") {
            return;
        }
        let mut names = FieldNames::default();
        values.record(&mut names);
        self.0.lock().unwrap().extend(names.0);
    }
}

#[derive(Default)]
struct FieldNames(Vec<String>);

impl Visit for FieldNames {
    fn record_debug(&mut self, field: &Field, _value: &dyn fmt::Debug) {
        self.0.push(field.name().to_string());
    }
}

#[tokio::test]
async fn span_tagged_only_after_accepted_response() {
    let fields = LateFields::default();
    let _guard =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(fields.clone()));

    let (server, handle) = stub(Reply::Send {
        status: 400,
        body: r#"{"Error":"too big","Code":"too_large"}"#,
    })
    .await;
    let err = client(server)
        .highlight(&Context::background(), &rust_query())
        .await
        .unwrap_err();
    handle.await.unwrap();

    assert!(matches!(err, HighlightError::RequestTooLarge { .. }));
    assert!(fields.names().is_empty(), "tagged on 400: {:?}", fields.names());

    let (server, handle) = stub(Reply::Send {
        status: 200,
        body: r#"{"Data":"<pre/>","detected_language":"Rust"}"#,
    })
    .await;
    client(server)
        .highlight(&Context::background(), &rust_query())
        .await
        .unwrap();
    handle.await.unwrap();

    assert_eq!(fields.names(), vec!["filepath", "theme"]);
}
