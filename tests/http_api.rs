use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn start_server() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = fia::server::serve_on(listener).await;
    });
    addr
}

async fn request(addr: std::net::SocketAddr, raw: &str) -> String {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(raw.as_bytes()).await.unwrap();
    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

#[tokio::test]
async fn executer_endpoint_returns_captured_output() {
    let addr = start_server().await;
    let body = serde_json::json!({ "code": "imprimer(\"ok\", 1 + 1)" }).to_string();
    let raw = format!(
        "POST /executer HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let response = request(addr, &raw).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("ok 2\\n"), "{response}");
}

#[tokio::test]
async fn executer_endpoint_reports_errors_in_body() {
    let addr = start_server().await;
    let body = serde_json::json!({ "code": "y = 1" }).to_string();
    let raw = format!(
        "POST /executer HTTP/1.1\r\nHost: {addr}\r\nContent-Length: {}\r\n\r\n{body}",
        body.len()
    );
    let response = request(addr, &raw).await;
    assert!(response.starts_with("HTTP/1.1 200"), "{response}");
    assert!(response.contains("non déclarée"), "{response}");
}

#[tokio::test]
async fn unknown_route_is_rejected() {
    let addr = start_server().await;
    let raw = format!("GET /status HTTP/1.1\r\nHost: {addr}\r\n\r\n");
    let response = request(addr, &raw).await;
    assert!(response.starts_with("HTTP/1.1 404"), "{response}");
}

#[tokio::test]
async fn invalid_json_is_a_bad_request() {
    let addr = start_server().await;
    let raw = format!(
        "POST /executer HTTP/1.1\r\nHost: {addr}\r\nContent-Length: 2\r\n\r\n{{]"
    );
    let response = request(addr, &raw).await;
    assert!(response.starts_with("HTTP/1.1 400"), "{response}");
}
