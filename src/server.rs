use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::eval::Interpreter;
use crate::host::Host;
use crate::lexer::Lexer;
use crate::parser::Parser;

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    code: String,
}

#[derive(Debug, Serialize)]
struct ExecuteResponse {
    resultat: String,
}

/// Point d'entrée HTTP: `POST /executer` avec `{"code": "..."}` exécute la
/// source soumise dans un pipeline frais et répond avec la sortie capturée,
/// ou le texte de l'erreur.
pub async fn serve(addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    eprintln!("fia: serveur à l'écoute sur http://{}", listener.local_addr()?);
    serve_on(listener).await
}

pub async fn serve_on(listener: TcpListener) -> std::io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        tokio::spawn(async move {
            let _ = handle_connection(stream).await;
        });
    }
}

async fn handle_connection(stream: TcpStream) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("").to_string();
    let path = parts.next().unwrap_or("").to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some(value) = line
            .to_ascii_lowercase()
            .strip_prefix("content-length:")
            .map(str::trim)
            .and_then(|v| v.parse::<usize>().ok())
        {
            content_length = value;
        }
    }

    let mut body = vec![0u8; content_length];
    if content_length > 0 {
        reader.read_exact(&mut body).await?;
    }

    let (status, payload) = route(&method, &path, &body);
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{payload}",
        payload.len(),
    );
    let mut stream = reader.into_inner();
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

fn route(method: &str, path: &str, body: &[u8]) -> (&'static str, String) {
    if method != "POST" || path != "/executer" {
        return (
            "404 Not Found",
            "{\"erreur\": \"route inconnue\"}".to_string(),
        );
    }
    let request: ExecuteRequest = match serde_json::from_slice(body) {
        Ok(r) => r,
        Err(_) => {
            return (
                "400 Bad Request",
                "{\"erreur\": \"corps JSON invalide\"}".to_string(),
            )
        }
    };
    let resultat = run_capture(&request.code);
    let payload = serde_json::to_string(&ExecuteResponse { resultat })
        .unwrap_or_else(|_| "{\"erreur\": \"sérialisation\"}".to_string());
    ("200 OK", payload)
}

/// Un pipeline lexer → parser → interprète par requête, sur un hôte
/// capturant. Une erreur remplace la sortie par son message.
fn run_capture(code: &str) -> String {
    let host = Host::capturing();
    let tokens = match Lexer::new(code).tokenize() {
        Ok(t) => t,
        Err(e) => return e.to_string(),
    };
    let program = match Parser::new(tokens).parse_program() {
        Ok(p) => p,
        Err(e) => return e.to_string(),
    };
    let mut interp = Interpreter::new(host.clone());
    match interp.execute(&program) {
        Ok(_) => host.take_output(),
        Err(e) => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_capture_returns_program_output() {
        let out = run_capture("soit x = 40\nimprimer(\"x =\", x + 2)");
        assert_eq!(out, "x = 42\n");
    }

    #[test]
    fn run_capture_reports_errors_as_text() {
        let out = run_capture("y = 1");
        assert!(out.contains("non déclarée"));
        let out = run_capture("soit = 3");
        assert!(out.contains("Erreur de syntaxe"));
    }
}
