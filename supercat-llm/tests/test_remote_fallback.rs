use anyhow::{anyhow, Result};
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use supercat_core::{
    BatchClassifier, CategoryLabel, Classifier, DiagnosticKind, Provenance, TransactionRecord,
};
use supercat_llm::{CompletionBackend, HttpBackend, LlmSettings, Provider, RemoteClassifier};

/// Answers by keyword and counts calls, standing in for the hosted model.
struct ScriptedModel {
    calls: AtomicUsize,
}

impl CompletionBackend for ScriptedModel {
    fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert!(system.contains("only the category name"));
        if prompt.contains("- Type: topup") {
            Ok("Income_Receipts".to_string())
        } else if prompt.contains("NETFLIX") {
            Ok("Lifestyle_Spending".to_string())
        } else if prompt.contains("GARBLED") {
            Ok("NotACategory".to_string())
        } else if prompt.contains("SLOW") {
            Err(anyhow!("openai timed out after 30s"))
        } else {
            Ok("Other".to_string())
        }
    }
}

#[test]
fn test_invalid_answer_defaults_with_validation_diagnostic() {
    let c = RemoteClassifier::new(ScriptedModel { calls: AtomicUsize::new(0) });
    let r = c.classify("GARBLED", "", "card payment");
    assert_eq!(r.label, CategoryLabel::Other);
    let d = r.diagnostic().unwrap();
    assert_eq!(d.kind, DiagnosticKind::InvalidResponse);
    assert_eq!(d.detail, "NotACategory");
}

#[test]
fn test_simulated_timeout_defaults_with_failure_diagnostic() {
    let c = RemoteClassifier::new(ScriptedModel { calls: AtomicUsize::new(0) });
    let r = c.classify("SLOW", "", "card payment");
    assert_eq!(r.label, CategoryLabel::Other);
    assert_eq!(r.diagnostic().unwrap().kind, DiagnosticKind::RequestFailed);
    assert!(r.diagnostic().unwrap().detail.contains("timed out"));
}

#[test]
fn test_panicking_backend_is_contained() {
    struct Exploding;
    impl CompletionBackend for Exploding {
        fn complete(&self, _: &str, _: &str) -> Result<String> {
            panic!("socket closed mid-read");
        }
    }
    let r = RemoteClassifier::new(Exploding).classify("x", "y", "z");
    assert_eq!(r.label, CategoryLabel::Other);
    let d = r.diagnostic().unwrap();
    assert_eq!(d.kind, DiagnosticKind::RequestFailed);
    assert!(d.detail.contains("socket closed mid-read"));
}

#[test]
fn test_batch_calls_model_once_per_fingerprint() {
    let model = ScriptedModel { calls: AtomicUsize::new(0) };
    let c = RemoteClassifier::new(model);
    let records = vec![
        TransactionRecord::new("SALARY", "", "topup"),
        TransactionRecord::new("NETFLIX", "Entertainment", "card payment"),
        TransactionRecord::new("GARBLED", "", "card payment"),
        TransactionRecord::new("NETFLIX", "Entertainment", "card payment"),
        TransactionRecord::new("SALARY", "", "topup"),
        TransactionRecord::new("GARBLED", "", "card payment"),
    ];

    let out = BatchClassifier::new(&c).with_workers(3).classify(&records);

    assert_eq!(c.backend().calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        out.labels,
        vec![
            CategoryLabel::IncomeReceipts,
            CategoryLabel::LifestyleSpending,
            CategoryLabel::Other,
            CategoryLabel::LifestyleSpending,
            CategoryLabel::IncomeReceipts,
            CategoryLabel::Other,
        ]
    );
    assert_eq!(out.defaulted_count(), 2);
    assert!(out.diagnostics[2].is_some() && out.diagnostics[5].is_some());
}

#[test]
fn test_http_backend_refused_connection() {
    // Bind then drop to get a port nothing listens on.
    let port = {
        let l = TcpListener::bind("127.0.0.1:0").unwrap();
        l.local_addr().unwrap().port()
    };
    let settings = LlmSettings {
        base_url: Some(format!("http://127.0.0.1:{port}")),
        timeout_secs: 5,
        ..LlmSettings::default()
    };
    let backend = HttpBackend::with_api_key(settings, "test-key").unwrap();
    let r = RemoteClassifier::new(backend).classify("CARREFOUR", "Groceries", "card payment");
    assert_eq!(r.label, CategoryLabel::Other);
    assert_eq!(r.diagnostic().unwrap().kind, DiagnosticKind::RequestFailed);
}

#[test]
fn test_http_backend_timeout() {
    // Accepts the connection and never answers.
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        if let Ok((_stream, _)) = listener.accept() {
            thread::sleep(Duration::from_secs(5));
        }
    });

    let settings = LlmSettings {
        provider: Provider::Anthropic,
        base_url: Some(format!("http://127.0.0.1:{port}")),
        timeout_secs: 1,
        ..LlmSettings::for_provider(Provider::Anthropic)
    };
    let backend = HttpBackend::with_api_key(settings, "test-key").unwrap();
    let r = RemoteClassifier::new(backend).classify("SALARY", "", "topup");
    assert_eq!(r.label, CategoryLabel::Other);
    let d = r.diagnostic().unwrap();
    assert_eq!(d.kind, DiagnosticKind::RequestFailed);
    assert_eq!(d.detail, "anthropic timed out after 1s");
    assert!(!matches!(r.provenance, Provenance::Model));
}

/// Serves one request with a 200 JSON `body` from a plain thread, so it
/// keeps answering while a current-thread runtime is blocked.
fn serve_once(body: &'static str) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    thread::spawn(move || {
        let (mut stream, _) = listener.accept().unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
            let len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= end + 4 + len {
                break;
            }
        }
        let resp = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(resp.as_bytes()).unwrap();
    });
    port
}

fn local_backend(provider: Provider, port: u16) -> HttpBackend {
    let settings = LlmSettings {
        base_url: Some(format!("http://127.0.0.1:{port}")),
        timeout_secs: 5,
        ..LlmSettings::for_provider(provider)
    };
    HttpBackend::with_api_key(settings, "test-key").unwrap()
}

#[tokio::test]
async fn test_http_backend_inside_current_thread_runtime() {
    let port = serve_once(r#"{"choices":[{"message":{"content":"Income_Receipts"}}]}"#);
    let c = RemoteClassifier::new(local_backend(Provider::OpenAI, port));

    let r = c.classify("SALARY", "", "topup");
    assert_eq!(r.label, CategoryLabel::IncomeReceipts);
    assert_eq!(r.provenance, Provenance::Model);

    // Dropping the owned runtime from async code must not panic.
    drop(c);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_backend_inside_multi_thread_runtime() {
    let port = serve_once(r#"{"content":[{"type":"text","text":" Essential_Living\n"}]}"#);
    let c = RemoteClassifier::new(local_backend(Provider::Anthropic, port));

    let r = c.classify("CARREFOUR", "Groceries", "card payment");
    assert_eq!(r.label, CategoryLabel::EssentialLiving);
    assert_eq!(r.provenance, Provenance::Model);
    drop(c);
}

#[test]
fn test_http_backend_outside_runtime() {
    let port = serve_once(r#"{"choices":[{"message":{"content":"Lifestyle_Spending"}}]}"#);
    let c = RemoteClassifier::new(local_backend(Provider::OpenAI, port));
    let r = c.classify("NETFLIX", "Entertainment", "card payment");
    assert_eq!(r.label, CategoryLabel::LifestyleSpending);
}
