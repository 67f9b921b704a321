//! Download and chat commands against mocked HTTP servers.

use std::collections::BTreeMap;

use baggage_cli::{ChatOutcome, chat_loop, download_all};
use baggage_retrieval::{
    DownloadConfig, EmbeddingProviderType, RagConfig, RetrievalOrchestrator, build_index,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn download_config(server: &MockServer, pages: &[&str]) -> DownloadConfig {
    let urls: BTreeMap<String, String> = pages
        .iter()
        .map(|page| (format!("{page}.html"), format!("{}/{page}", server.uri())))
        .collect();
    DownloadConfig {
        urls,
        timeout_secs: 5,
        ..DownloadConfig::default()
    }
}

#[tokio::test]
async fn download_saves_pages_and_reports_failures() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fees"))
        .and(header("accept-language", "en-US,en;q=0.5"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<p>Bag fees are $35.</p>"))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = download_config(&server, &["fees", "gone"]);
    let target = dir.path().join("raw");
    let summary = download_all(&config, &target).await.unwrap();

    assert_eq!(summary.total(), 2);
    assert_eq!(summary.saved, vec![target.join("fees.html")]);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].0, "gone.html");
    assert!(summary.is_partial());
    assert_eq!(
        std::fs::read_to_string(target.join("fees.html")).unwrap(),
        "<p>Bag fees are $35.</p>"
    );

    let requests = server.received_requests().await.unwrap();
    let user_agent = requests[0].headers.get("user-agent").unwrap();
    assert!(user_agent.to_str().unwrap().contains("Chrome/120"));
}

#[tokio::test]
async fn download_fails_when_nothing_is_fetched() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let config = download_config(&server, &["a", "b"]);
    let err = download_all(&config, dir.path()).await.unwrap_err();

    assert!(err.to_string().contains("no policy pages could be downloaded"));
}

async fn assistant(dir: &TempDir, server: &MockServer) -> RetrievalOrchestrator {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "models": [{ "name": "llama3.2:1b" }] })),
        )
        .mount(server)
        .await;

    let mut config = RagConfig::default();
    config.documents.dir = dir.path().join("raw");
    config.index.dir = dir.path().join("index");
    config.embedding.provider = EmbeddingProviderType::Hashing;
    config.server.base_url = server.uri();
    config.server.manage_process = false;
    std::fs::create_dir_all(&config.documents.dir).unwrap();
    std::fs::write(
        config.documents.dir.join("checked_bag_fees.txt"),
        "The first checked bag fee is $35 for each direction of travel on domestic flights.",
    )
    .unwrap();

    let provider = config.embedding_provider().unwrap();
    build_index(&config, provider.as_ref()).await.unwrap();
    let assistant = RetrievalOrchestrator::from_config(&config).unwrap();
    assistant.start().await.unwrap();
    assistant
}

fn chat_reply(text: &str) -> ResponseTemplate {
    let body = format!(
        "{}\n{}\n",
        serde_json::json!({ "message": { "content": text }, "done": false }),
        serde_json::json!({ "message": { "content": "" }, "done": true }),
    );
    ResponseTemplate::new(200).set_body_string(body)
}

#[tokio::test]
async fn chat_answers_until_quit() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let assistant = assistant(&dir, &server).await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(chat_reply("Bags are $35."))
        .expect(1)
        .mount(&server)
        .await;

    let input: &[u8] = b"How much is a checked bag?\n\n   \nBye\nnever asked\n";
    let mut output = Vec::new();
    let outcome = chat_loop(&assistant, input, &mut output).await.unwrap();

    assert_eq!(outcome, ChatOutcome::Quit);
    let transcript = String::from_utf8(output).unwrap();
    assert_eq!(transcript.matches("Assistant: Bags are $35.").count(), 1);
    assert!(!transcript.contains("never asked"));
}

#[tokio::test]
async fn chat_ends_with_input() {
    let dir = TempDir::new().unwrap();
    let server = MockServer::start().await;
    let assistant = assistant(&dir, &server).await;

    let input: &[u8] = b"";
    let mut output = Vec::new();
    let outcome = chat_loop(&assistant, input, &mut output).await.unwrap();

    assert_eq!(outcome, ChatOutcome::EndOfInput);
    assert!(String::from_utf8(output).unwrap().contains("You: "));
}
