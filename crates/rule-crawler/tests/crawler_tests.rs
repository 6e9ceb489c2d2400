use rule_crawler::{Crawler, CrawlerError, ErrorKind, RequestBody, RequestOptions, Rule};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PROFILE: &str = r#"
    <html>
    <head><title>Profile</title></head>
    <body>
        <div class="card">
            <span class="author fn">Alice</span>
            <a class="home" href="/alice">Home</a>
        </div>
        <ul class="repos">
            <li data-stars="12">parser</li>
            <li data-stars="7">crawler</li>
            <li data-stars="0">notes</li>
        </ul>
    </body>
    </html>
"#;

async fn serve(status: u16, route: &str, body: &str) -> MockServer {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&mock_server)
        .await;

    mock_server
}

#[tokio::test]
async fn test_fetch_response_accepts_any_status_by_default() {
    let mock_server = serve(404, "/missing", "nothing here").await;
    let crawler = Crawler::new().unwrap();
    let url = format!("{}/missing", mock_server.uri());

    let response = crawler.fetch_response(url.as_str(), false).await.unwrap();
    assert_eq!(response.status_code(), 404);
    assert_eq!(response.text(), "nothing here");

    let err = crawler.fetch_response(url.as_str(), true).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.to_string(), "404 Not Found");
}

#[tokio::test]
async fn test_fetch_response_sends_full_options() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api"))
        .and(query_param("page", "2"))
        .and(header("x-token", "abc"))
        .and(body_json(json!({ "name": "crawler" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 7 })))
        .mount(&mock_server)
        .await;

    let options = RequestOptions::get(format!("{}/api", mock_server.uri()))
        .with_method("post")
        .with_query("page", "2")
        .with_header("x-token", "abc")
        .with_body(RequestBody::Json(json!({ "name": "crawler" })));

    let crawler = Crawler::new().unwrap();
    let response = crawler.fetch_response(options, true).await.unwrap();
    let body: serde_json::Value = response.json().unwrap();
    assert_eq!(body, json!({ "id": 7 }));
}

#[tokio::test]
async fn test_empty_options_fail_before_io() {
    let crawler = Crawler::new().unwrap();

    let err = crawler.fetch_response("", false).await.unwrap_err();
    assert!(matches!(err, CrawlerError::Config(_)));

    let err = crawler.fetch_and_extract("", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn test_fetch_to_file_writes_body() {
    let body = "x".repeat(64 * 1024);
    let mock_server = serve(200, "/file.bin", &body).await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("file.bin");

    let crawler = Crawler::new().unwrap();
    let size = crawler
        .fetch_to_file(format!("{}/file.bin", mock_server.uri()), &target)
        .await
        .unwrap();

    assert_eq!(size, body.len() as u64);
    assert_eq!(std::fs::read_to_string(&target).unwrap(), body);
}

#[tokio::test]
async fn test_fetch_to_file_rejects_non_200() {
    let mock_server = serve(500, "/broken", "oops").await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("broken.txt");

    let crawler = Crawler::new().unwrap();
    let err = crawler
        .fetch_to_file(format!("{}/broken", mock_server.uri()), &target)
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlerError::Status { status: 500, .. }));
    assert!(!target.exists());
}

#[tokio::test]
async fn test_fetch_to_file_requires_path() {
    let crawler = Crawler::new().unwrap();
    let err = crawler.fetch_to_file("http://127.0.0.1:9/never", "").await.unwrap_err();
    assert!(matches!(err, CrawlerError::Config(_)));
}

#[tokio::test]
async fn test_fetch_to_file_reports_io_errors() {
    let mock_server = serve(200, "/file.txt", "content").await;
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("no-such-dir").join("file.txt");

    let crawler = Crawler::new().unwrap();
    let err = crawler
        .fetch_to_file(format!("{}/file.txt", mock_server.uri()), &target)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Io);
}

#[tokio::test]
async fn test_fetch_and_extract_find_one() {
    let mock_server = serve(200, "/alice", PROFILE).await;
    let crawler = Crawler::new().unwrap();
    let rule: Rule = r#"{ "_": ["findOne", "span.author.fn", { "_": "text" }] }"#.parse().unwrap();

    let result = crawler
        .fetch_and_extract(format!("{}/alice", mock_server.uri()), Some(&rule))
        .await
        .unwrap();

    assert_eq!(result, json!("Alice"));
}

#[tokio::test]
async fn test_fetch_and_extract_object_rule() {
    let mock_server = serve(200, "/alice", PROFILE).await;
    let crawler = Crawler::new().unwrap();
    let rule = Rule::from_value(&json!({
        "title": ["findOne", "title", { "_": "text" }],
        "home": ["findOne", "a.home", { "_": ["prop", "href"] }],
        "repos": ["find", "ul.repos li", {
            "name": "text",
            "stars": ["data", "stars"]
        }],
        "missing": ["findOne", "table", { "_": "text" }],
        "none": ["find", "table tr", { "_": "text" }]
    }));

    let result = crawler
        .fetch_and_extract(format!("{}/alice", mock_server.uri()), Some(&rule))
        .await
        .unwrap();

    assert_eq!(
        result,
        json!({
            "title": "Profile",
            "home": format!("{}/alice", mock_server.uri()),
            "repos": [
                { "name": "parser", "stars": 12 },
                { "name": "crawler", "stars": 7 },
                { "name": "notes", "stars": 0 }
            ],
            "missing": null,
            "none": []
        })
    );
}

#[tokio::test]
async fn test_fetch_and_extract_defaults_to_document_html() {
    let mock_server = serve(200, "/page", "<p>Hello</p>").await;
    let crawler = Crawler::new().unwrap();
    let url = format!("{}/page", mock_server.uri());

    let implicit = crawler.fetch_and_extract(url.as_str(), None).await.unwrap();
    let explicit = crawler
        .fetch_and_extract(url.as_str(), Some(&Rule::html()))
        .await
        .unwrap();

    assert_eq!(implicit, explicit);
    assert!(implicit.as_str().unwrap().contains("<p>Hello</p>"));
}

#[tokio::test]
async fn test_fetch_and_extract_rejects_non_200() {
    let mock_server = serve(503, "/down", "<p>maintenance</p>").await;
    let crawler = Crawler::new().unwrap();

    let err = crawler
        .fetch_and_extract(format!("{}/down", mock_server.uri()), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CrawlerError::Status { status: 503, .. }));
}

#[tokio::test]
async fn test_request_options_from_json() {
    let mock_server = serve(200, "/list", "<ul><li>a</li><li>b</li><li>c</li></ul>").await;
    let crawler = Crawler::new().unwrap();

    let options: RequestOptions = serde_json::from_value(json!({
        "url": format!("{}/list", mock_server.uri()),
        "headers": { "User-Agent": "rule-crawler-tests" }
    }))
    .unwrap();
    let rule: Rule = serde_json::from_value(json!({ "items": ["find", "li", { "_": "text" }] })).unwrap();

    let result = crawler.fetch_and_extract(options, Some(&rule)).await.unwrap();
    assert_eq!(result, json!({ "items": ["a", "b", "c"] }));
}
