use rule_crawler::{Crawler, CrawlerConfig, RequestOptions, Rule, RuleFn};
use serde_json::json;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("=== Rule Crawler Example ===\n");

    raw_response_example().await?;
    extract_example().await?;
    builder_rule_example().await?;
    download_example().await?;

    Ok(())
}

async fn raw_response_example() -> anyhow::Result<()> {
    println!("1. Raw Response");
    println!("---------------");

    let crawler = Crawler::new()?;
    let options = RequestOptions::get("https://api.github.com/repos/rust-lang/rust")
        .with_header("Accept", "application/vnd.github+json");

    match crawler.fetch_response(options, false).await {
        Ok(response) => {
            println!("Status: {} {}", response.status_code(), response.status_text());
            if let Ok(repo) = response.json::<serde_json::Value>() {
                println!("Stars: {}", repo["stargazers_count"]);
            }
        }
        Err(e) => println!("Fetch failed: {}", e),
    }

    println!();
    Ok(())
}

async fn extract_example() -> anyhow::Result<()> {
    println!("2. JSON Rule Extraction");
    println!("-----------------------");

    let crawler = Crawler::new()?;
    let rule = Rule::from_value(&json!({
        "title": ["findOne", "title", { "_": "text" }],
        "links": ["find", "a", {
            "text": "text",
            "href": ["prop", "href"]
        }]
    }));

    match crawler.fetch_and_extract("https://example.com", Some(&rule)).await {
        Ok(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        Err(e) => println!("Extraction failed: {}", e),
    }

    println!();
    Ok(())
}

async fn builder_rule_example() -> anyhow::Result<()> {
    println!("3. Rule Builder With Config");
    println!("---------------------------");

    let config = CrawlerConfig::default()
        .with_timeout(Duration::from_secs(20))
        .with_user_agent("rule-crawler-example/0.1".to_string());
    let crawler = Crawler::with_config(config)?;

    let rule = Rule::single(RuleFn::find_one(
        "h1",
        Rule::new()
            .field("heading", RuleFn::Text)
            .field("markup", RuleFn::Html),
    ));

    match crawler.fetch_and_extract("https://example.com", Some(&rule)).await {
        Ok(result) => println!("{}", result),
        Err(e) => println!("Extraction failed: {}", e),
    }

    println!();
    Ok(())
}

async fn download_example() -> anyhow::Result<()> {
    println!("4. Download To File");
    println!("-------------------");

    let crawler = Crawler::new()?;
    let target = std::env::temp_dir().join("rule-crawler-example.html");

    match crawler.fetch_to_file("https://example.com", &target).await {
        Ok(size) => println!("Wrote {} bytes to {}", size, target.display()),
        Err(e) => println!("Download failed: {}", e),
    }

    println!();
    Ok(())
}
