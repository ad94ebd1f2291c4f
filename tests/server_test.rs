mod common;

use std::sync::Arc;

use candle_core::Device;
use common::KeywordEncoder;
use sentiment_tuner::{DemoServer, Prediction, Sentiment, SentimentClassifier, SentimentHead, ServerConfig};

fn keyword_classifier() -> Arc<SentimentClassifier> {
    // rows: NEGATIVE, POSITIVE over [positive hits, negative hits, 1]
    let head = SentimentHead::from_parameters(
        vec![-1.0, 1.0, 0.0, 1.0, -1.0, 0.0],
        vec![0.0, 0.0],
        3,
        &Device::Cpu,
    )
    .unwrap();
    Arc::new(SentimentClassifier::new(Arc::new(KeywordEncoder::default()), head).unwrap())
}

fn ephemeral_config() -> ServerConfig {
    ServerConfig {
        addr: "127.0.0.1:0".parse().unwrap(),
        ..ServerConfig::default()
    }
}

#[tokio::test]
async fn test_form_round_trip_over_http() -> Result<(), Box<dyn std::error::Error>> {
    let handle = DemoServer::launch(keyword_classifier(), ephemeral_config()).await?;
    let client = reqwest::Client::new();

    let page = client.get(handle.url()).send().await?.text().await?;
    assert!(page.contains("<textarea name=\"text\""));

    let result = client
        .post(handle.url())
        .form(&[("text", "The movie was awesome!!!")])
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    assert!(result.contains("POSITIVE ("), "{}", result);

    handle.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_concurrent_requests_are_all_answered() -> Result<(), Box<dyn std::error::Error>> {
    let handle = DemoServer::launch(keyword_classifier(), ephemeral_config()).await?;
    let url = format!("{}/api/predict", handle.url());
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let client = client.clone();
        let url = url.clone();
        let text = if i % 2 == 0 { "great film" } else { "horrible film" };
        tasks.push(tokio::spawn(async move {
            let prediction: Prediction = client
                .post(url)
                .json(&serde_json::json!({ "text": text }))
                .send()
                .await?
                .json()
                .await?;
            Ok::<_, reqwest::Error>((i, prediction))
        }));
    }

    for task in tasks {
        let (i, prediction) = task.await??;
        let expected = if i % 2 == 0 { Sentiment::Positive } else { Sentiment::Negative };
        assert_eq!(prediction.label, expected);
    }

    handle.close().await?;
    Ok(())
}

#[tokio::test]
async fn test_close_releases_port() -> Result<(), Box<dyn std::error::Error>> {
    let handle = DemoServer::launch(keyword_classifier(), ephemeral_config()).await?;
    let addr = handle.local_addr();
    handle.close().await?;

    let relaunched = DemoServer::launch(
        keyword_classifier(),
        ServerConfig {
            addr,
            ..ServerConfig::default()
        },
    )
    .await?;
    assert_eq!(relaunched.local_addr(), addr);
    relaunched.close().await?;
    Ok(())
}
