use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::json;

use runcomfy_rs::{Deployment, Override, QueueStatus, ResultStatus};

// Node ids are relative to the saved workflow, export the API workflow to
// retrieve them.
const PROMPT_NODE_ID: &str = "31";
const SEED_NODE_ID: &str = "27";

#[derive(Debug, Deserialize)]
struct AppConfig {
    runcomfy_api_token: String,
    runcomfy_deployment_id: String,
    prompt: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    env_logger::init();

    let config = config::Config::builder()
        .add_source(config::Environment::with_prefix("app").try_parsing(true))
        .build()?;
    let config: AppConfig = config.try_deserialize()?;

    let deployment = Deployment::link(runcomfy_rs::Config {
        api_token: config.runcomfy_api_token,
        deployment_id: config.runcomfy_deployment_id,
        ..Default::default()
    })?;

    let request_id = deployment
        .start(vec![
            Override {
                node_id: PROMPT_NODE_ID.into(),
                inputs: HashMap::from([("value".to_string(), json!(config.prompt))]),
            },
            Override {
                node_id: SEED_NODE_ID.into(),
                inputs: HashMap::from([("value".to_string(), json!(rand::random::<i64>()))]),
            },
        ])
        .await?;
    println!("Job sent: {request_id}");

    let mut start = Instant::now();
    let mut queued = true;
    // ideally half of a single run duration once the deployment is warm
    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    ticker.tick().await; // the first tick is immediate

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("Cancelling request");
                let outcome = deployment.cancel(&request_id).await?;
                println!("Cancel request status: {outcome:?}");
            }
            _ = ticker.tick() => {
                let status = deployment.status(&request_id).await?;
                match status.status {
                    QueueStatus::InQueue => println!("in queue: {}", status.queue_position),
                    QueueStatus::InProgress => {
                        if queued {
                            println!("started! (queued for {:?})", start.elapsed());
                            queued = false;
                            start = Instant::now();
                        } else {
                            println!("still in progress");
                        }
                    }
                    QueueStatus::Completed => {
                        let result = deployment.result(&request_id).await?;
                        match result.status {
                            ResultStatus::Succeeded => {
                                println!("Done (generation took {:?}, not counting wait time):", start.elapsed());
                                for image in result.outputs.extract_images() {
                                    let data = deployment.download(&image.url).await?;
                                    tokio::fs::write(&image.filename, &data).await?;
                                    println!("\t{}", image.filename);
                                }
                            }
                            ResultStatus::Failed => println!("Job failed: {:?}", result.errors),
                            // only reachable when the result is fetched
                            // without checking the status first
                            ResultStatus::Canceled
                            | ResultStatus::InQueue
                            | ResultStatus::InProgress => {}
                        }
                        return Ok(());
                    }
                    QueueStatus::Canceled => {
                        println!("canceled");
                        return Ok(());
                    }
                }
            }
        }
    }
}
