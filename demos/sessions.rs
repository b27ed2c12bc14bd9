//! Walks through the session lifecycle against a live API.
//!
//! This demo shows how to:
//! - Create a client from the environment
//! - Create a session safely with an idempotency key
//! - Revalidate a cached read with its ETag
//! - Search sessions over GraphQL and handle partial failures
//!
//! Run with: `QUIRE_API_KEY=... cargo run --example sessions -- <project-id>`

use quire::resources::{CreateSession, SearchSessionsInput, UpdateSession};
use quire::{Client, DebugConfig, Error, ErrorKind};

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quire=info,sessions=info".into()),
        )
        .init();

    let project_id = std::env::args()
        .nth(1)
        .ok_or_else(|| Error::validation("usage: sessions <project-id>"))?;

    let client = Client::builder()
        .debug(DebugConfig::builder().log_requests(false).build())
        .build()?;

    println!("=== Create ===");
    let session = client
        .sessions()
        .create(
            &CreateSession {
                project_id: project_id.clone(),
                title: "Demo session".to_string(),
                content: Some("Created by the quire demo".to_string()),
            },
            Some(format!("demo-{}", project_id).as_str()),
        )
        .await?;
    println!("Created {} in {}", session.id, session.project_id);

    println!("=== Conditional read ===");
    let first = client.sessions().get(&session.id, None).await?;
    let etag = first.as_ref().and_then(|s| s.etag.clone());
    println!("First read etag: {:?}", etag);

    match client.sessions().get(&session.id, etag.as_deref()).await? {
        None => println!("Unchanged since last read"),
        Some(newer) => println!("Changed: {}", newer.data.title),
    }

    println!("=== Update ===");
    let updated = client
        .sessions()
        .update(
            &session.id,
            &UpdateSession {
                status: Some("archived".to_string()),
                ..Default::default()
            },
        )
        .await?;
    println!("Status is now {:?}", updated.status);

    println!("=== Search ===");
    let input = SearchSessionsInput {
        project_id: Some(project_id),
        limit: Some(5),
        ..SearchSessionsInput::new("demo")
    };
    match client.search().search_sessions(&input).await {
        Ok(results) => {
            println!("{} match(es)", results.total);
            for item in results.items {
                println!("  {} {}", item.id, item.title);
            }
        }
        Err(err) => match err.kind() {
            ErrorKind::Graphql { errors, .. } => {
                for item in errors {
                    eprintln!("GraphQL error: {}", item.message);
                }
            }
            _ => return Err(err),
        },
    }

    client.sessions().delete(&session.id).await?;
    if let Some(cache) = client.cache() {
        println!("Cache stats: {:?}", cache.stats());
    }

    Ok(())
}
