//! Command-line walkthrough of a Task Lists session.
//!
//! Runs against the in-memory document store: signs the configured user in,
//! waits for the welcome list, then exercises lists, nested subtasks, due
//! dates, and AI suggestions before printing the result.

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tasklists::{AppConfig, IconSource, ListsEnvironment, TaskBoard, connect};
use tasklists_assistant::{AnthropicClient, ClaudeAssistant, OfflineAssistant};
use tasklists_core::environment::{IconGenerator, SystemClock, TaskSuggester, UuidGenerator};
use tasklists_core::ids::ListId;
use tasklists_core::model::{ListView, Task};
use tasklists_sync::{DocumentSync, InMemoryDocumentStore, WELCOME_LIST_NAME};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env().context("loading configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter)))
        .with(tracing_subscriber::fmt::layer())
        .init();
    tracing::debug!(?config, "Configuration loaded");

    let (icons, suggester) = assistants(&config);

    let sync = Arc::new(DocumentSync::new(
        Arc::new(InMemoryDocumentStore::new()),
        config.retry_policy(),
    ));
    let env = ListsEnvironment::new(
        Arc::new(SystemClock),
        Arc::new(UuidGenerator),
        sync.clone(),
        icons,
        suggester,
    )
    .with_auto_add_suggestions(config.auto_add_suggestions);
    let board = TaskBoard::new(env);

    println!("=== Task Lists ===\n");
    let session = connect(&board, sync, config.user_id.clone()).await?;
    let welcome = wait_for_list(&board, WELCOME_LIST_NAME).await?;
    println!("Signed in as {}; found \"{}\"", session.user(), welcome.list.name);

    board.create_list("Trip to Lisbon", IconSource::Generate).await?.wait().await;
    let trip = wait_for_list(&board, "Trip to Lisbon").await?;
    let trip_id = trip.list.id.clone();

    board.add_task(&trip_id, "Book flights").await?.wait().await;
    board.add_task(&trip_id, "Find a hotel").await?.wait().await;
    let flights = first_task(&board, &trip_id).await.context("task was not added")?;
    board.add_subtask(&trip_id, &flights.id, "Compare prices").await?.wait().await;
    board.toggle_complete(&trip_id, &flights.id).await?.wait().await;
    board
        .set_task_due_date(&trip_id, &flights.id, Some(chrono::Utc::now() + chrono::Duration::days(7)))
        .await?
        .wait()
        .await;

    println!("\nAsking for suggestions...");
    board.suggest_tasks(&trip_id).await?.wait().await;
    let suggestions = board.suggestions(&trip_id).await;
    if suggestions.is_empty() {
        println!("  (none)");
    }
    for suggestion in &suggestions {
        println!("  + {suggestion}");
    }
    if let Some(first) = suggestions.first() {
        board.accept_suggestion(&trip_id, first).await?.wait().await;
    }

    println!();
    for view in board.lists().await {
        print_view(&view);
    }

    for notice in board.notices().await {
        println!("[{:?}] {}", notice.level, notice.message);
    }

    session.close();
    board
        .store()
        .shutdown(Duration::from_secs(5))
        .await
        .context("shutting down")?;
    Ok(())
}

fn assistants(config: &AppConfig) -> (Arc<dyn IconGenerator>, Arc<dyn TaskSuggester>) {
    let Some(key) = &config.api_key else {
        tracing::info!("ANTHROPIC_API_KEY not set, AI features use their fallbacks");
        return (Arc::new(OfflineAssistant), Arc::new(OfflineAssistant));
    };
    let assistant = Arc::new(
        ClaudeAssistant::new(AnthropicClient::new(key.clone()))
            .with_model(config.model.clone())
            .with_max_tokens(config.max_tokens),
    );
    let icons: Arc<dyn IconGenerator> = assistant.clone();
    (icons, assistant)
}

async fn wait_for_list(board: &TaskBoard, name: &str) -> anyhow::Result<ListView> {
    let lookup = async {
        loop {
            if let Some(view) = board.lists().await.into_iter().find(|v| !v.synthetic && v.list.name == name) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(5), lookup)
        .await
        .with_context(|| format!("list \"{name}\" never appeared"))
}

async fn first_task(board: &TaskBoard, list_id: &ListId) -> Option<Task> {
    let view = board.list(list_id).await?;
    view.tasks.iter().next().map(|task| (**task).clone())
}

fn print_view(view: &ListView) {
    let counts = tasklists_core::aggregate::TaskCounts::of(&view.tasks);
    println!(
        "{} ({}/{} done, {:.0}%)",
        view.list.name,
        counts.completed,
        counts.total,
        counts.completion_percentage()
    );
    for task in view.tasks.iter() {
        print_task(task, 1);
    }
}

fn print_task(task: &Task, depth: usize) {
    let status = if task.completed { "✓" } else { " " };
    let due = task
        .due_date
        .map(|due| format!(" (due {})", due.format("%Y-%m-%d")))
        .unwrap_or_default();
    println!("{}[{status}] {}{due}", "  ".repeat(depth), task.text);
    for child in task.subtasks.iter() {
        print_task(child, depth + 1);
    }
}
