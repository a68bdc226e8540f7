use personal_assistant_orchestrator::router::create_default_router;
use personal_assistant_orchestrator::store::JsonStore;
use std::io::{BufRead, Write};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let store = Arc::new(JsonStore::open_default()?);
    info!(data_dir = %store.dir().display(), "Personal Assistant starting");

    let router = create_default_router(store)?;
    let session_id = Uuid::new_v4();

    println!("Personal Assistant ready!");
    println!("Try: 'Add 50 TL for coffee', 'Check my emails', 'Show my projects'");
    println!("Type 'quit' to exit.\n");

    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    let mut line = String::new();

    loop {
        print!("You: ");
        stdout.flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "quit" | "exit" | "q") {
            println!("Goodbye!");
            break;
        }

        let response = router.route(session_id, input).await;
        println!("\nAssistant: {}\n", response);
    }

    Ok(())
}
