//! Demo command - sends the greeting chain inside a transaction

use std::sync::Arc;

use async_trait::async_trait;
use clap::Args;
use serde::Serialize;
use sqlx::postgres::PgPool;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::domain::{
    ChainError, ChainOutput, Dispatcher, DispatcherExt, MediatorChain, Request,
    TransactionalSender,
};
use crate::infrastructure::dispatcher::{HandlerRegistry, RequestHandler};
use crate::infrastructure::logging;
use crate::infrastructure::transaction::{
    connect_pool, send_in_new_transaction_with, InMemoryTransaction, PostgresChainTransaction,
};

/// Arguments for the demo command
#[derive(Args, Clone, Debug, Default)]
pub struct DemoArgs {
    /// Make the first handler report a failed greeting
    #[arg(long)]
    pub fail_first: bool,

    /// Stop the chain once the greeting mentions "World"
    #[arg(long)]
    pub guard: bool,

    /// Run inside a PostgreSQL transaction (requires APP__DATABASE__URL)
    #[arg(long)]
    pub postgres: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Opens the greeting
#[derive(Debug, Clone)]
pub struct Greet {
    pub word: String,
}

impl Request for Greet {
    type Response = Result<String, String>;
}

/// Appends a word to the greeting
#[derive(Debug, Clone)]
pub struct Append {
    pub text: String,
    pub word: String,
}

impl Request for Append {
    type Response = String;
}

/// Create the table the Postgres demo writes greetings into
pub async fn ensure_demo_table(pool: &PgPool) -> Result<(), ChainError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mediator_chain_demo (
            id BIGSERIAL PRIMARY KEY,
            run TEXT NOT NULL,
            entry TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(pool)
    .await
    .map_err(|e| ChainError::storage(format!("Failed to create demo table: {}", e)))?;

    Ok(())
}

/// Greetings of one run that were committed, in insertion order
async fn committed_entries(pool: &PgPool, run: &str) -> Result<Vec<String>, ChainError> {
    sqlx::query_scalar::<_, String>(
        "SELECT entry FROM mediator_chain_demo WHERE run = $1 ORDER BY id",
    )
    .bind(run)
    .fetch_all(pool)
    .await
    .map_err(|e| ChainError::storage(format!("Failed to read demo entries: {}", e)))
}

/// Where the demo handlers record their work
#[derive(Debug, Clone)]
pub enum DemoStore {
    Memory(InMemoryTransaction),
    Postgres {
        transaction: PostgresChainTransaction,
        run: String,
    },
}

impl DemoStore {
    async fn record(&self, entry: &str) -> Result<(), ChainError> {
        match self {
            Self::Memory(transaction) => transaction.write(entry),
            Self::Postgres { transaction, run } => {
                let mut connection = transaction.connection().await?;

                sqlx::query("INSERT INTO mediator_chain_demo (run, entry) VALUES ($1, $2)")
                    .bind(run.as_str())
                    .bind(entry)
                    .execute(&mut *connection)
                    .await
                    .map_err(|e| ChainError::storage(format!("Failed to record entry: {}", e)))?;

                Ok(())
            }
        }
    }
}

struct AppendHandler {
    store: DemoStore,
}

#[async_trait]
impl RequestHandler<Append> for AppendHandler {
    async fn handle(
        &self,
        request: Append,
        cancel: &CancellationToken,
    ) -> Result<String, ChainError> {
        if cancel.is_cancelled() {
            return Err(ChainError::Cancelled);
        }

        let text = format!("{} {}", request.text, request.word);
        self.store.record(&text).await?;

        Ok(text)
    }
}

/// What the demo chain did
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct DemoReport {
    pub result: Option<String>,
    pub failed: bool,
    pub halted_at: Option<usize>,
    pub dispatched: usize,
    /// Writes that survived the send
    pub writes: Vec<String>,
    pub events: Vec<String>,
}

impl DemoReport {
    fn from_output(output: &ChainOutput) -> Self {
        let result = output.value().and_then(|value| {
            value.downcast_ref::<String>().cloned().or_else(|| {
                value
                    .downcast_ref::<Result<String, String>>()
                    .map(|greeting| match greeting {
                        Ok(text) => text.clone(),
                        Err(reason) => format!("error: {}", reason),
                    })
            })
        });

        Self {
            result,
            failed: output.is_failed(),
            halted_at: output.halt().map(|halt| halt.step()),
            dispatched: output.dispatched(),
            ..Default::default()
        }
    }
}

async fn registry(args: &DemoArgs, store: DemoStore) -> Arc<dyn Dispatcher> {
    let registry = HandlerRegistry::new();
    let fail_first = args.fail_first;

    registry
        .register_fn(move |request: Greet, _| async move {
            if fail_first {
                Ok(Err("greeting refused".to_string()))
            } else {
                Ok(Ok(request.word))
            }
        })
        .await;
    registry
        .register::<Append, _>(AppendHandler { store })
        .await;

    Arc::new(registry)
}

/// "Hello" -> "Hello World" -> "Hello World Again", recording into `store`
pub async fn greeting_chain(args: &DemoArgs, store: DemoStore) -> MediatorChain<String> {
    let dispatcher = registry(args, store).await;
    let guard = args.guard;

    dispatcher
        .chain()
        .add(Greet {
            word: "Hello".to_string(),
        })
        .add_with(|greeting: Result<String, String>| Append {
            text: greeting.unwrap_or_default(),
            word: "World".to_string(),
        })
        .fail_when(move |text| guard && text.contains("World"))
        .add_with(|text: String| Append {
            text,
            word: "Again".to_string(),
        })
}

/// Send the greeting chain inside an in-memory transaction
pub async fn send_greeting(
    args: &DemoArgs,
    transaction: &InMemoryTransaction,
    sender: &TransactionalSender,
    cancel: &CancellationToken,
) -> Result<DemoReport, ChainError> {
    let chain = greeting_chain(args, DemoStore::Memory(transaction.clone())).await;

    let output = sender.send_untyped(&chain, transaction, cancel).await?;

    let mut report = DemoReport::from_output(&output);
    report.writes = transaction.writes()?;
    report.events = transaction
        .events()?
        .iter()
        .map(|event| format!("{:?}", event))
        .collect();

    Ok(report)
}

/// Send the greeting chain inside a new PostgreSQL transaction
///
/// Greetings are inserted into `mediator_chain_demo` under a fresh run id;
/// only committed rows are reported as writes.
pub async fn send_greeting_postgres(
    args: &DemoArgs,
    pool: &PgPool,
    sender: &TransactionalSender,
    cancel: &CancellationToken,
) -> Result<DemoReport, ChainError> {
    ensure_demo_table(pool).await?;

    let run = Uuid::new_v4().to_string();
    let store_run = run.clone();

    let output = send_in_new_transaction_with(pool, sender, cancel, move |transaction| async move {
        let store = DemoStore::Postgres {
            transaction,
            run: store_run,
        };

        Ok::<_, ChainError>(greeting_chain(args, store).await)
    })
    .await?;

    let mut report = DemoReport::from_output(&output);
    report.writes = committed_entries(pool, &run).await?;

    Ok(report)
}

/// Run the demo command
pub async fn run(args: DemoArgs) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_default();
    logging::init_logging(&config.logging)?;

    let sender = TransactionalSender::from_config(&config.chain);
    let cancel = CancellationToken::new();

    let report = if args.postgres {
        if config.database.url.is_none() {
            anyhow::bail!("--postgres requires APP__DATABASE__URL");
        }

        let pool = connect_pool(&config.database).await?;
        send_greeting_postgres(&args, &pool, &sender, &cancel).await?
    } else {
        let transaction = InMemoryTransaction::new();
        send_greeting(&args, &transaction, &sender, &cancel).await?
    };

    info!(failed = report.failed, dispatched = report.dispatched, "Demo finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &DemoReport) {
    println!("Result:     {}", report.result.as_deref().unwrap_or("<none>"));
    println!("Failed:     {}", report.failed);

    if let Some(step) = report.halted_at {
        println!("Halted at:  step {}", step);
    }

    println!("Dispatched: {}", report.dispatched);

    for write in &report.writes {
        println!("Write:      {}", write);
    }

    for event in &report.events {
        println!("Event:      {}", event);
    }
}
