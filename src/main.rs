use chrono::{DateTime, Utc};
use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payment_dispatcher::application::admin::AdminService;
use payment_dispatcher::application::dispatcher::Dispatcher;
use payment_dispatcher::application::policy::{
    DEFAULT_BACKOFF_UNIT, DEFAULT_ESCALATION_THRESHOLD, DEFAULT_MAX_RECONCILE_ATTEMPTS,
    DEFAULT_RECONCILE_INTERVAL, DispatchPolicy,
};
use payment_dispatcher::config::{
    DEFAULT_ADMIN_TOKEN, DEFAULT_GATEWAY_TIMEOUT, DEFAULT_MAX_IN_FLIGHT, DEFAULT_QUEUE_CAPACITY,
    DispatcherConfig, GatewayEndpoint,
};
use payment_dispatcher::domain::payment::Route;
use payment_dispatcher::domain::ports::{GatewayRef, RecorderRef};
use payment_dispatcher::domain::summary::SummaryRange;
use payment_dispatcher::infrastructure::http_gateway::HttpPaymentGateway;
use payment_dispatcher::infrastructure::in_memory::InMemoryPaymentRecorder;
use payment_dispatcher::interfaces::csv::intake_reader::PaymentIntakeReader;
use payment_dispatcher::interfaces::csv::summary_writer::SummaryWriter;
use payment_dispatcher::telemetry::init_tracing;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input CSV file with `correlationId,amount` rows
    input: PathBuf,

    /// Base URL of the primary payment processor
    #[arg(long, env = "PRIMARY_PROCESSOR_URL", default_value = "http://localhost:8001")]
    primary_url: String,

    /// Base URL of the fallback payment processor
    #[arg(long, env = "FALLBACK_PROCESSOR_URL", default_value = "http://localhost:8002")]
    fallback_url: String,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long, env = "PAYMENT_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Capacity of each route queue
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    queue_capacity: usize,

    /// Payments dispatched concurrently
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Failed primary attempts tolerated before escalating to the fallback
    #[arg(long, default_value_t = DEFAULT_ESCALATION_THRESHOLD)]
    escalation_threshold: u32,

    /// Linear backoff unit in milliseconds
    #[arg(long, default_value_t = DEFAULT_BACKOFF_UNIT.as_millis() as u64)]
    backoff_ms: u64,

    /// Lookups per reconciliation of a timed-out payment
    #[arg(long, default_value_t = DEFAULT_MAX_RECONCILE_ATTEMPTS)]
    reconcile_attempts: u32,

    /// Pause before each reconciliation lookup, in milliseconds
    #[arg(long, default_value_t = DEFAULT_RECONCILE_INTERVAL.as_millis() as u64)]
    reconcile_interval_ms: u64,

    /// Deadline of a processor payment call, in milliseconds
    #[arg(long, default_value_t = DEFAULT_GATEWAY_TIMEOUT.as_millis() as u64)]
    gateway_timeout_ms: u64,

    /// Token sent with processor purge requests
    #[arg(long, env = "PROCESSOR_ADMIN_TOKEN", default_value = DEFAULT_ADMIN_TOKEN)]
    admin_token: String,

    /// Purge recorded payments and both processors before dispatching
    #[arg(long)]
    purge: bool,

    /// Only summarise payments settled at or after this RFC 3339 instant
    #[arg(long)]
    from: Option<DateTime<Utc>>,

    /// Only summarise payments settled at or before this RFC 3339 instant
    #[arg(long)]
    to: Option<DateTime<Utc>>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: self.queue_capacity,
            max_in_flight: self.max_in_flight,
            policy: DispatchPolicy {
                escalation_threshold: self.escalation_threshold,
                backoff_unit: Duration::from_millis(self.backoff_ms),
                max_reconcile_attempts: self.reconcile_attempts,
                reconcile_interval: Duration::from_millis(self.reconcile_interval_ms),
            },
        }
    }

    fn endpoint(&self, route: Route) -> GatewayEndpoint {
        let url = match route {
            Route::Primary => &self.primary_url,
            Route::Fallback => &self.fallback_url,
        };
        GatewayEndpoint::new(route, url.as_str())
            .with_request_timeout(Duration::from_millis(self.gateway_timeout_ms))
            .with_admin_token(self.admin_token.as_str())
    }
}

fn open_recorder(db_path: Option<PathBuf>) -> Result<RecorderRef> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            use payment_dispatcher::infrastructure::rocksdb::RocksDbPaymentRecorder;
            let recorder = RocksDbPaymentRecorder::open(path).into_diagnostic()?;
            Ok(Arc::new(recorder))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            warn!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Arc::new(InMemoryPaymentRecorder::new()))
        }
        None => Ok(Arc::new(InMemoryPaymentRecorder::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json);

    let config = cli.dispatcher_config();
    let primary: GatewayRef =
        Arc::new(HttpPaymentGateway::new(cli.endpoint(Route::Primary)).into_diagnostic()?);
    let fallback: GatewayRef =
        Arc::new(HttpPaymentGateway::new(cli.endpoint(Route::Fallback)).into_diagnostic()?);
    let recorder = open_recorder(cli.db_path.clone())?;
    let admin = AdminService::new(
        Arc::clone(&recorder),
        Arc::clone(&primary),
        Arc::clone(&fallback),
    );

    if cli.purge {
        let purges = admin.purge().await.into_diagnostic()?;
        for purge in purges {
            if let Err(e) = purge.await {
                error!(error = %e, "Processor purge task panicked");
            }
        }
    }

    let dispatcher = Dispatcher::new(&config, primary, fallback, recorder).into_diagnostic()?;
    let handle = dispatcher.spawn();
    let admission = handle.admission();

    // Admit payments
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = PaymentIntakeReader::new(file);
    for intake in reader.intakes() {
        match intake {
            Ok(intake) => {
                if let Err(e) = admission.admit(intake).await {
                    warn!(error = %e, "Error admitting payment");
                }
            }
            Err(e) => {
                warn!(error = %e, "Error reading payment");
            }
        }
    }

    handle.wait_idle().await;
    let stats = handle.stats();
    info!(
        admitted = stats.admitted,
        settled_primary = stats.settled_primary,
        settled_fallback = stats.settled_fallback,
        dropped = stats.dropped,
        persistence_failures = stats.persistence_failures,
        "All admitted payments reached a terminal state"
    );
    handle.shutdown().await;

    // Output summary
    let summary = admin
        .summary(SummaryRange::new(cli.from, cli.to))
        .await
        .into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = SummaryWriter::new(stdout.lock());
    writer.write_summary(&summary).into_diagnostic()?;

    Ok(())
}
