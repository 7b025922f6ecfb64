#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use axum::extract::{Path as UrlPath, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::Json;
use payment_dispatcher::application::dispatcher::{Dispatcher, DispatcherHandle};
use payment_dispatcher::application::policy::DispatchPolicy;
use payment_dispatcher::config::DispatcherConfig;
use payment_dispatcher::domain::outcome::{
    GatewayOutcome, HealthStatus, LookupOutcome, ProcessorRecord,
};
use payment_dispatcher::domain::payment::{CorrelationId, DispatchPayload, PaymentIntake, Route};
use payment_dispatcher::domain::ports::{
    GatewayRef, PaymentGateway, PaymentRecorder, RecorderRef,
};
use payment_dispatcher::domain::payment::SettledPayment;
use payment_dispatcher::domain::summary::{PaymentSummary, SummaryRange};
use payment_dispatcher::error::{PaymentError, Result};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::fs::File;
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

/// What a simulated processor does with one payment call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Ok,
    Reject,
    Refuse,
    /// Times out without charging.
    Timeout,
    /// Times out after charging; a lookup will find the payment.
    TimeoutCommitted,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub correlation_id: CorrelationId,
    pub at: Instant,
    pub requested_at: String,
}

/// In-process stand-in for an upstream processor with scripted behaviour.
pub struct SimulatedProcessor {
    default_step: Step,
    steps: Mutex<HashMap<CorrelationId, VecDeque<Step>>>,
    lookup_script: Mutex<HashMap<CorrelationId, VecDeque<LookupOutcome>>>,
    committed: Mutex<HashMap<CorrelationId, u32>>,
    calls: Mutex<Vec<Call>>,
    lookups: AtomicU32,
    purges: AtomicU32,
    fail_purge: AtomicBool,
    health: HealthStatus,
}

impl SimulatedProcessor {
    pub fn new(default_step: Step) -> Arc<Self> {
        Arc::new(Self {
            default_step,
            steps: Mutex::new(HashMap::new()),
            lookup_script: Mutex::new(HashMap::new()),
            committed: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            lookups: AtomicU32::new(0),
            purges: AtomicU32::new(0),
            fail_purge: AtomicBool::new(false),
            health: HealthStatus {
                failing: false,
                min_response_time_ms: 5,
            },
        })
    }

    pub fn script(&self, id: CorrelationId, steps: &[Step]) {
        self.steps
            .lock()
            .unwrap()
            .insert(id, steps.iter().copied().collect());
    }

    pub fn script_lookups(&self, id: CorrelationId, answers: Vec<LookupOutcome>) {
        self.lookup_script.lock().unwrap().insert(id, answers.into());
    }

    pub fn fail_purges(&self) {
        self.fail_purge.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, id: &CorrelationId) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| &c.correlation_id == id)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn commits_for(&self, id: &CorrelationId) -> u32 {
        self.committed.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub fn lookup_count(&self) -> u32 {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn purge_count(&self) -> u32 {
        self.purges.load(Ordering::SeqCst)
    }

    fn next_step(&self, id: &CorrelationId) -> Step {
        self.steps
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(|steps| steps.pop_front())
            .unwrap_or(self.default_step)
    }

    fn commit(&self, id: CorrelationId) {
        *self.committed.lock().unwrap().entry(id).or_insert(0) += 1;
    }
}

#[async_trait]
impl PaymentGateway for SimulatedProcessor {
    async fn process(&self, payload: &DispatchPayload) -> GatewayOutcome {
        let id = payload.correlation_id;
        self.calls.lock().unwrap().push(Call {
            correlation_id: id,
            at: Instant::now(),
            requested_at: payload.requested_at.clone(),
        });

        match self.next_step(&id) {
            Step::Ok => {
                self.commit(id);
                GatewayOutcome::Success
            }
            Step::Reject => GatewayOutcome::Rejected(500),
            Step::Refuse => GatewayOutcome::ConnectionError("connection refused".to_string()),
            Step::Timeout => GatewayOutcome::Timeout,
            Step::TimeoutCommitted => {
                self.commit(id);
                GatewayOutcome::Timeout
            }
        }
    }

    async fn get_payment_by_id(&self, id: &CorrelationId) -> LookupOutcome {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(answer) = self
            .lookup_script
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(|answers| answers.pop_front())
        {
            return answer;
        }
        if self.commits_for(id) > 0 {
            LookupOutcome::Found(found_record(*id))
        } else {
            LookupOutcome::NotFound
        }
    }

    async fn health_check(&self) -> Result<HealthStatus> {
        Ok(self.health)
    }

    async fn purge_all(&self) -> Result<()> {
        self.purges.fetch_add(1, Ordering::SeqCst);
        if self.fail_purge.load(Ordering::SeqCst) {
            return Err(PaymentError::UpstreamError("purge refused".to_string()));
        }
        self.committed.lock().unwrap().clear();
        Ok(())
    }
}

pub fn found_record(id: CorrelationId) -> ProcessorRecord {
    ProcessorRecord {
        correlation_id: id.to_string(),
        amount: None,
        requested_at: None,
    }
}

/// Recorder whose every write fails.
#[derive(Default)]
pub struct FailingRecorder {
    pub attempts: AtomicU32,
}

#[async_trait]
impl PaymentRecorder for FailingRecorder {
    async fn insert(&self, _payment: SettledPayment) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PaymentError::PersistenceError("database unavailable".to_string()))
    }

    async fn summary(&self, _range: SummaryRange) -> Result<PaymentSummary> {
        Err(PaymentError::PersistenceError("database unavailable".to_string()))
    }

    async fn purge(&self) -> Result<()> {
        Err(PaymentError::PersistenceError("database unavailable".to_string()))
    }
}

pub fn config() -> DispatcherConfig {
    DispatcherConfig {
        queue_capacity: 64,
        max_in_flight: 4,
        policy: DispatchPolicy::default(),
    }
}

pub fn new_id() -> CorrelationId {
    CorrelationId::new(Uuid::new_v4())
}

pub fn intake(id: CorrelationId, amount: &str) -> PaymentIntake {
    PaymentIntake {
        correlation_id: id.to_string(),
        amount: Decimal::from_str(amount).unwrap(),
    }
}

pub fn start(
    primary: &Arc<SimulatedProcessor>,
    fallback: &Arc<SimulatedProcessor>,
    recorder: RecorderRef,
    config: DispatcherConfig,
) -> DispatcherHandle {
    let primary: GatewayRef = primary.clone();
    let fallback: GatewayRef = fallback.clone();
    Dispatcher::new(&config, primary, fallback, recorder)
        .unwrap()
        .spawn()
}

pub fn generate_csv(path: &Path, rows: usize, amount: &str) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);

    wtr.write_record(["correlationId", "amount"])?;
    for _ in 0..rows {
        wtr.write_record([Uuid::new_v4().to_string().as_str(), amount])?;
    }

    wtr.flush()?;
    Ok(())
}

/// How a stub HTTP processor answers `POST /payments`.
#[derive(Debug, Clone, Copy)]
pub enum StubBehavior {
    Accept,
    Fail(u16),
    Slow(Duration),
}

#[derive(Clone)]
struct StubState {
    behavior: StubBehavior,
    payments: Arc<Mutex<HashMap<String, Value>>>,
    purges: Arc<AtomicU32>,
}

/// A payment processor served over HTTP on an ephemeral local port.
pub struct StubProcessor {
    pub base_url: String,
    pub payments: Arc<Mutex<HashMap<String, Value>>>,
    pub purges: Arc<AtomicU32>,
}

pub async fn spawn_stub_processor(behavior: StubBehavior) -> StubProcessor {
    let state = StubState {
        behavior,
        payments: Arc::new(Mutex::new(HashMap::new())),
        purges: Arc::new(AtomicU32::new(0)),
    };
    let app = Router::new()
        .route("/payments", post(stub_create))
        .route("/payments/service-health", get(stub_health))
        .route("/payments/{id}", get(stub_lookup))
        .route("/admin/purge-payments", post(stub_purge))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubProcessor {
        base_url: format!("http://{}", addr),
        payments: state.payments,
        purges: state.purges,
    }
}

async fn stub_create(State(state): State<StubState>, Json(body): Json<Value>) -> StatusCode {
    match state.behavior {
        StubBehavior::Accept => {}
        StubBehavior::Fail(status) => {
            return StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        }
        StubBehavior::Slow(delay) => tokio::time::sleep(delay).await,
    }
    let id = body["correlationId"].as_str().unwrap_or_default().to_string();
    state.payments.lock().unwrap().insert(id, body);
    StatusCode::OK
}

async fn stub_lookup(
    State(state): State<StubState>,
    UrlPath(id): UrlPath<String>,
) -> std::result::Result<Json<Value>, StatusCode> {
    state
        .payments
        .lock()
        .unwrap()
        .get(&id)
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn stub_health() -> Json<Value> {
    Json(json!({ "failing": false, "minResponseTime": 12 }))
}

async fn stub_purge(State(state): State<StubState>, headers: HeaderMap) -> StatusCode {
    if headers.get("x-rinha-token").and_then(|v| v.to_str().ok()) != Some("123") {
        return StatusCode::UNAUTHORIZED;
    }
    state.purges.fetch_add(1, Ordering::SeqCst);
    state.payments.lock().unwrap().clear();
    StatusCode::OK
}

/// Base URL of a server that accepts connections and never answers.
pub async fn silent_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{}", addr)
}

/// Base URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

pub fn settled_route(payment: &SettledPayment) -> Route {
    payment.route
}
