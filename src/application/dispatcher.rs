use super::admission::Admission;
use super::policy::DispatchPolicy;
use super::queue::{DispatchQueues, QueueReceiver};
use super::reconciler::{ReconcileVerdict, Reconciler};
use super::scheduler::RetryScheduler;
use super::tracker::{DispatchReport, DispatchStats, OutcomeTracker, Terminal};
use crate::config::DispatcherConfig;
use crate::domain::outcome::FailureClass;
use crate::domain::payment::{DispatchPayload, PaymentRequest, Route, SettledPayment};
use crate::domain::ports::{GatewayRef, RecorderRef};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Owns the route queues and drives every admitted payment to a terminal
/// state.
///
/// Build it, hand out [`Admission`]s, then [`spawn`](Dispatcher::spawn) the
/// consumer loop.
pub struct Dispatcher {
    ctx: Arc<DispatchContext>,
    primary_rx: QueueReceiver,
    fallback_rx: QueueReceiver,
    max_in_flight: usize,
}

/// Everything a dispatch task needs. Shared read-only between tasks.
struct DispatchContext {
    primary: GatewayRef,
    fallback: GatewayRef,
    recorder: RecorderRef,
    policy: DispatchPolicy,
    queues: DispatchQueues,
    scheduler: RetryScheduler,
    reconciler: Reconciler,
    tracker: Arc<OutcomeTracker>,
}

impl Dispatcher {
    pub fn new(
        config: &DispatcherConfig,
        primary: GatewayRef,
        fallback: GatewayRef,
        recorder: RecorderRef,
    ) -> Result<Self> {
        config.validate()?;

        let (queues, primary_rx, fallback_rx) = DispatchQueues::bounded(config.queue_capacity);
        let tracker = Arc::new(OutcomeTracker::new());
        let scheduler = RetryScheduler::new(queues.clone(), Arc::clone(&tracker));
        let reconciler = Reconciler::new(Arc::clone(&primary), &config.policy);

        Ok(Self {
            ctx: Arc::new(DispatchContext {
                primary,
                fallback,
                recorder,
                policy: config.policy,
                queues,
                scheduler,
                reconciler,
                tracker,
            }),
            primary_rx,
            fallback_rx,
            max_in_flight: config.max_in_flight,
        })
    }

    pub fn admission(&self) -> Admission {
        Admission::new(self.ctx.queues.primary.clone(), Arc::clone(&self.ctx.tracker))
    }

    pub fn queues(&self) -> &DispatchQueues {
        &self.ctx.queues
    }

    pub fn tracker(&self) -> Arc<OutcomeTracker> {
        Arc::clone(&self.ctx.tracker)
    }

    /// Starts the consumer loop on the current runtime.
    pub fn spawn(self) -> DispatcherHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let admission = self.admission();
        let tracker = self.tracker();
        let task = tokio::spawn(self.run(shutdown_rx));

        DispatcherHandle {
            admission,
            tracker,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let Dispatcher {
            ctx,
            mut primary_rx,
            mut fallback_rx,
            max_in_flight,
        } = self;
        let slots = Arc::new(Semaphore::new(max_in_flight));
        info!(max_in_flight, "Dispatcher started");

        loop {
            // Take a slot before dequeuing so a saturated dispatcher leaves
            // requests in the bounded queues, where they exert backpressure.
            let permit = tokio::select! {
                _ = shutdown.changed() => break,
                permit = Arc::clone(&slots).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let (route, request) = tokio::select! {
                _ = shutdown.changed() => break,
                Some(request) = primary_rx.recv() => (Route::Primary, request),
                Some(request) = fallback_rx.recv() => (Route::Fallback, request),
                else => break,
            };

            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                let _permit = permit;
                ctx.dispatch(route, request).await;
            });
        }

        // Queued requests would otherwise vanish with the receivers.
        primary_rx.close();
        fallback_rx.close();
        let mut drained = 0u64;
        for rx in [&mut primary_rx, &mut fallback_rx] {
            while let Some(request) = rx.recv().await {
                ctx.tracker.finish(DispatchReport {
                    correlation_id: request.correlation_id,
                    attempts: request.attempt(),
                    terminal: Terminal::Dropped,
                });
                drained += 1;
            }
        }
        if drained > 0 {
            warn!(drained, "Dropped payments still queued at shutdown");
        }

        info!("Dispatcher stopped");
    }
}

impl DispatchContext {
    async fn dispatch(self: Arc<Self>, route: Route, mut request: PaymentRequest) {
        let at = Utc::now();
        request.stamp_dispatch(at);
        match route {
            Route::Primary => self.dispatch_primary(request, at).await,
            Route::Fallback => self.dispatch_fallback(request, at).await,
        }
    }

    async fn dispatch_primary(self: Arc<Self>, mut request: PaymentRequest, at: DateTime<Utc>) {
        let payload = DispatchPayload::new(request.correlation_id, request.amount, at);
        let outcome = self.primary.process(&payload).await;

        match outcome.failure_class() {
            None => self.settle(request, Route::Primary).await,
            Some(FailureClass::Ambiguous) => {
                request.next_attempt();
                debug!(
                    correlation_id = %request.correlation_id,
                    attempt = request.attempt(),
                    "Primary timed out, reconciling"
                );
                tokio::spawn(async move { self.reconcile(request).await });
            }
            Some(FailureClass::Transient) => {
                let plan = self.policy.after_failure(&mut request);
                match plan.route {
                    Route::Primary => debug!(
                        correlation_id = %request.correlation_id,
                        attempt = request.attempt(),
                        ?outcome,
                        "Primary attempt failed, retrying"
                    ),
                    Route::Fallback => info!(
                        correlation_id = %request.correlation_id,
                        attempt = request.attempt(),
                        ?outcome,
                        "Primary retries exhausted, escalating to fallback"
                    ),
                }
                self.scheduler.schedule(request, plan.route, plan.delay);
            }
        }
    }

    async fn reconcile(&self, request: PaymentRequest) {
        match self.reconciler.reconcile(&request).await {
            ReconcileVerdict::Confirmed { polls, .. } => {
                debug!(correlation_id = %request.correlation_id, polls, "Timed-out payment confirmed");
                self.settle(request, Route::Primary).await;
            }
            ReconcileVerdict::Escalate { polls } => {
                info!(
                    correlation_id = %request.correlation_id,
                    attempt = request.attempt(),
                    polls,
                    "Reconciliation abandoned, escalating to fallback"
                );
                self.scheduler.requeue(request, Route::Fallback).await;
            }
            ReconcileVerdict::Retry { polls } => {
                debug!(correlation_id = %request.correlation_id, polls, "Payment unknown to primary, retrying");
                self.scheduler.requeue(request, Route::Primary).await;
            }
        }
    }

    async fn dispatch_fallback(&self, request: PaymentRequest, at: DateTime<Utc>) {
        let payload = DispatchPayload::new(request.correlation_id, request.amount, at);
        let outcome = self.fallback.process(&payload).await;

        if outcome.is_success() {
            self.settle(request, Route::Fallback).await;
            return;
        }

        warn!(
            correlation_id = %request.correlation_id,
            attempts = request.attempt(),
            ?outcome,
            "Fallback failed, dropping payment"
        );
        self.tracker.finish(DispatchReport {
            correlation_id: request.correlation_id,
            attempts: request.attempt(),
            terminal: Terminal::Dropped,
        });
    }

    /// Records a payment the processor has accepted. A failed write is logged
    /// and never retried: reprocessing would risk charging twice.
    async fn settle(&self, request: PaymentRequest, route: Route) {
        let payment = SettledPayment {
            correlation_id: request.correlation_id,
            amount: request.amount.value(),
            route,
            settled_at: request.requested_at().unwrap_or_else(Utc::now),
        };

        let persisted = match self.recorder.insert(payment).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    correlation_id = %request.correlation_id,
                    %route,
                    error = %e,
                    "Payment charged but not recorded"
                );
                false
            }
        };

        debug!(correlation_id = %request.correlation_id, %route, attempts = request.attempt(), "Payment settled");
        self.tracker.finish(DispatchReport {
            correlation_id: request.correlation_id,
            attempts: request.attempt(),
            terminal: Terminal::Settled { route, persisted },
        });
    }
}

/// Handle to a running dispatcher.
pub struct DispatcherHandle {
    admission: Admission,
    tracker: Arc<OutcomeTracker>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl DispatcherHandle {
    pub fn admission(&self) -> Admission {
        self.admission.clone()
    }

    pub fn stats(&self) -> DispatchStats {
        self.tracker.stats()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<DispatchReport> {
        self.tracker.subscribe()
    }

    /// Waits until every admitted payment is settled or dropped.
    pub async fn wait_idle(&self) {
        self.tracker.wait_idle().await
    }

    /// Stops taking requests off the queues. Requests still queued are
    /// reported as dropped; tasks already dispatched run to completion on
    /// their own, and any retry they schedule afterwards is dropped too.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            error!(error = %e, "Dispatcher loop panicked");
        }
    }
}
