//! Cost-based dispatch with a single fallback hop.
//!
//! Algorithm:
//! 1. Estimate cost (memoized on the request)
//! 2. Cost over the admission threshold: constrained backend only. Its result
//!    is terminal (`InitialFallback` or failure)
//! 3. Otherwise try the high-capacity backend:
//!    - success: `Primary`
//!    - `ResourceExhausted`: one attempt on the constrained backend
//!      (`EmergencyFallback` or failure)
//!    - any other failure: surfaced as unrecovered, no fallback
//!
//! No retries and no chained fallbacks; at most two backend calls per request.

use std::sync::Arc;

use super::attempts::{AttemptRecord, AttemptResult};
use crate::backend::{BackendFailure, FailureKind, Generate, Generated, OllamaBackend};
use crate::router::{select_route, BackendRole, Registry, Request, Route};

/// Which path produced a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// High-capacity backend on the first attempt.
    Primary,
    /// Constrained backend, chosen up front because the request was over budget.
    InitialFallback,
    /// Constrained backend after the high-capacity backend ran out of resources.
    EmergencyFallback,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Primary => "primary",
            Tier::InitialFallback => "initial_fallback",
            Tier::EmergencyFallback => "emergency_fallback",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A successfully dispatched request.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub backend: String,
    pub model: String,
    pub tier: Tier,
    pub cost: u64,
    pub attempts: Vec<AttemptRecord>,
}

/// Where in the state machine a dispatch ended in failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    /// The high-capacity backend failed with a non-recoverable failure.
    Unrecovered,
    /// The constrained backend failed on an over-budget request.
    InitialFallback,
    /// The constrained backend failed after the high-capacity backend ran out
    /// of resources.
    EmergencyFallback,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Unrecovered => "unrecovered",
            FailureStage::InitialFallback => "initial_fallback_failed",
            FailureStage::EmergencyFallback => "emergency_fallback_failed",
        }
    }
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a dispatch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{stage} on backend '{backend}': {failure}")]
pub struct DispatchError {
    pub stage: FailureStage,
    pub backend: String,
    pub failure: BackendFailure,
    pub attempts: Vec<AttemptRecord>,
}

impl DispatchError {
    /// True when the primary attempt failed in a way no fallback can fix.
    pub fn is_unrecovered(&self) -> bool {
        self.stage == FailureStage::Unrecovered
    }

    pub fn kind(&self) -> FailureKind {
        self.failure.kind
    }
}

/// Outcome of dispatching one request.
pub type Outcome = std::result::Result<Completion, DispatchError>;

/// The dispatch state machine over a fixed pair of backends.
#[derive(Clone)]
pub struct Dispatcher {
    registry: Arc<Registry>,
    constrained: Arc<dyn Generate>,
    high_capacity: Arc<dyn Generate>,
}

impl Dispatcher {
    /// Create a dispatcher over explicit backend implementations.
    pub fn new(
        registry: Registry,
        constrained: Arc<dyn Generate>,
        high_capacity: Arc<dyn Generate>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            constrained,
            high_capacity,
        }
    }

    /// Create a dispatcher talking HTTP to both configured backends.
    pub fn connect(registry: Registry) -> Result<Self, reqwest::Error> {
        let constrained = OllamaBackend::new(registry.constrained())?;
        let high_capacity = OllamaBackend::new(registry.high_capacity())?;
        Ok(Self::new(
            registry,
            Arc::new(constrained),
            Arc::new(high_capacity),
        ))
    }

    /// Decide the route for a request without calling any backend.
    pub fn plan(&self, request: &Request) -> Route {
        select_route(request.estimated_cost(), &self.registry)
    }

    /// Dispatch a request to completion, including at most one fallback hop.
    pub async fn dispatch(&self, request: &Request) -> Outcome {
        let cost = request.estimated_cost();
        let route = self.plan(request);
        let mut attempts = Vec::with_capacity(2);

        tracing::info!(
            cost,
            threshold = self.registry.admission_threshold(),
            route = %route,
            "Dispatching request"
        );

        match route {
            Route::DirectFallback => {
                tracing::warn!(cost, "Request over budget, using constrained backend");
                match self.attempt(BackendRole::Constrained, request, &mut attempts).await {
                    Ok(generated) => Ok(self.complete(
                        generated,
                        BackendRole::Constrained,
                        Tier::InitialFallback,
                        cost,
                        attempts,
                    )),
                    Err(failure) => Err(self.fail(
                        FailureStage::InitialFallback,
                        BackendRole::Constrained,
                        failure,
                        attempts,
                    )),
                }
            }
            Route::Primary => {
                let failure = match self
                    .attempt(BackendRole::HighCapacity, request, &mut attempts)
                    .await
                {
                    Ok(generated) => {
                        return Ok(self.complete(
                            generated,
                            BackendRole::HighCapacity,
                            Tier::Primary,
                            cost,
                            attempts,
                        ));
                    }
                    Err(failure) => failure,
                };

                if !failure.kind.is_recoverable() {
                    tracing::error!(
                        backend = %self.registry.high_capacity().name,
                        kind = %failure.kind,
                        "Primary attempt failed, not eligible for fallback"
                    );
                    return Err(self.fail(
                        FailureStage::Unrecovered,
                        BackendRole::HighCapacity,
                        failure,
                        attempts,
                    ));
                }

                tracing::warn!(
                    from = %self.registry.high_capacity().name,
                    to = %self.registry.constrained().name,
                    "High-capacity backend exhausted, emergency fallback"
                );

                match self.attempt(BackendRole::Constrained, request, &mut attempts).await {
                    Ok(generated) => Ok(self.complete(
                        generated,
                        BackendRole::Constrained,
                        Tier::EmergencyFallback,
                        cost,
                        attempts,
                    )),
                    Err(failure) => Err(self.fail(
                        FailureStage::EmergencyFallback,
                        BackendRole::Constrained,
                        failure,
                        attempts,
                    )),
                }
            }
        }
    }

    /// Invoke one backend and record the attempt.
    async fn attempt(
        &self,
        role: BackendRole,
        request: &Request,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Result<Generated, BackendFailure> {
        let descriptor = self.registry.get(role);
        let backend = match role {
            BackendRole::Constrained => &self.constrained,
            BackendRole::HighCapacity => &self.high_capacity,
        };

        tracing::debug!(
            backend = %descriptor.name,
            model = %descriptor.model,
            num_ctx = descriptor.options.num_ctx,
            "Invoking backend"
        );

        let result = backend
            .generate(&descriptor.model, request.text(), &descriptor.options)
            .await;

        attempts.push(AttemptRecord {
            backend: descriptor.name.clone(),
            role,
            result: match &result {
                Ok(_) => AttemptResult::Succeeded,
                Err(failure) => AttemptResult::Failed(failure.kind),
            },
        });

        result
    }

    fn complete(
        &self,
        generated: Generated,
        role: BackendRole,
        tier: Tier,
        cost: u64,
        attempts: Vec<AttemptRecord>,
    ) -> Completion {
        let descriptor = self.registry.get(role);
        tracing::info!(backend = %descriptor.name, tier = %tier, "Request completed");
        Completion {
            text: generated.text,
            backend: descriptor.name.clone(),
            model: descriptor.model.clone(),
            tier,
            cost,
            attempts,
        }
    }

    fn fail(
        &self,
        stage: FailureStage,
        role: BackendRole,
        failure: BackendFailure,
        attempts: Vec<AttemptRecord>,
    ) -> DispatchError {
        DispatchError {
            stage,
            backend: self.registry.get(role).name.clone(),
            failure,
            attempts,
        }
    }
}
