use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::config::LayoutConfig;
use crate::error::LayoutError;
use crate::model::{Direction, FlowGraph, Position};
use crate::snapshot::LayoutSnapshot;

use super::{LayoutAlgorithm, LayoutInput, NodeSizes, apply_positions};

/// Identifies one layout request. Later requests carry larger tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutStatus {
    Idle,
    Computing { token: RequestToken },
    Ready { token: RequestToken },
    Failed { token: RequestToken, error: LayoutError },
}

#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOutcome {
    Ready(FlowGraph),
    /// A newer request was issued before this one finished; nothing was applied.
    Superseded,
    Failed(LayoutError),
}

impl LayoutOutcome {
    pub fn into_graph(self) -> Option<FlowGraph> {
        match self {
            Self::Ready(graph) => Some(graph),
            Self::Superseded | Self::Failed(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayoutOptions {
    pub direction: Direction,
}

impl LayoutOptions {
    pub fn new(direction: Direction) -> Self {
        Self { direction }
    }
}

/// Fingerprint of everything that can move a node: structure, sizes and direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutSignature(u64);

impl LayoutSignature {
    pub fn of(input: &LayoutInput) -> Self {
        let mut hasher = DefaultHasher::new();
        input.direction.hash(&mut hasher);
        input.nodes.len().hash(&mut hasher);
        for node in &input.nodes {
            node.id.hash(&mut hasher);
            // Half-pixel resolution so measurement jitter does not force a relayout.
            ((node.size.width * 2.0).round() as i64).hash(&mut hasher);
            ((node.size.height * 2.0).round() as i64).hash(&mut hasher);
        }
        input.edges.hash(&mut hasher);
        input.node_spacing.to_bits().hash(&mut hasher);
        input.rank_spacing.to_bits().hash(&mut hasher);
        Self(hasher.finish())
    }
}

/// A request between `issue` and `finish`. Dropping it unfinished, for instance when the
/// caller's future is cancelled by a timeout, puts a still-current request back to idle.
struct PendingRequest<'e> {
    engine: &'e LayoutEngine,
    token: RequestToken,
    settled: bool,
}

impl Drop for PendingRequest<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let token = self.token;
        let engine = self.engine;
        engine.status.send_if_modified(|status| {
            let current = engine.latest.load(Ordering::SeqCst) == token.0
                && *status == LayoutStatus::Computing { token };
            if current {
                tracing::debug!(token = token.0, "layout request dropped before completion");
                *status = LayoutStatus::Idle;
            }
            current
        });
    }
}

struct CachedLayout {
    signature: LayoutSignature,
    positions: HashMap<String, Position>,
}

/// Runs layout requests for one graph and applies only the most recent one.
pub struct LayoutEngine {
    algorithm: Arc<dyn LayoutAlgorithm>,
    config: LayoutConfig,
    latest: AtomicU64,
    status: watch::Sender<LayoutStatus>,
    last_applied: Mutex<Option<CachedLayout>>,
}

impl LayoutEngine {
    pub fn new(algorithm: Arc<dyn LayoutAlgorithm>, config: LayoutConfig) -> Self {
        let (status, _) = watch::channel(LayoutStatus::Idle);
        Self {
            algorithm,
            config,
            latest: AtomicU64::new(0),
            status,
            last_applied: Mutex::new(None),
        }
    }

    pub fn from_config(config: LayoutConfig) -> Self {
        let algorithm: Arc<dyn LayoutAlgorithm> = Arc::from(super::algorithm_for(config.algorithm));
        Self::new(algorithm, config)
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn status(&self) -> LayoutStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<LayoutStatus> {
        self.status.subscribe()
    }

    /// Discards whatever is in flight. A computing engine goes back to idle.
    pub fn cancel(&self) {
        self.status.send_if_modified(|status| {
            self.latest.fetch_add(1, Ordering::SeqCst);
            if matches!(status, LayoutStatus::Computing { .. }) {
                *status = LayoutStatus::Idle;
                true
            } else {
                false
            }
        });
    }

    pub async fn layout(
        &self,
        graph: &FlowGraph,
        sizes: &NodeSizes,
        options: LayoutOptions,
    ) -> LayoutOutcome {
        let request = self.issue();
        let token = request.token;
        if graph.nodes.is_empty() {
            return self.finish(request, None, Ok(FlowGraph::default()));
        }

        let input = LayoutInput::new(graph, sizes, &self.config, options.direction);
        let signature = LayoutSignature::of(&input);
        if let Some(positions) = self.cached_positions(signature) {
            tracing::debug!(token = token.0, "layout unchanged, reusing positions");
            let result = apply_positions(graph, &positions);
            return self.finish(request, None, result);
        }

        tracing::debug!(
            token = token.0,
            algorithm = self.algorithm.name(),
            nodes = input.nodes.len(),
            edges = input.edges.len(),
            "layout requested"
        );
        let algorithm = Arc::clone(&self.algorithm);
        let handle = tokio::task::spawn_blocking(move || {
            catch_unwind(AssertUnwindSafe(|| algorithm.run(&input)))
                .unwrap_or_else(|payload| Err(LayoutError::Panicked(panic_message(payload.as_ref()))))
        });
        let result = match handle.await {
            Ok(result) => result,
            Err(err) => Err(LayoutError::Join(err.to_string())),
        };

        match result {
            Ok(positions) => {
                let applied = apply_positions(graph, &positions);
                let cache = applied.is_ok().then_some((signature, positions));
                self.finish(request, cache, applied)
            }
            Err(err) => self.finish(request, None, Err(err)),
        }
    }

    /// Uses the persisted snapshot when it still describes `graph`, otherwise lays out afresh.
    /// Snapshot heights seed unmeasured nodes either way.
    pub async fn restore_or_layout(
        &self,
        snapshot: Option<&LayoutSnapshot>,
        graph: &FlowGraph,
        sizes: &NodeSizes,
        options: LayoutOptions,
    ) -> LayoutOutcome {
        let Some(snapshot) = snapshot else {
            return self.layout(graph, sizes, options).await;
        };
        let mut seeded = sizes.clone();
        seeded.seed_heights(&snapshot.node_heights, &self.config);

        if snapshot.direction == options.direction && snapshot.matches(graph) {
            let request = self.issue();
            tracing::debug!(token = request.token.0, "restoring layout from snapshot");
            let result = apply_positions(graph, &snapshot.positions());
            let cache = result.as_ref().ok().map(|_| {
                let input = LayoutInput::new(graph, &seeded, &self.config, options.direction);
                (LayoutSignature::of(&input), snapshot.positions())
            });
            return self.finish(request, cache, result);
        }

        tracing::debug!("snapshot is stale, running a fresh layout");
        self.layout(graph, &seeded, options).await
    }

    fn issue(&self) -> PendingRequest<'_> {
        let mut token = RequestToken(0);
        self.status.send_modify(|status| {
            token = RequestToken(self.latest.fetch_add(1, Ordering::SeqCst) + 1);
            *status = LayoutStatus::Computing { token };
        });
        PendingRequest {
            engine: self,
            token,
            settled: false,
        }
    }

    fn cached_positions(&self, signature: LayoutSignature) -> Option<HashMap<String, Position>> {
        let guard = self
            .last_applied
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|cached| cached.signature == signature)
            .map(|cached| cached.positions.clone())
    }

    fn finish(
        &self,
        mut request: PendingRequest<'_>,
        cache: Option<(LayoutSignature, HashMap<String, Position>)>,
        result: Result<FlowGraph, LayoutError>,
    ) -> LayoutOutcome {
        request.settled = true;
        let token = request.token;
        let mut outcome = LayoutOutcome::Superseded;
        self.status.send_if_modified(|status| {
            if self.latest.load(Ordering::SeqCst) != token.0 {
                return false;
            }
            match result {
                Ok(graph) => {
                    if let Some((signature, positions)) = cache {
                        *self
                            .last_applied
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner) = Some(CachedLayout {
                            signature,
                            positions,
                        });
                    }
                    *status = LayoutStatus::Ready { token };
                    outcome = LayoutOutcome::Ready(graph);
                }
                Err(error) => {
                    tracing::warn!(token = token.0, %error, "layout failed");
                    *status = LayoutStatus::Failed {
                        token,
                        error: error.clone(),
                    };
                    outcome = LayoutOutcome::Failed(error);
                }
            }
            true
        });
        if matches!(outcome, LayoutOutcome::Superseded) {
            tracing::trace!(token = token.0, "discarding superseded layout result");
        }
        outcome
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayeredLayout;
    use crate::model::{ContentNode, FlowEdge, FlowNode, FlowNodeKind, FlowPayload, Size};
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    struct CountingLayout {
        calls: AtomicUsize,
        delay: Duration,
    }

    impl CountingLayout {
        fn new(delay: Duration) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay,
            }
        }
    }

    impl LayoutAlgorithm for CountingLayout {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn run(&self, input: &LayoutInput) -> Result<HashMap<String, Position>, LayoutError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(self.delay);
            Ok(input
                .nodes
                .iter()
                .enumerate()
                .map(|(idx, node)| (node.id.clone(), Position::new(0.0, idx as f32 * 100.0)))
                .collect())
        }
    }

    struct PanickingLayout;

    impl LayoutAlgorithm for PanickingLayout {
        fn name(&self) -> &'static str {
            "panicking"
        }

        fn run(&self, _input: &LayoutInput) -> Result<HashMap<String, Position>, LayoutError> {
            panic!("layout exploded");
        }
    }

    /// Fails its first request and succeeds afterwards.
    struct FlakyLayout {
        inner: CountingLayout,
    }

    impl LayoutAlgorithm for FlakyLayout {
        fn name(&self) -> &'static str {
            "flaky"
        }

        fn run(&self, input: &LayoutInput) -> Result<HashMap<String, Position>, LayoutError> {
            let positions = self.inner.run(input)?;
            if self.inner.calls.load(Ordering::SeqCst) == 1 {
                return Err(LayoutError::MissingPosition(input.nodes[0].id.clone()));
            }
            Ok(positions)
        }
    }

    struct ShortLayout;

    impl LayoutAlgorithm for ShortLayout {
        fn name(&self) -> &'static str {
            "short"
        }

        fn run(&self, input: &LayoutInput) -> Result<HashMap<String, Position>, LayoutError> {
            Ok(input
                .nodes
                .iter()
                .skip(1)
                .map(|node| (node.id.clone(), Position::default()))
                .collect())
        }
    }

    fn chain(len: usize) -> FlowGraph {
        let nodes: Vec<FlowNode> = (0..len)
            .map(|idx| FlowNode {
                id: format!("article-{idx}"),
                kind: FlowNodeKind::Article,
                position: Position::default(),
                payload: FlowPayload::Article(ContentNode::new(idx.to_string(), "text")),
            })
            .collect();
        let edges = (1..len)
            .map(|idx| FlowEdge::new(&format!("article-{}", idx - 1), &format!("article-{idx}")))
            .collect();
        FlowGraph::new(nodes, edges)
    }

    #[tokio::test]
    async fn empty_graph_skips_algorithm() {
        let algorithm = Arc::new(CountingLayout::new(Duration::ZERO));
        let engine = LayoutEngine::new(algorithm.clone(), LayoutConfig::default());
        let outcome = engine
            .layout(&FlowGraph::default(), &NodeSizes::new(), LayoutOptions::default())
            .await;
        assert_eq!(outcome, LayoutOutcome::Ready(FlowGraph::default()));
        assert_eq!(algorithm.calls.load(Ordering::SeqCst), 0);
        assert!(matches!(engine.status(), LayoutStatus::Ready { .. }));
    }

    #[tokio::test]
    async fn positions_are_applied() {
        let engine = LayoutEngine::new(Arc::new(LayeredLayout::default()), LayoutConfig::default());
        let graph = chain(3);
        let outcome = engine
            .layout(&graph, &NodeSizes::new(), LayoutOptions::default())
            .await;
        let positioned = outcome.into_graph().unwrap();
        assert_eq!(positioned.nodes.len(), 3);
        assert!(positioned.nodes[0].position.y < positioned.nodes[1].position.y);
        assert!(positioned.nodes[1].position.y < positioned.nodes[2].position.y);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stale_request_is_discarded() {
        let algorithm = Arc::new(CountingLayout::new(Duration::from_millis(50)));
        let engine = LayoutEngine::new(algorithm.clone(), LayoutConfig::default());
        let first_graph = chain(2);
        let second_graph = chain(3);
        let sizes = NodeSizes::new();
        let options = LayoutOptions::default();

        let (first, second) = tokio::join!(
            engine.layout(&first_graph, &sizes, options),
            async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                engine.layout(&second_graph, &sizes, options).await
            }
        );
        assert_eq!(first, LayoutOutcome::Superseded);
        assert_eq!(second.into_graph().map(|g| g.nodes.len()), Some(3));
        assert_eq!(
            engine.status(),
            LayoutStatus::Ready {
                token: RequestToken(2)
            }
        );
    }

    #[tokio::test]
    async fn panic_becomes_failed_state() {
        let engine = LayoutEngine::new(Arc::new(PanickingLayout), LayoutConfig::default());
        let outcome = engine
            .layout(&chain(2), &NodeSizes::new(), LayoutOptions::default())
            .await;
        match outcome {
            LayoutOutcome::Failed(LayoutError::Panicked(message)) => {
                assert!(message.contains("layout exploded"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(matches!(engine.status(), LayoutStatus::Failed { .. }));
    }

    #[tokio::test]
    async fn malformed_result_becomes_failed_state() {
        let engine = LayoutEngine::new(Arc::new(ShortLayout), LayoutConfig::default());
        let outcome = engine
            .layout(&chain(3), &NodeSizes::new(), LayoutOptions::default())
            .await;
        assert_eq!(
            outcome,
            LayoutOutcome::Failed(LayoutError::NodeCountMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert!(outcome_is_none(outcome));
    }

    fn outcome_is_none(outcome: LayoutOutcome) -> bool {
        outcome.into_graph().is_none()
    }

    #[tokio::test]
    async fn unchanged_input_reuses_previous_layout() {
        let algorithm = Arc::new(CountingLayout::new(Duration::ZERO));
        let engine = LayoutEngine::new(algorithm.clone(), LayoutConfig::default());
        let graph = chain(3);
        let mut sizes = NodeSizes::new();
        let options = LayoutOptions::default();

        assert!(engine.layout(&graph, &sizes, options).await.is_ready());
        assert!(engine.layout(&graph, &sizes, options).await.is_ready());
        assert_eq!(algorithm.calls.load(Ordering::SeqCst), 1);

        sizes.insert("article-1", Size::new(320.0, 400.0));
        assert!(engine.layout(&graph, &sizes, options).await.is_ready());
        assert_eq!(algorithm.calls.load(Ordering::SeqCst), 2);

        let right = LayoutOptions::new(Direction::Right);
        assert!(engine.layout(&graph, &sizes, right).await.is_ready());
        assert_eq!(algorithm.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn status_walks_through_computing() {
        let engine = LayoutEngine::new(
            Arc::new(CountingLayout::new(Duration::ZERO)),
            LayoutConfig::default(),
        );
        let mut rx = engine.subscribe();
        assert_eq!(*rx.borrow_and_update(), LayoutStatus::Idle);
        let outcome = engine
            .layout(&chain(2), &NodeSizes::new(), LayoutOptions::default())
            .await;
        assert!(outcome.is_ready());
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            *rx.borrow_and_update(),
            LayoutStatus::Ready {
                token: RequestToken(1)
            }
        );
    }

    #[tokio::test]
    async fn cancel_discards_in_flight_result() {
        let engine = Arc::new(LayoutEngine::new(
            Arc::new(CountingLayout::new(Duration::from_millis(50))),
            LayoutConfig::default(),
        ));
        let task = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                engine
                    .layout(&chain(2), &NodeSizes::new(), LayoutOptions::default())
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;
        engine.cancel();
        assert_eq!(engine.status(), LayoutStatus::Idle);
        assert_eq!(task.await.unwrap(), LayoutOutcome::Superseded);
        assert_eq!(engine.status(), LayoutStatus::Idle);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_request_returns_to_idle() {
        let engine = LayoutEngine::new(
            Arc::new(CountingLayout::new(Duration::from_millis(200))),
            LayoutConfig::default(),
        );
        let graph = chain(2);
        let sizes = NodeSizes::new();
        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            engine.layout(&graph, &sizes, LayoutOptions::default()),
        )
        .await;
        assert!(timed_out.is_err());
        assert_eq!(engine.status(), LayoutStatus::Idle);

        let outcome = engine
            .layout(&graph, &sizes, LayoutOptions::default())
            .await;
        assert!(outcome.is_ready());
        assert_eq!(
            engine.status(),
            LayoutStatus::Ready {
                token: RequestToken(2)
            }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropping_an_older_request_keeps_newer_one_computing() {
        let engine = LayoutEngine::new(
            Arc::new(CountingLayout::new(Duration::from_millis(100))),
            LayoutConfig::default(),
        );
        let graph = chain(2);
        let sizes = NodeSizes::new();
        let options = LayoutOptions::default();
        let older = Box::pin(engine.layout(&graph, &sizes, options));
        let (_, newer) = tokio::join!(
            async {
                // Poll once so the older request is issued, then drop it.
                let _ = tokio::time::timeout(Duration::from_millis(5), older).await;
            },
            async {
                tokio::time::sleep(Duration::from_millis(2)).await;
                let newer = engine.layout(&graph, &sizes, options);
                tokio::pin!(newer);
                let early = tokio::time::timeout(Duration::from_millis(20), &mut newer).await;
                assert!(early.is_err());
                assert_eq!(
                    engine.status(),
                    LayoutStatus::Computing {
                        token: RequestToken(2)
                    }
                );
                newer.await
            }
        );
        assert!(newer.is_ready());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failed_engine_recovers_on_next_request() {
        let engine = LayoutEngine::new(
            Arc::new(FlakyLayout {
                inner: CountingLayout::new(Duration::from_millis(50)),
            }),
            LayoutConfig::default(),
        );
        let mut rx = engine.subscribe();
        let graph = chain(2);
        let sizes = NodeSizes::new();
        let options = LayoutOptions::default();

        let first = engine.layout(&graph, &sizes, options).await;
        assert!(matches!(first, LayoutOutcome::Failed(_)));
        assert!(matches!(
            *rx.borrow_and_update(),
            LayoutStatus::Failed {
                token: RequestToken(1),
                ..
            }
        ));

        let (second, during) = tokio::join!(engine.layout(&graph, &sizes, options), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            engine.status()
        });
        assert_eq!(
            during,
            LayoutStatus::Computing {
                token: RequestToken(2)
            }
        );
        assert!(second.is_ready());
        assert_eq!(
            *rx.borrow_and_update(),
            LayoutStatus::Ready {
                token: RequestToken(2)
            }
        );
    }

    #[tokio::test]
    async fn poisoned_cache_lock_still_serves_cached_layout() {
        let algorithm = Arc::new(CountingLayout::new(Duration::ZERO));
        let engine = LayoutEngine::new(algorithm.clone(), LayoutConfig::default());
        std::thread::scope(|scope| {
            let poisoner = scope.spawn(|| {
                let _guard = engine.last_applied.lock();
                panic!("poison the cache lock");
            });
            assert!(poisoner.join().is_err());
        });
        assert!(engine.last_applied.is_poisoned());

        let graph = chain(3);
        let sizes = NodeSizes::new();
        let options = LayoutOptions::default();
        assert!(engine.layout(&graph, &sizes, options).await.is_ready());
        assert!(engine.layout(&graph, &sizes, options).await.is_ready());
        assert_eq!(algorithm.calls.load(Ordering::SeqCst), 1);
    }
}
