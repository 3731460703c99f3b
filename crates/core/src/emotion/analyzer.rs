use crate::engine::{AnalysisRequest, DetectionResult, EmotionEngine, EngineError};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;

const LOG_TARGET: &str = "emotion::analyzer";

pub trait EmotionAnalyzer: Send + Sync {
    fn analyze(
        &self,
        request: AnalysisRequest,
    ) -> BoxFuture<'_, Result<DetectionResult, EngineError>>;
}

/// Runs the synchronous engine on tokio's blocking pool.
#[derive(Clone, Debug)]
pub struct BlockingEmotionAnalyzer {
    engine: Arc<EmotionEngine>,
}

impl BlockingEmotionAnalyzer {
    pub fn new(engine: Arc<EmotionEngine>) -> Self {
        Self { engine }
    }
}

impl EmotionAnalyzer for BlockingEmotionAnalyzer {
    fn analyze(
        &self,
        request: AnalysisRequest,
    ) -> BoxFuture<'_, Result<DetectionResult, EngineError>> {
        let engine = self.engine.clone();
        async move {
            tokio::task::spawn_blocking(move || engine.analyze(&request))
                .await
                .map_err(|e| {
                    tracing::warn!(target: LOG_TARGET, error = %e, "blocking analysis task failed");
                    EngineError::WorkerFailed(e.to_string())
                })?
        }
        .boxed()
    }
}
