use std::{pin::Pin, sync::Arc, time::SystemTime};

use futures::{Stream, StreamExt};

use crate::error::IngestError;

/// A payload together with where and when it entered the pipeline.
#[derive(Debug, Clone)]
pub struct Envelope<T> {
    pub payload: T,
    /// File name or upload label the payload was parsed from.
    pub origin: String,
    pub received_at: SystemTime,
}

impl<T> Envelope<T> {
    pub fn new(payload: T, origin: impl Into<String>) -> Self {
        Self {
            payload,
            origin: origin.into(),
            received_at: SystemTime::now(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("source error: {0}")]
    Source(String),
    #[error("parse error in {origin}: {source}")]
    Parse {
        origin: String,
        #[source]
        source: IngestError,
    },
    #[error("transform error: {0}")]
    Transform(String),
    #[error("sink error: {0}")]
    Sink(String),
    #[error("store error: {0}")]
    Store(String),
}

pub type EnvelopeStream<T> = Pin<Box<dyn Stream<Item = Result<Envelope<T>, PipelineError>> + Send>>;

#[async_trait::async_trait]
pub trait Source<T>: Send + Sync {
    async fn stream(&self) -> EnvelopeStream<T>;
}

#[async_trait::async_trait]
pub trait Transform<I, O>: Send + Sync {
    async fn apply(&self, input: Envelope<I>) -> Result<Envelope<O>, PipelineError>;
}

#[async_trait::async_trait]
pub trait Sink<T>: Send + Sync {
    async fn run<S>(&self, input: S) -> Result<(), PipelineError>
    where
        S: Stream<Item = Result<Envelope<T>, PipelineError>> + Send + Unpin + 'static;
}

pub struct Pipeline<S, T, K> {
    pub source: S,
    pub transforms: Vec<Arc<dyn Transform<T, T> + Send + Sync>>,
    pub sink: K,
}

impl<T, S, K> Pipeline<S, T, K>
where
    T: Send + 'static,
    S: Source<T> + Send + Sync + 'static,
    K: Sink<T> + Send + Sync + 'static,
{
    pub async fn run(self) -> Result<(), PipelineError> {
        let mut stream = self.source.stream().await;

        for t in self.transforms {
            stream = Box::pin(stream.then(move |item| {
                let t = t.clone();
                async move {
                    match item {
                        Ok(env) => t.apply(env).await,
                        Err(e) => Err(e),
                    }
                }
            }));
        }

        self.sink.run(stream).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct VecSource(Vec<u32>);

    #[async_trait::async_trait]
    impl Source<u32> for VecSource {
        async fn stream(&self) -> EnvelopeStream<u32> {
            let items: Vec<_> = self
                .0
                .iter()
                .map(|v| Ok(Envelope::new(*v, format!("item-{v}"))))
                .collect();
            Box::pin(futures::stream::iter(items))
        }
    }

    struct RejectOdd;

    #[async_trait::async_trait]
    impl Transform<u32, u32> for RejectOdd {
        async fn apply(&self, input: Envelope<u32>) -> Result<Envelope<u32>, PipelineError> {
            if input.payload % 2 == 1 {
                Err(PipelineError::Transform(format!("odd value from {}", input.origin)))
            } else {
                Ok(input)
            }
        }
    }

    #[derive(Default)]
    struct CollectSink {
        ok: Mutex<Vec<u32>>,
        failed: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl Sink<u32> for Arc<CollectSink> {
        async fn run<S>(&self, mut input: S) -> Result<(), PipelineError>
        where
            S: Stream<Item = Result<Envelope<u32>, PipelineError>> + Send + Unpin + 'static,
        {
            while let Some(item) = input.next().await {
                match item {
                    Ok(env) => self.ok.lock().unwrap().push(env.payload),
                    Err(_) => *self.failed.lock().unwrap() += 1,
                }
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn transforms_apply_in_order_and_errors_flow_to_sink() {
        let sink = Arc::new(CollectSink::default());
        let pipeline: Pipeline<_, u32, _> = Pipeline {
            source: VecSource(vec![1, 2, 3, 4]),
            transforms: vec![Arc::new(RejectOdd)],
            sink: sink.clone(),
        };

        pipeline.run().await.unwrap();

        assert_eq!(*sink.ok.lock().unwrap(), vec![2, 4]);
        assert_eq!(*sink.failed.lock().unwrap(), 2);
    }
}
