//! Test bodies
//!
//! A body is any closure taking either nothing or an [`Expect`] factory and
//! returning either a settled value (`()` or `Result`) or a future of one.
//! Every shape is erased into the same boxed, awaitable unit of work, so the
//! engine sequences synchronous and asynchronous bodies identically.

use futures::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;

use crate::matchers::{Expect, Settle};

/// Erased computation of one test run; `Err` carries the failure message
pub type BodyFuture = BoxFuture<'static, Result<(), String>>;

pub(crate) type Body = Arc<dyn Fn(Expect) -> BodyFuture + Send + Sync>;

/// Closures accepted as test bodies.
///
/// The marker parameter only disambiguates the four accepted shapes and is
/// always inferred.
pub trait IntoTestBody<Marker> {
    fn into_body(self) -> Body;
}

/// `Fn() -> R`
pub enum Blocking {}

/// `Fn(Expect) -> R`
pub enum BlockingWithExpect {}

/// `Fn() -> impl Future<Output = R>`
pub enum Async {}

/// `Fn(Expect) -> impl Future<Output = R>`
pub enum AsyncWithExpect {}

impl<F, R> IntoTestBody<Blocking> for F
where
    F: Fn() -> R + Send + Sync + 'static,
    R: Settle,
{
    fn into_body(self) -> Body {
        let body = Arc::new(self);
        Arc::new(move |_expect: Expect| -> BodyFuture {
            let body = Arc::clone(&body);
            Box::pin(async move { body().settle() })
        })
    }
}

impl<F, R> IntoTestBody<BlockingWithExpect> for F
where
    F: Fn(Expect) -> R + Send + Sync + 'static,
    R: Settle,
{
    fn into_body(self) -> Body {
        let body = Arc::new(self);
        Arc::new(move |expect: Expect| -> BodyFuture {
            let body = Arc::clone(&body);
            Box::pin(async move { body(expect).settle() })
        })
    }
}

impl<F, Fut, R> IntoTestBody<Async> for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Settle,
{
    fn into_body(self) -> Body {
        let body = Arc::new(self);
        Arc::new(move |_expect: Expect| -> BodyFuture {
            let body = Arc::clone(&body);
            Box::pin(async move { body().await.settle() })
        })
    }
}

impl<F, Fut, R> IntoTestBody<AsyncWithExpect> for F
where
    F: Fn(Expect) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = R> + Send + 'static,
    R: Settle,
{
    fn into_body(self) -> Body {
        let body = Arc::new(self);
        Arc::new(move |expect: Expect| -> BodyFuture {
            let body = Arc::clone(&body);
            Box::pin(async move { body(expect).await.settle() })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Failure;
    use crate::matchers::expect;
    use std::time::Duration;

    fn erase<M>(body: impl IntoTestBody<M>) -> Body {
        body.into_body()
    }

    async fn settle<M>(body: impl IntoTestBody<M>) -> Result<(), String> {
        let body = erase(body);
        body(Expect::new()).await
    }

    #[tokio::test]
    async fn test_blocking_bodies() {
        assert_eq!(settle(|| expect(2 + 2).to_be(4)).await, Ok(()));
        assert_eq!(settle(|| ()).await, Ok(()));
        assert_eq!(
            settle(|| expect(2 + 2).to_be(5)).await,
            Err("expected 4 to be 5".to_string())
        );
    }

    #[tokio::test]
    async fn test_bodies_with_factory() {
        let result = settle(|e: Expect| -> Result<(), Failure> {
            e.that(1).to_be(1)?;
            e.that("a").not().to_be("b")
        })
        .await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn test_async_bodies() {
        let result = settle(|| async {
            tokio::time::sleep(Duration::from_millis(1)).await;
            expect(1).to_be(1)
        })
        .await;
        assert_eq!(result, Ok(()));

        let result = settle(|e: Expect| async move {
            tokio::task::yield_now().await;
            e.that(vec![1]).to_equal([2])
        })
        .await;
        assert_eq!(result, Err("expected [1] to equal [2]".to_string()));
    }

    #[tokio::test]
    async fn test_body_is_lazy() {
        use std::sync::atomic::{AtomicBool, Ordering};

        let called = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&called);
        let body = erase(move || flag.store(true, Ordering::SeqCst));

        let pending = body(Expect::new());
        assert!(!called.load(Ordering::SeqCst));
        assert_eq!(pending.await, Ok(()));
        assert!(called.load(Ordering::SeqCst));
    }
}
