//! Ordered model fallback execution.
//!
//! A request names a primary model; when the primary's whole retry budget
//! is exhausted, each configured substitute is tried in declared order. The
//! executor is closure-driven so chain semantics can be tested without a
//! live endpoint.

use std::future::Future;
use std::time::Duration;

use super::error::CompletionError;

/// A successful chain run: the value plus which model produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackOutcome<T> {
    pub value: T,
    /// Model that actually answered.
    pub model: String,
    /// Position of that model in the chain (0 = primary).
    pub index: usize,
}

impl<T> FallbackOutcome<T> {
    /// Whether a substitute answered instead of the primary.
    pub fn used_fallback(&self) -> bool {
        self.index > 0
    }
}

/// Try each model in order, pausing briefly between switches, and return
/// the first success. When every model fails, the terminal error carries
/// the full attempted list and the last observed failure.
pub async fn run_fallback_chain<T, F, Fut>(
    models: &[String],
    pause: Duration,
    mut attempt: F,
) -> Result<FallbackOutcome<T>, CompletionError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<T, CompletionError>>,
{
    let mut last_error: Option<CompletionError> = None;

    for (index, model) in models.iter().enumerate() {
        if index > 0 {
            tokio::time::sleep(pause).await;
            tracing::warn!(
                primary = %models[0],
                fallback = %model,
                "primary model exhausted, trying fallback"
            );
        }

        match attempt(model.clone()).await {
            Ok(value) => {
                return Ok(FallbackOutcome {
                    value,
                    model: model.clone(),
                    index,
                });
            }
            Err(err) => {
                tracing::warn!(model = %model, error = %err, "model failed");
                last_error = Some(err);
            }
        }
    }

    let last = last_error.unwrap_or(CompletionError::Transport(
        "no models configured for request".to_string(),
    ));
    tracing::error!(attempted = ?models, error = %last, "all completion models failed");
    Err(CompletionError::AllModelsFailed {
        attempted: models.to_vec(),
        last: Box::new(last),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn failure(model: &str) -> CompletionError {
        CompletionError::RetriesExhausted {
            attempts: 4,
            last: Box::new(CompletionError::Status {
                status: 500,
                detail: format!("{model} down"),
            }),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_primary_success_skips_fallbacks() {
        let models = chain(&["A", "B", "C"]);
        let outcome = run_fallback_chain(&models, Duration::from_millis(500), |model| async move {
            if model == "A" {
                Ok(format!("answer from {model}"))
            } else {
                panic!("fallback should not be consulted");
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, "answer from A");
        assert_eq!(outcome.model, "A");
        assert!(!outcome.used_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_chain_falls_through_to_last() {
        let models = chain(&["A", "B", "C"]);
        let outcome = run_fallback_chain(&models, Duration::from_millis(500), |model| async move {
            if model == "C" {
                Ok(format!("answer from {model}"))
            } else {
                Err(failure(&model))
            }
        })
        .await
        .unwrap();

        assert_eq!(outcome.value, "answer from C");
        assert_eq!(outcome.model, "C");
        assert_eq!(outcome.index, 2);
        assert!(outcome.used_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_models_fail() {
        let models = chain(&["A", "B"]);
        let err = run_fallback_chain::<String, _, _>(
            &models,
            Duration::from_millis(500),
            |model| async move { Err(failure(&model)) },
        )
        .await
        .unwrap_err();

        match err {
            CompletionError::AllModelsFailed { attempted, last } => {
                assert_eq!(attempted, models);
                assert!(last.to_string().contains("B down"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_chain_fails() {
        let err = run_fallback_chain::<String, _, _>(&[], Duration::ZERO, |_| async move {
            Ok("never".to_string())
        })
        .await
        .unwrap_err();

        assert!(matches!(err, CompletionError::AllModelsFailed { .. }));
    }
}
