use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, warn};

/// The failure type of rule and identifier hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// A subscription rule: decides whether a client may join a channel, given
/// the data it subscribed with.
///
/// Implement [`body`](Rule::body) to extract and check what the rule needs,
/// and [`predicate`](Rule::predicate) to decide. Evaluate through
/// [`eval`](#method.eval).
#[async_trait]
pub trait Rule: Send + Sync + 'static {
    fn name(&self) -> &str {
        "BaseRule"
    }

    async fn body(&self, data: &Value) -> Result<Value, HookError> {
        Ok(data.clone())
    }

    async fn predicate(&self, _body: &Value) -> Result<bool, HookError> {
        Ok(true)
    }

    /// Whether the evaluation steps are logged.
    async fn debug(&self) -> bool {
        false
    }
}

impl dyn Rule {
    /// Runs `body` then `predicate`. Any failure evaluates to `false`.
    pub async fn eval(&self, data: &Value) -> bool {
        let debugging = self.debug().await;
        let outcome = async {
            let body = self.body(data).await?;
            if debugging {
                debug!(rule = self.name(), %body, "body evaluation returned");
            }
            self.predicate(&body).await
        }
        .await;

        match outcome {
            Ok(result) => {
                if debugging {
                    debug!(rule = self.name(), result, "evaluation returned");
                }
                result
            }
            Err(e) => {
                if debugging {
                    debug!(rule = self.name(), error = %e, "exception raised while evaluating, evaluation returned false");
                }
                false
            }
        }
    }
}

/// Resolves the identity of a subscribing client, which names its personal
/// part of a channel. An empty identity means no personal part.
#[async_trait]
pub trait Identifier: Send + Sync + 'static {
    async fn body(&self, data: &Value) -> Result<Value, HookError> {
        Ok(data.clone())
    }

    async fn identify(&self, _body: &Value) -> String {
        String::new()
    }
}

impl dyn Identifier {
    /// Runs `body` then `identify`. A failing body resolves to no identity.
    pub async fn resolve_identity(&self, data: &Value) -> String {
        match self.body(data).await {
            Ok(body) => self.identify(&body).await,
            Err(e) => {
                warn!(error = %e, "identifier body failed, client joins without identity");
                String::new()
            }
        }
    }
}

/// Never resolves an identity.
#[derive(Clone, Copy, Debug, Default)]
pub struct Anonymous;

impl Identifier for Anonymous {}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct HasToken;

    #[async_trait]
    impl Rule for HasToken {
        async fn body(&self, data: &Value) -> Result<Value, HookError> {
            data.get("token").cloned().ok_or_else(|| "missing token".into())
        }

        async fn predicate(&self, token: &Value) -> Result<bool, HookError> {
            Ok(token == "secret")
        }

        async fn debug(&self) -> bool {
            true
        }
    }

    struct ByUser;

    #[async_trait]
    impl Identifier for ByUser {
        async fn identify(&self, body: &Value) -> String {
            body["user"].as_str().unwrap_or_default().to_owned()
        }
    }

    #[tokio::test]
    async fn eval_runs_body_then_predicate() {
        let rule: &dyn Rule = &HasToken;
        assert!(rule.eval(&json!({ "token": "secret" })).await);
        assert!(!rule.eval(&json!({ "token": "guess" })).await);
    }

    #[tokio::test]
    async fn failing_body_evaluates_to_false() {
        let rule: &dyn Rule = &HasToken;
        assert!(!rule.eval(&json!({})).await);
    }

    #[tokio::test]
    async fn identities_resolve_from_the_body() {
        let identifier: &dyn Identifier = &ByUser;
        assert_eq!(identifier.resolve_identity(&json!({ "user": "42" })).await, "42");

        let anonymous: &dyn Identifier = &Anonymous;
        assert_eq!(anonymous.resolve_identity(&json!({ "user": "42" })).await, "");
    }
}
