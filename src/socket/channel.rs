use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use super::rule::{Anonymous, Identifier, Rule};

/// A named broadcasting channel guarded by subscription rules.
#[derive(Clone)]
pub struct Channel {
    name: String,
    rules: Vec<Arc<dyn Rule>>,
    identifier: Arc<dyn Identifier>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), rules: Vec::new(), identifier: Arc::new(Anonymous) }
    }

    pub fn rule(mut self, rule: impl Rule) -> Self {
        self.rules.push(Arc::new(rule));
        self
    }

    pub fn identifier(mut self, identifier: impl Identifier) -> Self {
        self.identifier = Arc::new(identifier);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// The room of `identity` inside this channel.
    pub fn personal(&self, identity: &str) -> String {
        format!("{}{identity}", self.name)
    }

    /// Evaluates every rule concurrently; a client is admitted when all pass.
    pub async fn admits(&self, data: &Value) -> bool {
        join_all(self.rules.iter().map(|rule| rule.eval(data)))
            .await
            .into_iter()
            .all(|passed| passed)
    }

    pub async fn resolve_identity(&self, data: &Value) -> String {
        self.identifier.resolve_identity(data).await
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("rules", &self.rules.iter().map(|r| r.name()).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Shorthand for a channel with `rules` and no identifier.
pub fn channel(name: impl Into<String>, rules: Vec<Arc<dyn Rule>>) -> Channel {
    Channel { rules, ..Channel::new(name) }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::socket::rule::HookError;

    struct Fixed(bool);

    #[async_trait]
    impl Rule for Fixed {
        async fn predicate(&self, _body: &Value) -> Result<bool, HookError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn channel_without_rules_admits_everyone() {
        assert!(Channel::new("news").admits(&json!(null)).await);
    }

    #[tokio::test]
    async fn every_rule_must_pass() {
        let open = channel("news", vec![Arc::new(Fixed(true)), Arc::new(Fixed(true))]);
        let closed = Channel::new("admin").rule(Fixed(true)).rule(Fixed(false));

        assert!(open.admits(&json!({})).await);
        assert!(!closed.admits(&json!({})).await);
    }
}
