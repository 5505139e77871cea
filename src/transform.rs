//! Transforms: rules that morph one representation into another before it
//! is sent to clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Either a single item or a collection of items.
///
/// Serializes transparently as the item or as an array.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> From<Vec<T>> for OneOrMany<T> {
    fn from(items: Vec<T>) -> Self {
        Self::Many(items)
    }
}

/// A transformer rule.
///
/// Only [`morph`](Transform::morph) is meant to be implemented; the other
/// methods apply it.
///
/// ```rust
/// use gantry::transform::{OneOrMany, Transform};
/// use serde_json::{Value, json};
///
/// struct PublicUser;
///
/// impl Transform for PublicUser {
///     type Input = Value;
///     type Output = Value;
///
///     fn morph(&self, user: Value) -> Value {
///         json!({ "id": user["id"], "name": user["name"] })
///     }
/// }
///
/// let out = PublicUser.arbitrary(OneOrMany::One(json!({ "id": 1, "name": "ada", "password": "x" })));
/// assert_eq!(out, OneOrMany::One(json!({ "id": 1, "name": "ada" })));
/// ```
pub trait Transform: Send + Sync {
    type Input;
    type Output: Serialize;

    fn morph(&self, input: Self::Input) -> Self::Output;

    fn item(&self, item: Self::Input) -> Self::Output {
        self.morph(item)
    }

    fn collection(&self, collection: Vec<Self::Input>) -> Vec<Self::Output> {
        collection.into_iter().map(|item| self.morph(item)).collect()
    }

    /// A single input becomes an item, a collection stays a collection.
    fn arbitrary(&self, input: OneOrMany<Self::Input>) -> OneOrMany<Self::Output> {
        match input {
            OneOrMany::One(item) => OneOrMany::One(self.item(item)),
            OneOrMany::Many(items) => OneOrMany::Many(self.collection(items)),
        }
    }
}

/// Returns its input unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl Transform for Identity {
    type Input = Value;
    type Output = Value;

    fn morph(&self, input: Value) -> Value {
        input
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    struct Upper;

    impl Transform for Upper {
        type Input = &'static str;
        type Output = String;

        fn morph(&self, input: &'static str) -> String {
            input.to_uppercase()
        }
    }

    #[test]
    fn arbitrary_dispatches_on_shape() {
        assert_eq!(Upper.arbitrary(OneOrMany::One("a")), OneOrMany::One("A".to_owned()));
        assert_eq!(
            Upper.arbitrary(vec!["a", "b"].into()),
            OneOrMany::Many(vec!["A".to_owned(), "B".to_owned()])
        );
    }

    #[test]
    fn identity_keeps_values() {
        let input = json!({ "id": 1 });
        assert_eq!(Identity.item(input.clone()), input);
    }

    #[test]
    fn one_or_many_serializes_untagged() {
        assert_eq!(serde_json::to_value(OneOrMany::One(1)).unwrap(), json!(1));
        assert_eq!(serde_json::to_value(OneOrMany::Many(vec![1, 2])).unwrap(), json!([1, 2]));
    }
}
