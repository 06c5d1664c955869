use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::KeyValue;

/// Environment overlay passed to a single invocation.
///
/// Stored as an ordered list of pairs; serialized as a JSON object (`{"NAME": "value"}`).
/// Non-string JSON values are accepted on input and rendered as compact JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Env(Vec<KeyValue>);

impl Env {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValue> {
        self.0.iter()
    }

    /// Get the value for a key, returning the last matching entry.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|kv| kv.key() == key)
            .map(|kv| kv.value())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|kv| kv.key() == key)
    }

    /// Append a key–value pair. Later entries override earlier ones in [`Env::get`].
    pub fn push<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.0.push(KeyValue::new(key, value));
    }

    /// Append a pair only when no entry with that name exists yet.
    ///
    /// Returns `true` when the pair was added.
    pub fn push_if_absent<K, V>(&mut self, key: K, value: V) -> bool
    where
        K: Into<String>,
        V: Into<String>,
    {
        let key = key.into();
        if self.contains(&key) {
            return false;
        }
        self.0.push(KeyValue::new(key, value));
        true
    }

    /// Merge two environments, where entries from `other` override earlier ones.
    pub fn merged(&self, other: &Env) -> Env {
        let mut out = self.0.clone();
        out.extend(other.0.iter().cloned());
        Env(out)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Env {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Env(iter.into_iter().map(|(k, v)| KeyValue::new(k, v)).collect())
    }
}

impl Serialize for Env {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for kv in &self.0 {
            map.serialize_entry(kv.key(), kv.value())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Env {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EnvVisitor;

        impl<'de> Visitor<'de> for EnvVisitor {
            type Value = Env;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an object of environment variables")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Env, A::Error> {
                let mut env = Env::new();
                while let Some((key, value)) = access.next_entry::<String, serde_json::Value>()? {
                    let value = match value {
                        serde_json::Value::String(s) => s,
                        serde_json::Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    env.push(key, value);
                }
                Ok(env)
            }

            fn visit_unit<E>(self) -> Result<Env, E> {
                Ok(Env::new())
            }
        }

        deserializer.deserialize_any(EnvVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::Env;

    #[test]
    fn env_push_and_override_last_wins() {
        let mut env = Env::new();
        env.push("FOO", "one");
        env.push("BAR", "x");
        env.push("FOO", "two");

        assert_eq!(env.get("FOO"), Some("two"));
        assert_eq!(env.get("BAR"), Some("x"));
        assert!(env.get("BAZ").is_none());
    }

    #[test]
    fn push_if_absent_keeps_existing_entry() {
        let mut env = Env::new();
        env.push("FOO", "configured");

        assert!(!env.push_if_absent("FOO", "mapped"));
        assert!(env.push_if_absent("BAR", "mapped"));

        assert_eq!(env.get("FOO"), Some("configured"));
        assert_eq!(env.get("BAR"), Some("mapped"));
        assert_eq!(env.len(), 2);
    }

    #[test]
    fn env_merged_other_overrides_base() {
        let base: Env = [("FOO", "base"), ("BAR", "bar")].into_iter().collect();
        let other: Env = [("FOO", "override")].into_iter().collect();

        let merged = base.merged(&other);
        assert_eq!(merged.get("FOO"), Some("override"));
        assert_eq!(merged.get("BAR"), Some("bar"));
    }

    #[test]
    fn deserializes_from_object_and_stringifies_scalars() {
        let env: Env = serde_json::from_str(r#"{"A":"x","N":5,"B":true}"#).unwrap();
        assert_eq!(env.get("A"), Some("x"));
        assert_eq!(env.get("N"), Some("5"));
        assert_eq!(env.get("B"), Some("true"));

        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["N"], "5");
    }
}
