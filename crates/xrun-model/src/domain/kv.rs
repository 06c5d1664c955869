use serde::{Deserialize, Serialize};

/// Single environment variable of an invocation overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    key: String,
    value: String,
}

impl KeyValue {
    /// Create a new key–value pair.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Render as `NAME=value`.
    pub fn to_assignment(&self) -> String {
        format!("{}={}", self.key, self.value)
    }
}

impl From<(&str, &str)> for KeyValue {
    fn from((key, value): (&str, &str)) -> Self {
        Self::new(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::KeyValue;

    #[test]
    fn assignment_renders_name_equals_value() {
        let kv = KeyValue::new("FOO", "bar baz");
        assert_eq!(kv.to_assignment(), "FOO=bar baz");
    }

    #[test]
    fn from_str_tuple_creates_keyvalue() {
        let kv: KeyValue = ("FOO", "bar").into();
        assert_eq!(kv.key(), "FOO");
        assert_eq!(kv.value(), "bar");
    }
}
