//! Ordered, name-keyed interceptor registry.

use std::fmt;
use std::sync::Arc;

use crate::Interceptor;

/// Interceptors keyed by name, iterated in insertion order.
///
/// Cloning is shallow: the interceptors themselves are shared.
#[derive(Clone, Default)]
pub struct InterceptorRegistry {
    entries: Vec<(String, Arc<dyn Interceptor>)>,
}

impl InterceptorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert, replace or remove an interceptor.
    ///
    /// `None` removes the entry. Replacing keeps the position of the first
    /// insertion; new names are appended.
    pub fn add_or_replace(&mut self, name: impl Into<String>, interceptor: Option<Arc<dyn Interceptor>>) {
        let name = name.into();
        let position = self.entries.iter().position(|(n, _)| *n == name);
        match (position, interceptor) {
            (Some(index), Some(interceptor)) => self.entries[index].1 = interceptor,
            (Some(index), None) => {
                self.entries.remove(index);
            }
            (None, Some(interceptor)) => self.entries.push((name, interceptor)),
            (None, None) => {}
        }
    }

    /// Get an interceptor by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Interceptor>> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, interceptor)| interceptor)
    }

    /// Check whether a name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Interceptors in registry order.
    pub fn values(&self) -> impl Iterator<Item = &Arc<dyn Interceptor>> {
        self.entries.iter().map(|(_, interceptor)| interceptor)
    }

    /// Names and interceptors in registry order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Interceptor>)> {
        self.entries
            .iter()
            .map(|(name, interceptor)| (name.as_str(), interceptor))
    }

    /// Registered names in registry order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of registered interceptors.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no interceptors are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for InterceptorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Request, RequestBuilder};

    struct Tag(&'static str);

    impl Interceptor for Tag {
        fn before(&self, builder: &mut RequestBuilder, _request: &Request) {
            builder.header("X-Tag", self.0);
        }
    }

    fn tag(value: &'static str) -> Option<Arc<dyn Interceptor>> {
        Some(Arc::new(Tag(value)))
    }

    #[test]
    fn test_insertion_order() {
        let mut registry = InterceptorRegistry::new();
        registry.add_or_replace("auth", tag("a"));
        registry.add_or_replace("retry", tag("b"));
        registry.add_or_replace("logging", tag("c"));

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["auth", "retry", "logging"]);
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut registry = InterceptorRegistry::new();
        registry.add_or_replace("auth", tag("a"));
        registry.add_or_replace("retry", tag("b"));
        registry.add_or_replace("auth", tag("z"));

        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["auth", "retry"]);

        let mut builder = Request::builder();
        builder.uri("https://api.example.com");
        let request = builder.build().unwrap();
        for interceptor in registry.values() {
            interceptor.before(&mut builder, &request);
        }
        assert_eq!(builder.build().unwrap().header_values("x-tag"), vec!["z", "b"]);
    }

    #[test]
    fn test_absent_removes() {
        let mut registry = InterceptorRegistry::new();
        registry.add_or_replace("auth", tag("a"));
        registry.add_or_replace("retry", tag("b"));
        registry.add_or_replace("auth", None);
        registry.add_or_replace("missing", None);

        assert!(!registry.contains("auth"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["retry"]);

        registry.add_or_replace("auth", tag("a"));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["retry", "auth"]);
    }

    #[test]
    fn test_clone_is_a_snapshot() {
        let mut registry = InterceptorRegistry::new();
        registry.add_or_replace("auth", tag("a"));
        let snapshot = registry.clone();
        registry.add_or_replace("auth", None);

        assert!(snapshot.contains("auth"));
        assert!(registry.is_empty());
        assert_eq!(format!("{:?}", snapshot), r#"["auth"]"#);
    }
}
