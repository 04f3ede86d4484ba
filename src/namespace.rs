use std::cmp::Reverse;

use tracing::{debug, trace};

use crate::context;
use crate::types::NamespaceBinding;

/// Default number of ambient namespace frames inspected by
/// [`NamespaceResolver::find_namespace_connection_name`].
pub const DEFAULT_SEARCH_DEPTH: usize = 7;

/// Default namespace separator, matching `module_path!()`.
pub const DEFAULT_SEPARATOR: &str = "::";

/// Maps namespaces (module paths) to connection names.
pub trait NamespaceResolver: Send + Sync {
    /// Bind a namespace prefix to a connection name, replacing any previous
    /// binding for the same prefix.
    fn add_namespace_connection(&mut self, namespace: &str, connection_name: &str);

    /// Connection name for the most specific prefix matching `namespace`.
    fn namespace_connection(&self, namespace: &str) -> Option<String>;

    /// Connection name for the innermost ambient namespace frame that has a
    /// binding. See [`crate::context`].
    fn find_namespace_connection_name(&self) -> Option<String>;
}

/// Prefix table kept sorted by descending specificity (separator count), so
/// the first matching prefix during a scan is also the most specific one.
#[derive(Clone, Debug)]
pub struct NamespaceConnections {
    bindings: Vec<NamespaceBinding>,
    separator: String,
    search_depth: usize,
}

impl Default for NamespaceConnections {
    fn default() -> Self {
        Self {
            bindings: Vec::new(),
            separator: DEFAULT_SEPARATOR.to_string(),
            search_depth: DEFAULT_SEARCH_DEPTH,
        }
    }
}

impl NamespaceConnections {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from `(namespace, connection)` pairs using the default
    /// separator.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        Self::new().with_bindings(pairs)
    }

    /// Change the separator. Existing bindings are re-normalized and
    /// re-sorted with the new separator.
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        let separator = separator.into();
        if separator.is_empty() {
            debug!(separator = %self.separator, "ignoring empty namespace separator");
        } else {
            self.separator = separator;
            let bindings = std::mem::take(&mut self.bindings);
            for binding in bindings {
                self.upsert(&binding.namespace, binding.connection);
            }
            self.sort();
        }
        self
    }

    pub fn with_search_depth(mut self, search_depth: usize) -> Self {
        self.search_depth = search_depth;
        self
    }

    pub fn with_bindings<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (namespace, connection) in pairs {
            self.upsert(namespace.as_ref(), connection.as_ref().to_string());
        }
        self.sort();
        self
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn search_depth(&self) -> usize {
        self.search_depth
    }

    pub fn set_search_depth(&mut self, search_depth: usize) {
        self.search_depth = search_depth;
    }

    /// Bindings in lookup order.
    pub fn bindings(&self) -> &[NamespaceBinding] {
        &self.bindings
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Strip leading and trailing separators.
    pub fn normalize<'a>(&self, namespace: &'a str) -> &'a str {
        namespace
            .trim_start_matches(self.separator.as_str())
            .trim_end_matches(self.separator.as_str())
    }

    fn specificity(&self, namespace: &str) -> usize {
        namespace.matches(self.separator.as_str()).count()
    }

    fn upsert(&mut self, namespace: &str, connection: String) {
        let namespace = self.normalize(namespace);
        match self.bindings.iter_mut().find(|b| b.namespace == namespace) {
            Some(binding) => binding.connection = connection,
            None => self.bindings.push(NamespaceBinding {
                namespace: namespace.to_string(),
                connection,
            }),
        }
    }

    fn sort(&mut self) {
        // Stable: ties keep insertion order.
        let separator = self.separator.as_str();
        self.bindings
            .sort_by_key(|b| Reverse(b.namespace.matches(separator).count()));
    }
}

impl NamespaceResolver for NamespaceConnections {
    fn add_namespace_connection(&mut self, namespace: &str, connection_name: &str) {
        self.upsert(namespace, connection_name.to_string());
        self.sort();
        debug!(
            namespace = self.normalize(namespace),
            connection = connection_name,
            specificity = self.specificity(self.normalize(namespace)),
            "namespace connection registered"
        );
    }

    fn namespace_connection(&self, namespace: &str) -> Option<String> {
        let namespace = self.normalize(namespace);
        let binding = self
            .bindings
            .iter()
            .find(|b| namespace.starts_with(b.namespace.as_str()))?;
        // An empty connection name masks less specific prefixes.
        if binding.connection.is_empty() {
            trace!(namespace, prefix = %binding.namespace, "namespace bound to no connection");
            return None;
        }
        trace!(namespace, prefix = %binding.namespace, connection = %binding.connection, "namespace matched");
        Some(binding.connection.clone())
    }

    fn find_namespace_connection_name(&self) -> Option<String> {
        for frame in context::current_frames(self.search_depth) {
            if let Some(connection) = self.namespace_connection(&frame) {
                return Some(connection);
            }
        }
        trace!(depth = self.search_depth, "no namespace frame matched");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{enter_namespace, with_namespace};

    fn backslash() -> NamespaceConnections {
        NamespaceConnections::new().with_separator("\\")
    }

    #[test]
    fn more_specific_prefix_wins_in_any_order() {
        let mut forward = NamespaceConnections::new();
        forward.add_namespace_connection("app::models", "short");
        forward.add_namespace_connection("app::models::billing", "long");

        let mut backward = NamespaceConnections::new();
        backward.add_namespace_connection("app::models::billing", "long");
        backward.add_namespace_connection("app::models", "short");

        for table in [&forward, &backward] {
            assert_eq!(
                table.namespace_connection("app::models::billing::Invoice").as_deref(),
                Some("long")
            );
            assert_eq!(
                table.namespace_connection("app::models::User").as_deref(),
                Some("short")
            );
        }
    }

    #[test]
    fn separators_are_trimmed_on_both_sides() {
        let mut table = backslash();
        table.add_namespace_connection("\\A\\B\\", "ab");
        assert_eq!(table.bindings()[0].namespace, "A\\B");
        assert_eq!(table.namespace_connection("A\\B\\C").as_deref(), Some("ab"));
        assert_eq!(table.namespace_connection("\\A\\B\\C\\").as_deref(), Some("ab"));

        let mut table = NamespaceConnections::new();
        table.add_namespace_connection("::A::B::", "ab");
        assert_eq!(table.namespace_connection("A::B::C").as_deref(), Some("ab"));
    }

    #[test]
    fn catch_all_has_lowest_priority() {
        let mut table = NamespaceConnections::new();
        table.add_namespace_connection("", "fallback");
        table.add_namespace_connection("app", "app");
        table.add_namespace_connection("app::admin", "admin");

        assert_eq!(table.bindings().last().unwrap().namespace, "");
        assert_eq!(table.namespace_connection("other::thing").as_deref(), Some("fallback"));
        assert_eq!(table.namespace_connection("app::x").as_deref(), Some("app"));
        assert_eq!(table.namespace_connection("app::admin::x").as_deref(), Some("admin"));
    }

    #[test]
    fn upsert_replaces_existing_prefix() {
        let mut table = NamespaceConnections::new();
        table.add_namespace_connection("app", "first");
        table.add_namespace_connection("::app::", "second");
        assert_eq!(table.len(), 1);
        assert_eq!(table.namespace_connection("app").as_deref(), Some("second"));
    }

    #[test]
    fn ties_keep_insertion_order() {
        let table = NamespaceConnections::from_pairs([
            ("a::x", "ax"),
            ("b", "b"),
            ("a::y", "ay"),
            ("a", "a"),
        ]);
        let order: Vec<_> = table.bindings().iter().map(|b| b.namespace.as_str()).collect();
        assert_eq!(order, vec!["a::x", "a::y", "b", "a"]);
    }

    #[test]
    fn prefix_match_is_literal() {
        let table = NamespaceConnections::from_pairs([("app::App1", "one")]);
        assert_eq!(table.namespace_connection("app::App10").as_deref(), Some("one"));
        assert!(table.namespace_connection("app::App2").is_none());
    }

    #[test]
    fn empty_connection_is_no_mapping() {
        let table = NamespaceConnections::from_pairs([
            ("app", "main"),
            ("app::legacy", ""),
        ]);
        assert!(table.namespace_connection("app::legacy::Model").is_none());
        assert_eq!(table.namespace_connection("app::Model").as_deref(), Some("main"));
    }

    #[test]
    fn changing_separator_renormalizes() {
        let table = NamespaceConnections::from_pairs([("\\A\\B\\", "ab"), ("\\A", "a")])
            .with_separator("\\");
        let order: Vec<_> = table.bindings().iter().map(|b| b.namespace.as_str()).collect();
        assert_eq!(order, vec!["A\\B", "A"]);
    }

    #[test]
    fn empty_separator_keeps_current_one() {
        let table = NamespaceConnections::from_pairs([("a::b", "ab")]).with_separator("");
        assert_eq!(table.separator(), DEFAULT_SEPARATOR);
        assert_eq!(table.namespace_connection("a::b::c").as_deref(), Some("ab"));
    }

    #[test]
    fn find_uses_innermost_bound_frame() {
        let table = NamespaceConnections::from_pairs([
            ("tenant_a", "conn_a"),
            ("tenant_b", "conn_b"),
        ]);
        let _outer = enter_namespace("tenant_a::service");
        let _unbound = enter_namespace("shared::util");
        assert_eq!(table.find_namespace_connection_name().as_deref(), Some("conn_a"));

        let found = with_namespace("tenant_b::handler", || table.find_namespace_connection_name());
        assert_eq!(found.as_deref(), Some("conn_b"));
    }

    #[test]
    fn find_respects_search_depth() {
        let table = NamespaceConnections::from_pairs([("tenant", "conn")]).with_search_depth(2);
        let _bound = enter_namespace("tenant::entry");
        let _a = enter_namespace("lib::a");
        assert_eq!(table.find_namespace_connection_name().as_deref(), Some("conn"));

        let _b = enter_namespace("lib::b");
        assert!(table.find_namespace_connection_name().is_none());
    }

    #[test]
    fn find_without_frames_is_none() {
        let table = NamespaceConnections::from_pairs([("", "anything")]);
        assert!(table.find_namespace_connection_name().is_none());
    }
}
