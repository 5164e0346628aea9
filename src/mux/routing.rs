//! Routing table: type name → owning backend
//!
//! Built once from the ordered backend handles and never mutated. A name may
//! be claimed by at most one backend per namespace; the first collision
//! aborts the build.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt;

use crate::backend::{BackendHandle, BackendId};
use crate::{Error, Result};

/// Namespace a type name is declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Managed resource types
    Resource,
    /// Data source types
    DataSource,
    /// Provider-defined functions
    Function,
    /// Ephemeral resource types
    EphemeralResource,
}

impl Namespace {
    /// Every namespace, in routing-table build order
    pub const ALL: [Self; 4] = [
        Self::Resource,
        Self::DataSource,
        Self::Function,
        Self::EphemeralResource,
    ];

    /// Human-readable name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Resource => "resource",
            Self::DataSource => "data source",
            Self::Function => "function",
            Self::EphemeralResource => "ephemeral resource",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable mapping from type name to owning backend, per namespace
#[derive(Debug, Clone, Default)]
pub struct RoutingTable {
    resources: HashMap<String, BackendId>,
    data_sources: HashMap<String, BackendId>,
    functions: HashMap<String, BackendId>,
    ephemeral_resources: HashMap<String, BackendId>,
}

impl RoutingTable {
    /// Build the table from handles in ordinal order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateTypeClaim`] for the first name claimed by
    /// two backends in the same namespace.
    pub fn build(handles: &[BackendHandle]) -> Result<Self> {
        let mut table = Self::default();

        for namespace in Namespace::ALL {
            let routes = table.routes_mut(namespace);
            for handle in handles {
                for name in handle.declared_names(namespace) {
                    match routes.entry(name.to_string()) {
                        Entry::Occupied(existing) => {
                            return Err(Error::DuplicateTypeClaim {
                                namespace,
                                type_name: name.to_string(),
                                first: *existing.get(),
                                second: handle.id(),
                            });
                        }
                        Entry::Vacant(slot) => {
                            slot.insert(handle.id());
                        }
                    }
                }
            }
        }

        Ok(table)
    }

    /// Backend owning `type_name`, if any
    #[must_use]
    pub fn owner(&self, namespace: Namespace, type_name: &str) -> Option<BackendId> {
        self.routes(namespace).get(type_name).copied()
    }

    /// Backend owning `type_name`
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnroutableType`] if no backend declared the name.
    pub fn route(&self, namespace: Namespace, type_name: &str) -> Result<BackendId> {
        self.owner(namespace, type_name)
            .ok_or_else(|| Error::UnroutableType {
                namespace,
                type_name: type_name.to_string(),
            })
    }

    /// All routes in `namespace`, sorted by type name
    #[must_use]
    pub fn entries(&self, namespace: Namespace) -> Vec<(&str, BackendId)> {
        let mut entries: Vec<_> = self
            .routes(namespace)
            .iter()
            .map(|(name, id)| (name.as_str(), *id))
            .collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Total number of routed names across all namespaces
    #[must_use]
    pub fn len(&self) -> usize {
        Namespace::ALL
            .iter()
            .map(|ns| self.routes(*ns).len())
            .sum()
    }

    /// Returns `true` if no backend declared anything
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn routes(&self, namespace: Namespace) -> &HashMap<String, BackendId> {
        match namespace {
            Namespace::Resource => &self.resources,
            Namespace::DataSource => &self.data_sources,
            Namespace::Function => &self.functions,
            Namespace::EphemeralResource => &self.ephemeral_resources,
        }
    }

    fn routes_mut(&mut self, namespace: Namespace) -> &mut HashMap<String, BackendId> {
        match namespace {
            Namespace::Resource => &mut self.resources,
            Namespace::DataSource => &mut self.data_sources,
            Namespace::Function => &mut self.functions,
            Namespace::EphemeralResource => &mut self.ephemeral_resources,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;

    use crate::testing::TestServer;

    fn handle(index: usize, server: TestServer) -> BackendHandle {
        let schema = server.schema().clone();
        BackendHandle::new(BackendId::new(index), Arc::new(server), schema)
    }

    #[test]
    fn disjoint_names_route_to_declaring_backend() {
        // GIVEN: three backends with disjoint declarations
        let handles = vec![
            handle(0, TestServer::new().with_resource("a_thing").with_function("a_fn")),
            handle(1, TestServer::new().with_data_source("b_lookup")),
            handle(
                2,
                TestServer::new()
                    .with_resource("c_thing")
                    .with_ephemeral_resource("c_secret"),
            ),
        ];

        // WHEN: building the table
        let table = RoutingTable::build(&handles).unwrap();

        // THEN: every name routes to its declaring backend
        assert_eq!(table.owner(Namespace::Resource, "a_thing"), Some(BackendId::new(0)));
        assert_eq!(table.owner(Namespace::Function, "a_fn"), Some(BackendId::new(0)));
        assert_eq!(table.owner(Namespace::DataSource, "b_lookup"), Some(BackendId::new(1)));
        assert_eq!(table.owner(Namespace::Resource, "c_thing"), Some(BackendId::new(2)));
        assert_eq!(
            table.owner(Namespace::EphemeralResource, "c_secret"),
            Some(BackendId::new(2))
        );
        assert_eq!(table.len(), 5);
    }

    #[test]
    fn same_name_in_different_namespaces_is_allowed() {
        let handles = vec![
            handle(0, TestServer::new().with_resource("example")),
            handle(1, TestServer::new().with_data_source("example")),
        ];

        let table = RoutingTable::build(&handles).unwrap();

        assert_eq!(table.owner(Namespace::Resource, "example"), Some(BackendId::new(0)));
        assert_eq!(table.owner(Namespace::DataSource, "example"), Some(BackendId::new(1)));
    }

    #[test]
    fn duplicate_name_fails_with_both_ordinals() {
        let handles = vec![
            handle(0, TestServer::new().with_resource("shared")),
            handle(1, TestServer::new().with_resource("other")),
            handle(2, TestServer::new().with_resource("shared")),
        ];

        let err = RoutingTable::build(&handles).unwrap_err();

        match err {
            Error::DuplicateTypeClaim {
                namespace,
                type_name,
                first,
                second,
            } => {
                assert_eq!(namespace, Namespace::Resource);
                assert_eq!(type_name, "shared");
                assert_eq!(first, BackendId::new(0));
                assert_eq!(second, BackendId::new(2));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn first_conflict_in_namespace_order_is_reported() {
        // Resources are checked before functions, so the resource clash wins.
        let handles = vec![
            handle(0, TestServer::new().with_function("f").with_resource("r")),
            handle(1, TestServer::new().with_function("f").with_resource("r")),
        ];

        let err = RoutingTable::build(&handles).unwrap_err();

        assert!(matches!(
            err,
            Error::DuplicateTypeClaim { namespace: Namespace::Resource, ref type_name, .. }
                if type_name == "r"
        ));
    }

    #[test]
    fn duplicate_function_name_detected() {
        let handles = vec![
            handle(0, TestServer::new().with_function("parse")),
            handle(1, TestServer::new().with_function("parse")),
        ];

        let err = RoutingTable::build(&handles).unwrap_err();
        assert!(err.to_string().contains("function type \"parse\""));
    }

    #[test]
    fn route_unknown_name_is_unroutable() {
        let table = RoutingTable::build(&[handle(0, TestServer::new().with_resource("a"))]).unwrap();

        let err = table.route(Namespace::Resource, "missing").unwrap_err();
        assert!(matches!(err, Error::UnroutableType { namespace: Namespace::Resource, .. }));

        // Declared as a resource, not as a data source.
        assert!(table.route(Namespace::DataSource, "a").is_err());
    }

    #[test]
    fn entries_are_sorted() {
        let handles = vec![
            handle(0, TestServer::new().with_resource("zeta")),
            handle(1, TestServer::new().with_resource("alpha")),
        ];

        let table = RoutingTable::build(&handles).unwrap();

        assert_eq!(
            table.entries(Namespace::Resource),
            vec![("alpha", BackendId::new(1)), ("zeta", BackendId::new(0))]
        );
    }

    #[test]
    fn empty_backends_build_empty_table() {
        let table = RoutingTable::build(&[]).unwrap();
        assert!(table.is_empty());
    }
}
