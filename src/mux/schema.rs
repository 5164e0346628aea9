//! Merged schema surface, computed once from the cached backend schemas
//!
//! Schema discovery runs exactly once per backend at construction, so the
//! provider-global schema operations merge the cached responses instead of
//! calling the backends again.

use crate::backend::BackendHandle;
use crate::protocol::{
    DataSourceMetadata, Diagnostic, EphemeralResourceMetadata, FunctionMetadata,
    GetFunctionsResponse, GetMetadataResponse, GetProviderSchemaResponse, ResourceMetadata,
    Schema, ServerCapabilities, rpc,
};

use super::merge::Merge;

const INVALID_COMBINATION: &str = "Invalid Provider Server Combination";

/// Merge every backend's cached schema into one response.
///
/// Type-scoped maps are a disjoint union: the routing table has already
/// rejected duplicates. The provider and provider-meta schemas must agree
/// across backends; disagreement is reported as an error diagnostic.
pub(crate) fn merge_provider_schema(backends: &[BackendHandle]) -> GetProviderSchemaResponse {
    let mut merged = GetProviderSchemaResponse {
        server_capabilities: Some(merge_capabilities(backends)),
        ..GetProviderSchemaResponse::default()
    };
    let mut merge = Merge::new(rpc::GET_PROVIDER_SCHEMA);

    for backend in backends {
        let schema = backend.schema();
        merge.diagnostics(schema.diagnostics.clone());

        if let Some(conflict) = agree(&mut merged.provider, schema.provider.as_ref()) {
            merge.push(Diagnostic::error(
                INVALID_COMBINATION,
                format!(
                    "The combined provider has differing provider schema implementations \
                     across {}. {conflict}",
                    backend.id()
                ),
            ));
        }
        if let Some(conflict) = agree(&mut merged.provider_meta, schema.provider_meta.as_ref()) {
            merge.push(Diagnostic::error(
                INVALID_COMBINATION,
                format!(
                    "The combined provider has differing provider_meta schema implementations \
                     across {}. {conflict}",
                    backend.id()
                ),
            ));
        }

        merged.resource_schemas.extend(
            schema
                .resource_schemas
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged.data_source_schemas.extend(
            schema
                .data_source_schemas
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        merged
            .functions
            .extend(schema.functions.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.ephemeral_resource_schemas.extend(
            schema
                .ephemeral_resource_schemas
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
    }

    // No singleton fields here, so finish cannot fail.
    merged.diagnostics = merge.finish().unwrap_or_default();
    merged
}

/// Derive the metadata response from the merged schema.
pub(crate) fn metadata(schema: &GetProviderSchemaResponse) -> GetMetadataResponse {
    GetMetadataResponse {
        server_capabilities: schema.server_capabilities,
        diagnostics: schema.diagnostics.clone(),
        resources: schema
            .resource_schemas
            .keys()
            .map(|type_name| ResourceMetadata {
                type_name: type_name.clone(),
            })
            .collect(),
        data_sources: schema
            .data_source_schemas
            .keys()
            .map(|type_name| DataSourceMetadata {
                type_name: type_name.clone(),
            })
            .collect(),
        functions: schema
            .functions
            .keys()
            .map(|name| FunctionMetadata { name: name.clone() })
            .collect(),
        ephemeral_resources: schema
            .ephemeral_resource_schemas
            .keys()
            .map(|type_name| EphemeralResourceMetadata {
                type_name: type_name.clone(),
            })
            .collect(),
    }
}

/// Derive the functions response from the merged schema.
pub(crate) fn functions(schema: &GetProviderSchemaResponse) -> GetFunctionsResponse {
    GetFunctionsResponse {
        functions: schema.functions.clone(),
        diagnostics: schema.diagnostics.clone(),
    }
}

/// Capabilities the mux can honour for every routed type.
fn merge_capabilities(backends: &[BackendHandle]) -> ServerCapabilities {
    let caps = || {
        backends
            .iter()
            .map(|b| b.schema().server_capabilities.unwrap_or_default())
    };

    ServerCapabilities {
        plan_destroy: !backends.is_empty() && caps().all(|c| c.plan_destroy),
        get_provider_schema_optional: true,
        move_resource_state: caps().any(|c| c.move_resource_state),
    }
}

/// Record `candidate` as the agreed schema, or describe how it differs.
///
/// Backends that declare no schema, or an empty block, agree with anything.
fn agree(agreed: &mut Option<Schema>, candidate: Option<&Schema>) -> Option<String> {
    let candidate = candidate.filter(|s| !is_empty_schema(s))?;

    match agreed.as_ref() {
        None => {
            *agreed = Some(candidate.clone());
            None
        }
        Some(existing) if existing == candidate => None,
        Some(existing) => Some(format!(
            "Expected schema version {} with block {}, got version {} with block {}.",
            existing.version, existing.block, candidate.version, candidate.block
        )),
    }
}

fn is_empty_schema(schema: &Schema) -> bool {
    schema.version == 0
        && (schema.block.is_null() || schema.block.as_object().is_some_and(|o| o.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use crate::backend::BackendId;
    use crate::protocol::DiagnosticSeverity;
    use crate::testing::TestServer;

    fn handles(servers: Vec<TestServer>) -> Vec<BackendHandle> {
        servers
            .into_iter()
            .enumerate()
            .map(|(index, server)| {
                let schema = server.schema().clone();
                BackendHandle::new(BackendId::new(index), Arc::new(server), schema)
            })
            .collect()
    }

    fn provider_schema(attr: &str) -> Schema {
        Schema::new(1, json!({ "attributes": [{ "name": attr }] }))
    }

    #[test]
    fn union_of_type_maps() {
        let backends = handles(vec![
            TestServer::new().with_resource("a_thing"),
            TestServer::new()
                .with_data_source("b_lookup")
                .with_function("b_fn"),
        ]);

        let merged = merge_provider_schema(&backends);

        assert!(merged.resource_schemas.contains_key("a_thing"));
        assert!(merged.data_source_schemas.contains_key("b_lookup"));
        assert!(merged.functions.contains_key("b_fn"));
        assert!(merged.diagnostics.is_empty());
    }

    #[test]
    fn identical_provider_schemas_agree() {
        let backends = handles(vec![
            TestServer::new().with_provider_schema(provider_schema("region")),
            TestServer::new(),
            TestServer::new().with_provider_schema(provider_schema("region")),
        ]);

        let merged = merge_provider_schema(&backends);

        assert_eq!(merged.provider, Some(provider_schema("region")));
        assert!(merged.diagnostics.is_empty());
    }

    #[test]
    fn differing_provider_schemas_report_error_diagnostic() {
        let backends = handles(vec![
            TestServer::new().with_provider_schema(provider_schema("region")),
            TestServer::new().with_provider_schema(provider_schema("zone")),
        ]);

        let merged = merge_provider_schema(&backends);

        assert_eq!(merged.provider, Some(provider_schema("region")));
        assert_eq!(merged.diagnostics.len(), 1);
        assert_eq!(merged.diagnostics[0].severity, DiagnosticSeverity::Error);
        assert_eq!(merged.diagnostics[0].summary, INVALID_COMBINATION);
        assert!(merged.diagnostics[0].detail.contains("backend 1"));
    }

    #[test]
    fn discovery_warnings_concatenate_in_order() {
        let backends = handles(vec![
            TestServer::new().with_schema_diagnostic(Diagnostic::warning("one", "")),
            TestServer::new(),
            TestServer::new().with_schema_diagnostic(Diagnostic::warning("three", "")),
        ]);

        let merged = merge_provider_schema(&backends);

        let summaries: Vec<_> = merged.diagnostics.iter().map(|d| d.summary.as_str()).collect();
        assert_eq!(summaries, vec!["one", "three"]);
    }

    #[test]
    fn capabilities_merge() {
        let backends = handles(vec![
            TestServer::new().with_capabilities(ServerCapabilities {
                plan_destroy: true,
                get_provider_schema_optional: false,
                move_resource_state: false,
            }),
            TestServer::new().with_capabilities(ServerCapabilities {
                plan_destroy: false,
                get_provider_schema_optional: false,
                move_resource_state: true,
            }),
        ]);

        let caps = merge_provider_schema(&backends).server_capabilities.unwrap();

        assert!(!caps.plan_destroy);
        assert!(caps.get_provider_schema_optional);
        assert!(caps.move_resource_state);
    }

    #[test]
    fn metadata_lists_every_routed_name() {
        let backends = handles(vec![
            TestServer::new().with_resource("a_thing"),
            TestServer::new()
                .with_ephemeral_resource("b_secret")
                .with_function("b_fn"),
        ]);

        let meta = metadata(&merge_provider_schema(&backends));

        assert_eq!(meta.resources, vec![ResourceMetadata { type_name: "a_thing".into() }]);
        assert_eq!(meta.functions, vec![FunctionMetadata { name: "b_fn".into() }]);
        assert_eq!(
            meta.ephemeral_resources,
            vec![EphemeralResourceMetadata { type_name: "b_secret".into() }]
        );
        assert!(meta.data_sources.is_empty());
    }
}
