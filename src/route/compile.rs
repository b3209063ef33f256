use super::{CompiledParameter, ParamType, ParameterLocation, ParameterMeta, RouteMeta};
use crate::dependency::{DependencyGraph, DependencyOverrides, GraphBuilder, RoutePlan};
use crate::error::RegistrationError;
use crate::router::PathTemplate;
use crate::validator::SchemaValidator;
use std::collections::HashSet;
use tracing::{debug, info};

/// A registered route with everything per-request work needs precompiled.
#[derive(Debug)]
pub struct Route {
    pub meta: RouteMeta,
    pub template: PathTemplate,
    /// Declared parameters plus implicit ones for undeclared placeholders
    pub parameters: Vec<CompiledParameter>,
    pub plan: RoutePlan,
    /// True when the body is an object keyed by parameter name
    pub embed_body: bool,
    pub response_validator: Option<SchemaValidator>,
}

impl Route {
    /// `METHOD template`, used in logs and error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{} {}", self.meta.method, self.meta.path_pattern)
    }
}

/// Compile route declarations and the dependency graph they share.
///
/// Placeholders without a matching path parameter get an implicit one typed
/// from the template (`{id:int}`) or as a string.
pub fn compile_routes(
    metas: Vec<RouteMeta>,
    overrides: &DependencyOverrides,
) -> Result<(Vec<Route>, DependencyGraph), RegistrationError> {
    let mut builder = GraphBuilder::new(overrides);
    let mut routes = Vec::with_capacity(metas.len());

    for mut meta in metas {
        let template = PathTemplate::parse(&meta.path_pattern)?;
        let owner = format!("{} {}", meta.method, meta.path_pattern);

        let implicit: Vec<ParameterMeta> = template
            .param_names()
            .filter(|name| {
                let name: &str = name;
                !meta
                    .parameters
                    .iter()
                    .any(|p| p.location == ParameterLocation::Path && p.name == name)
            })
            .map(|name| {
                let kind = template
                    .param_kind(name)
                    .cloned()
                    .unwrap_or(ParamType::String);
                ParameterMeta::path(name.to_string(), kind)
            })
            .collect();
        meta.parameters.extend(implicit);

        let mut declared = HashSet::new();
        let mut parameters = Vec::with_capacity(meta.parameters.len());
        for p in &meta.parameters {
            if !declared.insert((p.location, p.name.clone())) {
                return Err(RegistrationError::DuplicateParameter {
                    owner,
                    name: p.name.clone(),
                    location: p.location.to_string(),
                });
            }
            if p.location == ParameterLocation::Path && !template.has_param(&p.name) {
                return Err(RegistrationError::UnknownPathParameter {
                    route: owner,
                    name: p.name.clone(),
                });
            }
            parameters.push(p.compile(&owner)?);
        }

        let plan = builder.plan(&meta.dependencies)?;

        let mut body_names: HashSet<&str> = HashSet::new();
        let mut embed_requested = false;
        for p in &parameters {
            if p.meta.location == ParameterLocation::Body {
                body_names.insert(&p.meta.name);
                embed_requested |= p.meta.embed;
            }
        }
        for &idx in &plan.reachable {
            for p in builder.node_params(idx) {
                if p.meta.location == ParameterLocation::Path && !template.has_param(&p.meta.name) {
                    return Err(RegistrationError::UnknownPathParameter {
                        route: format!("{owner} (via {})", builder.node_name(idx)),
                        name: p.meta.name.clone(),
                    });
                }
                if p.meta.location == ParameterLocation::Body {
                    body_names.insert(&p.meta.name);
                    embed_requested |= p.meta.embed;
                }
            }
        }
        let embed_body = embed_requested || body_names.len() > 1;
        let body_count = body_names.len();

        let response_validator = match &meta.response.schema {
            Some(schema) => Some(SchemaValidator::compile(schema).map_err(|reason| {
                RegistrationError::InvalidSchema {
                    owner: format!("{owner} response"),
                    reason,
                }
            })?),
            None => None,
        };

        debug!(
            route = %owner,
            handler_name = %meta.handler_name,
            params = parameters.len(),
            dependencies = plan.reachable_count(),
            body_params = body_count,
            embed_body,
            "Route compiled"
        );
        routes.push(Route {
            meta,
            template,
            parameters,
            plan,
            embed_body,
            response_validator,
        });
    }

    let graph = builder.finish();
    info!(
        routes = routes.len(),
        dependency_nodes = graph.len(),
        "Routes compiled"
    );
    Ok((routes, graph))
}
