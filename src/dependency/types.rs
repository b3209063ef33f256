use crate::background::BackgroundTasks;
use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::route::ParameterMeta;
use crate::security::{Credentials, SecurityProvider, SecurityScopes};
use crate::server::RawRequest;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Type-erased value produced by a dependency.
pub type DepValue = Arc<dyn Any + Send + Sync>;

type SyncCallable = dyn Fn(&DependencyArgs) -> Result<DepValue, DispatchError> + Send + Sync;
type SuspendingCallable =
    dyn Fn(DependencyArgs) -> BoxFuture<'static, Result<DepValue, DispatchError>> + Send + Sync;

#[derive(Clone)]
pub(crate) enum Callable {
    Sync(Arc<SyncCallable>),
    Suspending(Arc<SuspendingCallable>),
}

pub(crate) struct DependencyInner {
    pub(crate) name: String,
    pub(crate) callable: Callable,
    pub(crate) parameters: Vec<ParameterMeta>,
    pub(crate) dependencies: Vec<DepRef>,
    pub(crate) scopes: Vec<String>,
    pub(crate) provider: Option<Arc<dyn SecurityProvider>>,
    pub(crate) use_cache: bool,
}

/// Identity of a dependency: the address of its shared allocation.
///
/// Two `Dependency` handles are the same dependency exactly when one was
/// cloned from the other. Names never participate in identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencyId(usize);

/// A reusable callable that handlers and other dependencies can require.
///
/// ```rust
/// use fastroute::dependency::Dependency;
/// use fastroute::route::{ParameterMeta, ParamType};
///
/// #[derive(Debug)]
/// struct Pagination { limit: i64 }
///
/// let pagination = Dependency::sync("pagination", |args| {
///     let limit = args.param("limit").and_then(|v| v.as_i64()).unwrap_or(10);
///     Ok(Pagination { limit })
/// })
/// .param(ParameterMeta::query("limit", ParamType::Integer).optional())
/// .build();
/// assert_eq!(pagination.name(), "pagination");
/// ```
#[derive(Clone)]
pub struct Dependency {
    pub(crate) inner: Arc<DependencyInner>,
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dependency")
            .field("name", &self.inner.name)
            .field("id", &self.id())
            .field("suspending", &self.is_suspending())
            .field("use_cache", &self.inner.use_cache)
            .field("scopes", &self.inner.scopes)
            .finish_non_exhaustive()
    }
}

impl Dependency {
    /// Start building a dependency whose body runs inline.
    pub fn sync<T, F>(name: impl Into<String>, f: F) -> DependencyBuilder
    where
        T: Send + Sync + 'static,
        F: Fn(&DependencyArgs) -> Result<T, DispatchError> + Send + Sync + 'static,
    {
        let callable: Arc<SyncCallable> =
            Arc::new(move |args: &DependencyArgs| f(args).map(|v| Arc::new(v) as DepValue));
        DependencyBuilder::new(name.into(), Callable::Sync(callable))
    }

    /// Start building a dependency whose body is awaited.
    pub fn suspending<T, F, Fut>(name: impl Into<String>, f: F) -> DependencyBuilder
    where
        T: Send + Sync + 'static,
        F: Fn(DependencyArgs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, DispatchError>> + Send + 'static,
    {
        let callable: Arc<SuspendingCallable> = Arc::new(move |args: DependencyArgs| {
            let fut = f(args);
            async move { fut.await.map(|v| Arc::new(v) as DepValue) }.boxed()
        });
        DependencyBuilder::new(name.into(), Callable::Suspending(callable))
    }

    #[must_use]
    pub fn id(&self) -> DependencyId {
        DependencyId(Arc::as_ptr(&self.inner) as *const () as usize)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    #[must_use]
    pub fn is_suspending(&self) -> bool {
        matches!(self.inner.callable, Callable::Suspending(_))
    }

    #[must_use]
    pub fn uses_cache(&self) -> bool {
        self.inner.use_cache
    }

    #[must_use]
    pub fn scopes(&self) -> &[String] {
        &self.inner.scopes
    }

    #[must_use]
    pub fn parameters(&self) -> &[ParameterMeta] {
        &self.inner.parameters
    }

    #[must_use]
    pub fn sub_dependencies(&self) -> &[DepRef] {
        &self.inner.dependencies
    }
}

/// Collects the declaration of a [`Dependency`] before it becomes immutable.
pub struct DependencyBuilder {
    inner: DependencyInner,
}

impl DependencyBuilder {
    fn new(name: String, callable: Callable) -> Self {
        Self {
            inner: DependencyInner {
                name,
                callable,
                parameters: Vec::new(),
                dependencies: Vec::new(),
                scopes: Vec::new(),
                provider: None,
                use_cache: true,
            },
        }
    }

    #[must_use]
    pub fn param(mut self, param: ParameterMeta) -> Self {
        self.inner.parameters.push(param);
        self
    }

    #[must_use]
    pub fn depends_on(mut self, dep: impl Into<DepRef>) -> Self {
        self.inner.dependencies.push(dep.into());
        self
    }

    /// Depend on `dep` under `name`, requiring `scopes` of it.
    #[must_use]
    pub fn security<I, S>(mut self, name: impl Into<String>, dep: &Dependency, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner
            .dependencies
            .push(DepRef::security(name, dep, scopes));
        self
    }

    /// Scopes this dependency itself requires; needs a provider.
    #[must_use]
    pub fn scopes<I, S>(mut self, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner.scopes.extend(scopes.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn SecurityProvider>) -> Self {
        self.inner.provider = Some(provider);
        self
    }

    /// Evaluate at every reference instead of once per request.
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.inner.use_cache = false;
        self
    }

    #[must_use]
    pub fn build(self) -> Dependency {
        Dependency {
            inner: Arc::new(self.inner),
        }
    }
}

/// One invocation site of a dependency.
///
/// `name` is the key the resolved value is exposed under to the dependent
/// (handler or parent dependency); `scopes` are added to the scopes the
/// dependency and its own sub-dependencies must satisfy.
#[derive(Debug, Clone)]
pub struct DepRef {
    pub name: String,
    pub dependency: Dependency,
    pub scopes: Vec<String>,
}

impl DepRef {
    pub fn new(name: impl Into<String>, dependency: &Dependency) -> Self {
        Self {
            name: name.into(),
            dependency: dependency.clone(),
            scopes: Vec::new(),
        }
    }

    pub fn security<I, S>(name: impl Into<String>, dependency: &Dependency, scopes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            dependency: dependency.clone(),
            scopes: scopes.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Dependency> for DepRef {
    fn from(dependency: Dependency) -> Self {
        Self {
            name: dependency.name().to_string(),
            dependency,
            scopes: Vec::new(),
        }
    }
}

impl From<&Dependency> for DepRef {
    fn from(dependency: &Dependency) -> Self {
        DepRef::from(dependency.clone())
    }
}

/// Everything a dependency body can see.
#[derive(Clone)]
pub struct DependencyArgs {
    pub(crate) params: Arc<Map<String, Value>>,
    pub(crate) resolved: Arc<HashMap<String, DepValue>>,
    pub(crate) request: Arc<RawRequest>,
    pub(crate) request_id: RequestId,
    pub(crate) security_scopes: SecurityScopes,
    pub(crate) credentials: Option<Arc<Credentials>>,
    pub(crate) background: BackgroundTasks,
}

impl fmt::Debug for DependencyArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyArgs")
            .field("request_id", &self.request_id)
            .field("params", &self.params)
            .field("resolved", &self.resolved.keys().collect::<Vec<_>>())
            .field("security_scopes", &self.security_scopes)
            .finish_non_exhaustive()
    }
}

impl DependencyArgs {
    /// A bound parameter of this dependency.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    /// Deserialize every bound parameter into `T`.
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T, DispatchError> {
        extract_params(&self.params)
    }

    /// Value of the sub-dependency referenced under `name`.
    pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, DispatchError> {
        downcast_dependency(&self.resolved, name)
    }

    #[must_use]
    pub fn request(&self) -> &RawRequest {
        &self.request
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn security_scopes(&self) -> &SecurityScopes {
        &self.security_scopes
    }

    /// Present when this dependency has a provider that granted access.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_deref()
    }

    #[must_use]
    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }
}

pub(crate) fn extract_params<T: DeserializeOwned>(
    params: &Map<String, Value>,
) -> Result<T, DispatchError> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|e| {
        DispatchError::Internal(anyhow::anyhow!(
            "bound parameters do not fit the requested type: {e}"
        ))
    })
}

pub(crate) fn downcast_dependency<T: Any + Send + Sync>(
    resolved: &HashMap<String, DepValue>,
    name: &str,
) -> Result<Arc<T>, DispatchError> {
    let value = resolved.get(name).ok_or_else(|| {
        DispatchError::internal(format!("dependency '{name}' was not declared"))
    })?;
    Arc::clone(value).downcast::<T>().map_err(|_| {
        DispatchError::internal(format!(
            "dependency '{name}' is not a {}",
            std::any::type_name::<T>()
        ))
    })
}
