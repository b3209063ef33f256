use crate::background::BackgroundTasks;
use crate::dispatcher::{self, HandlerRequest, Reply};
use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::router::ParamVec;
use http::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::sync::Arc;

/// A handler working on typed request data instead of a raw
/// [`HandlerRequest`].
///
/// The request type is built from the bound parameters through `TryFrom`;
/// the response is serialized to JSON and goes through the route's response
/// resolution like any other JSON reply.
pub trait Handler: Send + Sync + 'static {
    /// The typed request type (converted from HandlerRequest)
    type Request: TryFrom<HandlerRequest, Error = DispatchError> + Send + 'static;
    /// The typed response type (serialized to JSON)
    type Response: Serialize + Send + 'static;

    fn handle(
        &self,
        req: TypedHandlerRequest<Self::Request>,
    ) -> Result<Self::Response, DispatchError>;
}

/// Typed request data passed to a [`Handler`], with the request metadata
/// that stays untyped.
#[derive(Debug, Clone)]
pub struct TypedHandlerRequest<T> {
    pub request_id: RequestId,
    pub method: Method,
    pub path: String,
    pub handler_name: String,
    /// Percent-decoded captures in template order
    pub path_params: ParamVec,
    dependencies: Arc<HashMap<String, crate::dependency::DepValue>>,
    background: BackgroundTasks,
    /// Typed request data (validated and converted)
    pub data: T,
}

impl<T> TypedHandlerRequest<T>
where
    T: TryFrom<HandlerRequest, Error = DispatchError>,
{
    /// Convert a generic request, keeping its metadata.
    pub fn from_handler(req: HandlerRequest) -> Result<Self, DispatchError> {
        let request_id = req.request_id;
        let method = req.method.clone();
        let path = req.path.clone();
        let handler_name = req.handler_name.clone();
        let path_params = req.path_params.clone();
        let dependencies = Arc::clone(&req.dependencies);
        let background = req.background.clone();
        let data = T::try_from(req)?;
        Ok(Self {
            request_id,
            method,
            path,
            handler_name,
            path_params,
            dependencies,
            background,
            data,
        })
    }
}

impl<T> TypedHandlerRequest<T> {
    /// A resolved dependency value.
    pub fn dependency<D: Any + Send + Sync>(&self, name: &str) -> Result<Arc<D>, DispatchError> {
        crate::dependency::downcast_dependency(&self.dependencies, name)
    }

    #[must_use]
    pub fn background(&self) -> &BackgroundTasks {
        &self.background
    }
}

/// The bound route parameters deserialized into `T`.
///
/// Field names are the declared parameter names; a body parameter appears
/// under its own name.
#[derive(Debug, Clone, PartialEq)]
pub struct Params<T>(pub T);

impl<T: DeserializeOwned> TryFrom<HandlerRequest> for Params<T> {
    type Error = DispatchError;

    fn try_from(req: HandlerRequest) -> Result<Self, Self::Error> {
        req.extract::<T>().map(Params)
    }
}

/// Wrap a typed handler into a route [`dispatcher::Handler`].
pub fn into_handler<H: Handler>(handler: H) -> dispatcher::Handler {
    dispatcher::Handler::sync(move |req: HandlerRequest| {
        let typed = TypedHandlerRequest::<H::Request>::from_handler(req)?;
        let response = handler.handle(typed)?;
        Reply::json(&response)
    })
}
