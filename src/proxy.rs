//! Service proxies: named entry points to the operations of one Workday API.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::auth::Authentication;
use crate::engine::{BindRequest, ServiceBinding, SoapEngine};
use crate::error::{Result, WorkdayError};
use crate::http_client::HttpSession;
use crate::response::{CallDescriptor, PaginatedResponse};

/// Handle for one API (e.g. "human_resources") of a tenant.
///
/// Operations are invoked by name through [`ServiceProxy::call`] or the
/// [`ServiceProxy::operation`] builder; every call returns the first page of
/// its result set.
#[derive(Clone)]
pub struct ServiceProxy {
    name: String,
    wsdl_url: String,
    binding: Arc<dyn ServiceBinding>,
}

impl ServiceProxy {
    /// Bind the WSDL at `wsdl_url` through `engine`.
    pub(crate) async fn connect(
        name: &str,
        wsdl_url: &str,
        session: &HttpSession,
        authentication: &dyn Authentication,
        engine: &dyn SoapEngine,
    ) -> Result<Self> {
        let security = authentication.security_parameters()?;
        let binding = engine
            .bind(BindRequest {
                api: name,
                wsdl_url,
                session,
                security,
            })
            .await?;

        info!(
            api = name,
            %wsdl_url,
            auth = authentication.describe(),
            operations = binding.operations().len(),
            "constructed service proxy"
        );

        Ok(Self::from_binding(name, wsdl_url, binding))
    }

    /// Wrap an already bound service.
    pub fn from_binding(
        name: impl Into<String>,
        wsdl_url: impl Into<String>,
        binding: Arc<dyn ServiceBinding>,
    ) -> Self {
        Self {
            name: name.into(),
            wsdl_url: wsdl_url.into(),
            binding,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn wsdl_url(&self) -> &str {
        &self.wsdl_url
    }

    /// Operation names the service exposes, sorted.
    pub fn operations(&self) -> Vec<String> {
        self.binding.operations()
    }

    pub fn has_operation(&self, method: &str) -> bool {
        self.binding.operations().iter().any(|op| op == method)
    }

    /// Invoke `method` with positional and keyword arguments.
    pub async fn call(
        &self,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<PaginatedResponse> {
        invoke(&self.binding, CallDescriptor::new(method, args, kwargs)).await
    }

    /// Start building a call to `method`.
    pub fn operation(&self, method: impl Into<String>) -> OperationCall<'_> {
        OperationCall {
            proxy: self,
            method: method.into(),
            args: Vec::new(),
            kwargs: Map::new(),
        }
    }
}

impl fmt::Debug for ServiceProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProxy")
            .field("name", &self.name)
            .field("wsdl_url", &self.wsdl_url)
            .finish()
    }
}

/// Builder for a single operation call.
#[must_use = "an operation call does nothing until `send` is awaited"]
pub struct OperationCall<'a> {
    proxy: &'a ServiceProxy,
    method: String,
    args: Vec<Value>,
    kwargs: Map<String, Value>,
}

impl OperationCall<'_> {
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    pub async fn send(self) -> Result<PaginatedResponse> {
        self.proxy.call(&self.method, self.args, self.kwargs).await
    }
}

/// Issue `call` through `binding`, translating engine errors.
pub(crate) async fn invoke(
    binding: &Arc<dyn ServiceBinding>,
    call: CallDescriptor,
) -> Result<PaginatedResponse> {
    debug!(method = %call.method, args = call.args.len(), "invoking operation");

    match binding.call(&call.method, &call.args, &call.kwargs).await {
        Ok(payload) => Ok(PaginatedResponse::new(payload, call, Arc::clone(binding))),
        Err(err) => {
            let err = WorkdayError::from(err);
            if let Some(fault) = err.fault() {
                warn!(method = %call.method, code = %fault.code, message = %fault.message, "SOAP fault");
            }
            Err(err)
        }
    }
}
