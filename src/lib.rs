//! # workday-soap
//!
//! An async client for Workday's SOAP web services. A [`WorkdayClient`] holds
//! one HTTP session and one authentication strategy for a tenant and hands
//! out a [`ServiceProxy`] per API, built from the API's WSDL on first use.
//! Every operation call returns a [`PaginatedResponse`] that knows how to
//! fetch the pages after it.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use futures::TryStreamExt;
//! use workday_soap::{AuthStrategy, WorkdayClient};
//!
//! # async fn run() -> workday_soap::Result<()> {
//! let mut apis = HashMap::new();
//! apis.insert(
//!     "talent".to_string(),
//!     "https://wd2-impl-services1.workday.com/ccx/service/acme/Talent/v30.0".to_string(),
//! );
//! let client = WorkdayClient::new(apis, AuthStrategy::username_password("isu@acme", "secret"))?;
//!
//! let talent = client.api("talent").await?;
//! let first = talent.operation("Get_Certifications").send().await?;
//! println!("{} certifications", first.total_results()?);
//!
//! let rest: Vec<_> = first.into_pages().try_collect().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod proxy;
pub mod response;
pub mod wsdl;
pub mod wsse;
pub mod xml;

pub use auth::{
    AuthStrategy, Authentication, BasicCredentials, SecurityParameters, SecurityToken,
    SigningMaterial,
};
pub use client::{WorkdayClient, WorkdayClientBuilder, WsdlMap};
pub use config::{ConfigError, ConfigManager, NetworkConfig, TenantConfig};
pub use engine::{BindRequest, EngineError, HttpServiceBinding, HttpSoapEngine, ServiceBinding, SoapEngine};
pub use error::{Result, SoapFault, TransportError, WorkdayError};
pub use http_client::{HttpClientConfig, HttpSession};
pub use proxy::{OperationCall, ServiceProxy};
pub use response::{CallDescriptor, PaginatedResponse};
pub use wsdl::{ServiceDefinition, SoapVersion};
pub use wsse::SignatureBackend;
