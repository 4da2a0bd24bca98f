//! One page of a Workday result set, and the protocol for fetching the rest.

use std::fmt;
use std::sync::Arc;

use futures::Stream;
use futures::TryStreamExt;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::engine::ServiceBinding;
use crate::error::{Result, WorkdayError};
use crate::proxy::invoke;

const RESPONSE_RESULTS: &str = "Response_Results";
const RESPONSE_DATA: &str = "Response_Data";
const RESPONSE_FILTER: &str = "Response_Filter";

/// The call that produced a page; reissued with a new page number to get the next one.
#[derive(Debug, Clone, PartialEq)]
pub struct CallDescriptor {
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

impl CallDescriptor {
    pub fn new(method: impl Into<String>, args: Vec<Value>, kwargs: Map<String, Value>) -> Self {
        Self {
            method: method.into(),
            args,
            kwargs,
        }
    }

    /// Copy of this call with `Response_Filter.Page` set to `page`.
    ///
    /// Other keys of `Response_Filter` are kept. A missing or null filter is
    /// created.
    pub fn with_page(&self, page: u64) -> Result<Self> {
        let mut kwargs = self.kwargs.clone();
        let filter = kwargs
            .entry(RESPONSE_FILTER)
            .or_insert_with(|| Value::Object(Map::new()));

        if filter.is_null() {
            *filter = Value::Object(Map::new());
        }
        let Some(map) = filter.as_object_mut() else {
            return Err(WorkdayError::InvalidArgument(format!(
                "{} must be a mapping",
                RESPONSE_FILTER
            )));
        };
        map.insert("Page".to_string(), json!(page));

        Ok(Self {
            method: self.method.clone(),
            args: self.args.clone(),
            kwargs,
        })
    }
}

/// A single page returned by a Workday `Get_*` operation.
///
/// The payload is stored as received; accessors fail with
/// [`WorkdayError::MalformedResponse`] when the fields they read are missing.
#[derive(Clone)]
pub struct PaginatedResponse {
    payload: Value,
    call: CallDescriptor,
    binding: Arc<dyn ServiceBinding>,
}

impl PaginatedResponse {
    pub fn new(payload: Value, call: CallDescriptor, binding: Arc<dyn ServiceBinding>) -> Self {
        Self {
            payload,
            call,
            binding,
        }
    }

    /// Current page number, 1-based.
    pub fn page(&self) -> Result<u64> {
        self.result_count("Page")
    }

    pub fn total_pages(&self) -> Result<u64> {
        self.result_count("Total_Pages")
    }

    pub fn total_results(&self) -> Result<u64> {
        self.result_count("Total_Results")
    }

    /// Number of results on this page.
    pub fn page_results(&self) -> Result<u64> {
        self.result_count("Page_Results")
    }

    pub fn data(&self) -> Result<&Value> {
        self.payload
            .get(RESPONSE_DATA)
            .ok_or_else(|| WorkdayError::malformed(RESPONSE_DATA))
    }

    /// Echo of the request references, when the service sent one.
    pub fn references(&self) -> Option<&Value> {
        present(self.payload.get("Request_References"))
    }

    /// Echo of the response filter, when the service sent one.
    pub fn filter(&self) -> Option<&Value> {
        present(self.payload.get(RESPONSE_FILTER))
    }

    /// The entries under `Response_Data.<key>` on this page.
    ///
    /// A single element is returned as a one-item list; an absent key as an empty one.
    pub fn records(&self, key: &str) -> Result<Vec<Value>> {
        Ok(match self.data()?.get(key) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.clone(),
            Some(single) => vec![single.clone()],
        })
    }

    /// Records under `key` from this page and every following page.
    pub async fn collect_records(self, key: &str) -> Result<Vec<Value>> {
        let mut records = self.records(key)?;
        let pages = self.into_pages();
        futures::pin_mut!(pages);
        while let Some(page) = pages.try_next().await? {
            records.extend(page.records(key)?);
        }
        Ok(records)
    }

    /// The raw payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn call(&self) -> &CallDescriptor {
        &self.call
    }

    pub fn has_next_page(&self) -> Result<bool> {
        Ok(self.page()? < self.total_pages()?)
    }

    /// Fetch the following page, or `None` once the last page has been reached.
    pub async fn next_page(&self) -> Result<Option<PaginatedResponse>> {
        let page = self.page()?;
        let total_pages = self.total_pages()?;
        if page >= total_pages {
            return Ok(None);
        }

        let next = page + 1;
        let call = self.call.with_page(next)?;
        debug!(method = %call.method, page = next, total_pages, "requesting next page");
        let response = invoke(&self.binding, call).await?;

        // A server that ignores Response_Filter would otherwise be paged forever
        if response.page()? != next {
            return Err(WorkdayError::malformed(format!("{}.Page", RESPONSE_RESULTS)));
        }
        Ok(Some(response))
    }

    /// Stream of the pages after this one, in order.
    pub fn into_pages(self) -> impl Stream<Item = Result<PaginatedResponse>> + Send {
        futures::stream::try_unfold(self, |current| async move {
            let next = current.next_page().await?;
            Ok::<_, WorkdayError>(next.map(|page| (page.clone(), page)))
        })
    }

    fn result_count(&self, field: &str) -> Result<u64> {
        let value = self
            .payload
            .get(RESPONSE_RESULTS)
            .and_then(|results| results.get(field))
            .ok_or_else(|| WorkdayError::malformed(format!("{}.{}", RESPONSE_RESULTS, field)))?;
        as_count(value).ok_or_else(|| WorkdayError::malformed(format!("{}.{}", RESPONSE_RESULTS, field)))
    }
}

fn as_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0)
                    .map(|f| f as u64)
            })
        }
        _ => None,
    }
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

impl fmt::Debug for PaginatedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaginatedResponse")
            .field("call", &self.call)
            .field("payload", &self.payload)
            .finish()
    }
}
