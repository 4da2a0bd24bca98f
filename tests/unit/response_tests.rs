use std::sync::{Arc, Mutex};

use futures::TryStreamExt;
use serde_json::{Map, Value, json};

use workday_soap::{CallDescriptor, EngineError, PaginatedResponse, SoapFault, WorkdayError};

use crate::common::mocks::MockBinding;

fn results_page(page: u64, total_pages: u64, ids: &[&str]) -> Value {
    let workers: Vec<Value> = ids
        .iter()
        .map(|id| json!({"Worker_Reference": {"ID": id}}))
        .collect();
    json!({
        "Request_References": null,
        "Response_Filter": {"Page": page, "Count": 2},
        "Response_Results": {
            "Total_Results": 5,
            "Total_Pages": total_pages,
            "Page_Results": ids.len(),
            "Page": page,
        },
        "Response_Data": {"Worker": workers},
    })
}

fn requested_page(kwargs: &Map<String, Value>) -> Option<u64> {
    kwargs.get("Response_Filter")?.get("Page")?.as_u64()
}

fn get_workers(kwargs: Map<String, Value>) -> CallDescriptor {
    CallDescriptor::new("Get_Workers", Vec::new(), kwargs)
}

#[test]
fn test_accessors_read_response_results() {
    let binding = Arc::new(MockBinding::new());
    let response = PaginatedResponse::new(
        results_page(1, 3, &["21001", "21002"]),
        get_workers(Map::new()),
        binding,
    );

    assert_eq!(response.page().unwrap(), 1);
    assert_eq!(response.total_pages().unwrap(), 3);
    assert_eq!(response.total_results().unwrap(), 5);
    assert_eq!(response.page_results().unwrap(), 2);
    assert!(response.has_next_page().unwrap());
    assert!(response.references().is_none());
    assert_eq!(response.filter(), Some(&json!({"Page": 1, "Count": 2})));
    assert_eq!(response.records("Worker").unwrap().len(), 2);
    assert!(response.records("Organization").unwrap().is_empty());
}

#[test]
fn test_missing_results_is_malformed() {
    let binding = Arc::new(MockBinding::new());
    let response = PaginatedResponse::new(
        json!({"Response_Data": {}}),
        get_workers(Map::new()),
        binding,
    );

    match response.total_pages() {
        Err(WorkdayError::MalformedResponse { field }) => {
            assert_eq!(field, "Response_Results.Total_Pages")
        }
        other => panic!("Expected MalformedResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_last_page_makes_no_call() {
    let mut binding = MockBinding::new();
    binding.expect_call().times(0);

    let response = PaginatedResponse::new(
        results_page(2, 2, &["21003"]),
        get_workers(Map::new()),
        Arc::new(binding),
    );

    assert!(!response.has_next_page().unwrap());
    assert!(response.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn test_next_page_keeps_filter_and_arguments() {
    let mut binding = MockBinding::new();
    binding
        .expect_call()
        .withf(|operation, args, kwargs| {
            operation.to_string() == "Get_Workers"
                && args.len() == 1
                && args[0] == json!("positional")
                && kwargs["Response_Filter"] == json!({"Page": 2, "Count": 2})
                && kwargs["Response_Group"] == json!({"Include_Personal_Information": true})
        })
        .times(1)
        .returning(|_, _, _| Ok(results_page(2, 3, &["21003", "21004"])));

    let mut kwargs = Map::new();
    kwargs.insert("Response_Filter".to_string(), json!({"Count": 2}));
    kwargs.insert(
        "Response_Group".to_string(),
        json!({"Include_Personal_Information": true}),
    );
    let first = PaginatedResponse::new(
        results_page(1, 3, &["21001", "21002"]),
        CallDescriptor::new("Get_Workers", vec![json!("positional")], kwargs),
        Arc::new(binding),
    );

    let second = first.next_page().await.unwrap().unwrap();
    assert_eq!(second.page().unwrap(), 2);
    assert_eq!(
        second.call().kwargs["Response_Filter"],
        json!({"Page": 2, "Count": 2})
    );
    // The original call is left untouched
    assert_eq!(first.call().kwargs["Response_Filter"], json!({"Count": 2}));
}

#[tokio::test]
async fn test_collect_records_walks_every_page() {
    let mut binding = MockBinding::new();
    binding
        .expect_call()
        .times(2)
        .returning(|_, _, kwargs| match requested_page(kwargs) {
            Some(2) => Ok(results_page(2, 3, &["21003", "21004"])),
            Some(3) => Ok(results_page(3, 3, &["21005"])),
            other => panic!("unexpected page request {:?}", other),
        });

    let first = PaginatedResponse::new(
        results_page(1, 3, &["21001", "21002"]),
        get_workers(Map::new()),
        Arc::new(binding),
    );

    let ids: Vec<Value> = first
        .collect_records("Worker")
        .await
        .unwrap()
        .into_iter()
        .map(|worker| worker["Worker_Reference"]["ID"].clone())
        .collect();
    assert_eq!(
        ids,
        vec![json!("21001"), json!("21002"), json!("21003"), json!("21004"), json!("21005")]
    );
}

#[tokio::test]
async fn test_fault_on_later_page_stops_iteration() {
    let mut binding = MockBinding::new();
    binding.expect_call().times(1).returning(|_, _, _| {
        Err(EngineError::Fault(SoapFault::new(
            "SOAP-ENV:Server",
            "Processing error occurred",
        )))
    });

    let first = PaginatedResponse::new(
        results_page(1, 3, &["21001"]),
        get_workers(Map::new()),
        Arc::new(binding),
    );

    let result: Result<Vec<PaginatedResponse>, WorkdayError> =
        first.into_pages().try_collect().await;
    match result {
        Err(error) => assert_eq!(error.fault().unwrap().message, "Processing error occurred"),
        Ok(pages) => panic!("Expected a fault, got {} pages", pages.len()),
    }
}

#[test]
fn test_non_mapping_filter_rejected() {
    let mut kwargs = Map::new();
    kwargs.insert("Response_Filter".to_string(), json!("page=2"));

    assert!(matches!(
        get_workers(kwargs).with_page(2),
        Err(WorkdayError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_server_repeating_a_page_is_malformed() {
    let mut binding = MockBinding::new();
    binding.expect_call().times(1).returning(|_, _, _| {
        Ok(json!({
            "Response_Results": {"Page": "1", "Total_Pages": "2"},
            "Response_Data": {"Worker": {"Worker_Reference": {"ID": "21001"}}},
        }))
    });

    let first = PaginatedResponse::new(
        results_page(1, 2, &["21001"]),
        get_workers(Map::new()),
        Arc::new(binding),
    );

    match first.collect_records("Worker").await {
        Err(WorkdayError::MalformedResponse { field }) => {
            assert_eq!(field, "Response_Results.Page")
        }
        other => panic!("Expected MalformedResponse, got {:?}", other),
    }
}

#[tokio::test]
async fn test_next_page_twice_reissues_the_same_call() {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&calls);

    let mut binding = MockBinding::new();
    binding
        .expect_call()
        .times(2)
        .returning(move |operation, args, kwargs| {
            seen.lock().unwrap().push((
                operation.to_string(),
                args.to_vec(),
                kwargs.clone(),
            ));
            Ok(results_page(2, 3, &["21003", "21004"]))
        });

    let mut kwargs = Map::new();
    kwargs.insert("Response_Filter".to_string(), json!({"Count": 2}));
    let call = CallDescriptor::new("Get_Workers", vec![json!("ref")], kwargs);
    let first = PaginatedResponse::new(
        results_page(1, 3, &["21001", "21002"]),
        call.clone(),
        Arc::new(binding),
    );

    let a = first.next_page().await.unwrap().unwrap();
    let b = first.next_page().await.unwrap().unwrap();
    assert_eq!(a.page().unwrap(), 2);
    assert_eq!(b.page().unwrap(), 2);
    assert_eq!(a.call(), b.call());

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
    assert_eq!(calls[0].0, "Get_Workers");
    assert_eq!(calls[0].1, vec![json!("ref")]);
    assert_eq!(calls[0].2["Response_Filter"], json!({"Count": 2, "Page": 2}));

    // Forward-only: the first page keeps its own call and never restarts
    assert_eq!(first.call(), &call);
}
