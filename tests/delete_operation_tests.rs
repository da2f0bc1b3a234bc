//! Delete Operation behaviour against a mocked mail provider

mod common;

use async_trait::async_trait;
use common::{ids, not_found, unthrottled, MockMailProvider};
use gmail_triage::client::MailProvider;
use gmail_triage::delete::DeleteOperation;
use gmail_triage::error::{DeleteError, Result, TriageError};
use gmail_triage::models::{DeleteRequest, MessageDetail, OutcomeStatus};
use mockall::predicate::*;
use mockall::Sequence;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Mutex;

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_delete_by_ids_all_succeed() {
    let mut provider = MockMailProvider::new();
    let mut seq = Sequence::new();
    provider.expect_search().never();
    provider
        .expect_delete_message()
        .with(eq("m1"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));
    provider
        .expect_delete_message()
        .with(eq("m2"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(()));

    let op = DeleteOperation::new(provider, unthrottled(false));
    let report = op.execute(&DeleteRequest::by_ids(["m1", "m2"])).await.unwrap();

    assert!(!report.dry_run);
    assert_eq!(report.deleted_count, 2);
    assert_eq!(report.simulated_count, 0);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn test_query_resolves_to_search_results() {
    let mut provider = MockMailProvider::new();
    provider
        .expect_search()
        .with(eq("from:promo"), eq(5usize))
        .times(1)
        .returning(|_, _| Ok(ids(&["a", "b", "c"])));
    provider
        .expect_delete_message()
        .times(3)
        .returning(|_| Ok(()));

    let op = DeleteOperation::new(provider, unthrottled(false));
    let report = op
        .execute(&DeleteRequest::by_query("from:promo", 5))
        .await
        .unwrap();

    let resolved: Vec<_> = report.outcomes.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(resolved, ["a", "b", "c"]);
    assert_eq!(report.deleted_count, 3);
}

#[tokio::test]
async fn test_simulate_issues_no_delete_calls() {
    let mut provider = MockMailProvider::new();
    provider.expect_delete_message().never();

    let op = DeleteOperation::new(provider, unthrottled(false));
    let report = op
        .execute(&DeleteRequest::by_ids(["x"]).simulated(true))
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.deleted_count, 0);
    assert_eq!(report.simulated_count, 1);
    assert_eq!(report.outcomes[0].status, OutcomeStatus::Simulated);
}

#[tokio::test]
async fn test_failure_is_recorded_and_batch_continues() {
    let mut provider = MockMailProvider::new();
    provider
        .expect_delete_message()
        .with(eq("good"))
        .times(1)
        .returning(|_| Ok(()));
    provider
        .expect_delete_message()
        .with(eq("bad"))
        .times(1)
        .returning(|id: &str| Err(not_found(id)));

    let op = DeleteOperation::new(provider, unthrottled(false));
    let report = op
        .execute(&DeleteRequest::by_ids(["good", "bad"]))
        .await
        .unwrap();

    assert_eq!(report.deleted_count, 1);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].id, "bad");
    assert_eq!(report.errors[0].status, OutcomeStatus::Error);
    assert!(report.errors[0]
        .error_detail
        .as_deref()
        .unwrap()
        .contains("not found"));
}

#[tokio::test]
async fn test_query_without_matches_is_successful_noop() {
    let mut provider = MockMailProvider::new();
    provider
        .expect_search()
        .with(eq("nomatch"), eq(10usize))
        .times(1)
        .returning(|_, _| Ok(Vec::new()));
    provider.expect_delete_message().never();

    let op = DeleteOperation::new(provider, unthrottled(false));
    let report = op
        .execute(&DeleteRequest::by_query("nomatch", 10))
        .await
        .unwrap();

    assert!(report.is_empty());
    assert_eq!(report.deleted_count, 0);
    assert_eq!(report.simulated_count, 0);
}

// ============================================================================
// Validation and resolution failures
// ============================================================================

#[tokio::test]
async fn test_blank_query_without_ids_is_invalid() {
    let mut provider = MockMailProvider::new();
    provider.expect_search().never();
    provider.expect_delete_message().never();

    let op = DeleteOperation::new(provider, unthrottled(false));
    let err = op
        .execute(&DeleteRequest::by_query("  ", 10))
        .await
        .unwrap_err();

    assert!(matches!(err, DeleteError::Validation(_)));
    assert_eq!(err.kind(), "ValidationError");
}

#[tokio::test]
async fn test_search_failure_aborts_before_any_delete() {
    let mut provider = MockMailProvider::new();
    provider.expect_search().times(1).returning(|_, _| {
        Err(TriageError::Forbidden(
            "Request had insufficient authentication scopes".to_string(),
        ))
    });
    provider.expect_delete_message().never();

    let op = DeleteOperation::new(provider, unthrottled(false));
    let err = op
        .execute(&DeleteRequest::by_query("from:promo", 10))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "ResolutionError");
    assert!(std::error::Error::source(&err).is_some());
}

// ============================================================================
// Properties
// ============================================================================

/// Provider whose search returns a fixed list and whose deletes fail for chosen ids
struct ScriptedProvider {
    search_results: Vec<String>,
    failing: HashSet<String>,
    deletes: Mutex<Vec<String>>,
}

#[async_trait]
impl MailProvider for ScriptedProvider {
    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<String>> {
        Ok(self.search_results.clone())
    }

    async fn get_message(&self, id: &str) -> Result<MessageDetail> {
        Err(not_found(id))
    }

    async fn delete_message(&self, id: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(id.to_string());
        if self.failing.contains(id) {
            Err(not_found(id))
        } else {
            Ok(())
        }
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn id_list() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-f0-9]{1,4}", 0..12)
}

proptest! {
    #[test]
    fn prop_counts_add_up(ids in id_list(), fail_mask in prop::collection::vec(any::<bool>(), 12), simulate in any::<bool>()) {
        let failing: HashSet<String> = ids
            .iter()
            .zip(&fail_mask)
            .filter(|(_, fail)| **fail)
            .map(|(id, _)| id.clone())
            .collect();
        let provider = ScriptedProvider {
            search_results: Vec::new(),
            failing,
            deletes: Mutex::new(Vec::new()),
        };
        let op = DeleteOperation::new(provider, unthrottled(false));

        let request = DeleteRequest::by_ids(ids.clone()).simulated(simulate);
        let report = runtime().block_on(op.execute(&request));

        if ids.is_empty() {
            prop_assert!(matches!(report, Err(DeleteError::Validation(_))));
        } else {
            let report = report.unwrap();
            prop_assert_eq!(
                report.deleted_count + report.simulated_count + report.errors.len(),
                report.outcomes.len()
            );
            prop_assert_eq!(report.outcomes.len(), ids.len());
            prop_assert_eq!(report.total_attempted, ids.len());

            let order: Vec<String> = report.outcomes.iter().map(|o| o.id.clone()).collect();
            prop_assert_eq!(&order, &ids);

            let deletes = op.provider().deletes.lock().unwrap().clone();
            if simulate {
                prop_assert!(deletes.is_empty());
                prop_assert_eq!(report.simulated_count, ids.len());
            } else {
                prop_assert_eq!(&deletes, &ids);
            }
        }
    }

    #[test]
    fn prop_query_resolution_is_capped(found in id_list(), limit in 1usize..8) {
        let provider = ScriptedProvider {
            search_results: found.clone(),
            failing: HashSet::new(),
            deletes: Mutex::new(Vec::new()),
        };
        let op = DeleteOperation::new(provider, unthrottled(true));

        let report = runtime()
            .block_on(op.execute(&DeleteRequest::by_query("in:inbox", limit)))
            .unwrap();

        let expected: Vec<String> = found.iter().take(limit).cloned().collect();
        let resolved: Vec<String> = report.outcomes.iter().map(|o| o.id.clone()).collect();
        prop_assert_eq!(resolved, expected);
        prop_assert!(op.provider().deletes.lock().unwrap().is_empty());
    }
}
