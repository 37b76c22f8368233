use crate::handlers;
use ledger_service::admission::AdmissionPath;
use ledger_service::health::HealthHandle;
use ledger_service::query::QueryPath;
use ledger_types::traits::{AtomicCounter, DurableStore};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use warp::Filter;

/// Builds the full warp filter tree for the ledger HTTP surface:
/// `POST /transaction`, `GET /balance/:id`, `GET /pending/:id`,
/// `GET /health`. Composition mirrors the `with_x` injector pattern used
/// for the settlement engine API elsewhere in the corpus: each dependency
/// is cloned into the filter chain via `warp::any().map(move || ...)`.
pub fn create_ledger_api_filter<S, C>(
    admission: Arc<AdmissionPath<S, C>>,
    query: Arc<QueryPath<S>>,
    health: HealthHandle,
    cancel: CancellationToken,
    service_name: &'static str,
    version: &'static str,
) -> warp::filters::BoxedFilter<(impl warp::Reply,)>
where
    S: DurableStore + 'static,
    C: AtomicCounter + 'static,
{
    let with_admission = warp::any().map(move || admission.clone()).boxed();
    let with_cancel = warp::any().map(move || cancel.clone()).boxed();
    let with_query = warp::any().map(move || query.clone()).boxed();

    let transaction = warp::post()
        .and(warp::path("transaction"))
        .and(warp::path::end())
        .and(warp::body::json())
        .and(with_admission)
        .and(with_cancel)
        .and_then(handlers::create_transaction);

    let balance = warp::get()
        .and(warp::path("balance"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(with_query.clone())
        .and_then(handlers::get_balance);

    let pending = warp::get()
        .and(warp::path("pending"))
        .and(warp::path::param::<String>())
        .and(warp::path::end())
        .and(with_query)
        .and_then(handlers::get_pending);

    let health_route = warp::get()
        .and(warp::path("health"))
        .and(warp::path::end())
        .map(move || {
            warp::reply::json(&handlers::health_response(
                service_name,
                version,
                health.is_healthy(),
            ))
        });

    transaction
        .or(balance)
        .or(pending)
        .or(health_route)
        .recover(handlers::recover)
        .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ledger_service::breaker::CircuitBreaker;
    use ledger_service::health::HealthProbe;
    use ledger_service::test_support::{InMemoryCounter, InMemoryStore};
    use ledger_types::{Account, AccountId};
    use rust_decimal::Decimal;
    use serde_json::{json, Value};

    fn filter() -> (
        warp::filters::BoxedFilter<(impl warp::Reply,)>,
        Arc<InMemoryStore>,
    ) {
        let store = Arc::new(InMemoryStore::new());
        let counter = Arc::new(InMemoryCounter::new());
        let breaker = Arc::new(CircuitBreaker::new());
        let health = HealthProbe::new();
        let handle: HealthHandle = (&health).into();
        let admission = Arc::new(AdmissionPath::new(
            store.clone(),
            counter,
            breaker,
            handle.clone(),
        ));
        let query = Arc::new(QueryPath::new(store.clone()));
        let cancel = CancellationToken::new();
        (
            create_ledger_api_filter(admission, query, handle, cancel, "ledger", "0.1.0"),
            store,
        )
    }

    #[tokio::test]
    async fn posts_a_transaction_and_reads_it_back() {
        let (api, store) = filter();
        store.insert_account(Account::new(
            AccountId::new("acc-1"),
            Decimal::new(100000, 2),
            Utc::now(),
        ));

        let response = warp::test::request()
            .method("POST")
            .path("/transaction")
            .json(&json!({"account_id": "acc-1", "amount": "100.00", "type": "debit"}))
            .reply(&api)
            .await;

        assert_eq!(response.status(), 200);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["status"], "pending");

        let balance = warp::test::request()
            .method("GET")
            .path("/balance/acc-1")
            .reply(&api)
            .await;
        assert_eq!(balance.status(), 200);
        let body: Value = serde_json::from_slice(balance.body()).unwrap();
        assert_eq!(body["account_id"], "acc-1");
    }

    #[tokio::test]
    async fn rejects_debit_exceeding_available_balance() {
        let (api, store) = filter();
        store.insert_account(Account::new(
            AccountId::new("acc-1"),
            Decimal::new(10000, 2),
            Utc::now(),
        ));

        let response = warp::test::request()
            .method("POST")
            .path("/transaction")
            .json(&json!({"account_id": "acc-1", "amount": "10001.00", "type": "debit"}))
            .reply(&api)
            .await;

        assert_eq!(response.status(), 400);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["status"], "rejected");
    }

    #[tokio::test]
    async fn unknown_account_is_not_found() {
        let (api, _store) = filter();
        let response = warp::test::request()
            .method("GET")
            .path("/balance/missing")
            .reply(&api)
            .await;
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn health_reports_service_identity() {
        let (api, _store) = filter();
        let response = warp::test::request()
            .method("GET")
            .path("/health")
            .reply(&api)
            .await;
        assert_eq!(response.status(), 200);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["service"], "ledger");
        assert_eq!(body["status"], "ok");
        assert_eq!(body["counter_healthy"], true);
    }
}
