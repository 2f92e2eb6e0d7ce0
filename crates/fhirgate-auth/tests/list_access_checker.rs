use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fhirgate_auth::policy::ReferenceExtractor;
use fhirgate_auth::{
    AccessChecker, AccessCheckerFactory, AccessError, BackendError, FhirClient, HttpMethod,
    IncomingRequest, ReferenceRule, ReferenceRules, SearchBundle, SearchQuery,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

const TEST_LIST_ID: &str = "test-list";
const PATIENT_AUTHORIZED: &str = "be92a43f-de46-affa-b131-bbf9eea51140";
const PATIENT_NON_AUTHORIZED: &str = "patient-non-authorized";

fn fixture(name: &str) -> Vec<u8> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn list_query(items: &str) -> String {
    format!("/List?_id={TEST_LIST_ID}&item={items}&_elements=id")
}

fn patient_query(id: &str) -> String {
    format!("/Patient?_id={id}&_elements=id")
}

/// Backend stub answering rendered queries from fixture files.
///
/// Unknown queries fail with HTTP 404 so an unexpected query shape surfaces
/// as an error instead of a silent deny.
#[derive(Default)]
struct FixtureClient {
    responses: Mutex<HashMap<String, Result<Vec<u8>, BackendError>>>,
    queries: Mutex<Vec<String>>,
    delay: Option<Duration>,
}

impl FixtureClient {
    /// The standard backend: the authorized patient is in `test-list`, the
    /// non-authorized one is not.
    fn standard() -> Self {
        let client = Self::default();
        client.respond(
            list_query(&format!("Patient/{PATIENT_AUTHORIZED}")),
            "bundle_list_patient_item.json",
        );
        client.respond(
            list_query(&format!("Patient/{PATIENT_NON_AUTHORIZED}")),
            "bundle_empty.json",
        );
        client
    }

    fn respond(&self, query: String, fixture_name: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(query, Ok(fixture(fixture_name)));
    }

    fn fail(&self, query: String, error: BackendError) {
        self.responses.lock().unwrap().insert(query, Err(error));
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl FhirClient for FixtureClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchBundle, BackendError> {
        let rendered = query.to_string();
        self.queries.lock().unwrap().push(rendered.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let response = self.responses.lock().unwrap().get(&rendered).cloned();
        match response {
            Some(Ok(body)) => SearchBundle::from_slice(&body),
            Some(Err(e)) => Err(e),
            None => Err(BackendError::Http(404)),
        }
    }
}

fn checker(client: &Arc<FixtureClient>) -> AccessChecker {
    let token = json!({"sub": "practitioner-1", "patient_list": TEST_LIST_ID});
    AccessCheckerFactory::new()
        .create(&token, Arc::clone(client) as Arc<dyn FhirClient>)
        .unwrap()
}

fn body_request(method: HttpMethod, resource_type: &str, fixture_name: &str) -> IncomingRequest {
    IncomingRequest::new(method, resource_type).with_body(fixture(fixture_name))
}

// =============================================================================
// Patient
// =============================================================================

#[tokio::test]
async fn test_get_authorized_patient() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::new(HttpMethod::Get, "Patient").with_id(PATIENT_AUTHORIZED);

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(decision.can_access());
    assert_eq!(
        client.queries(),
        vec![list_query(&format!("Patient/{PATIENT_AUTHORIZED}"))]
    );
}

#[tokio::test]
async fn test_get_non_authorized_patient() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::new(HttpMethod::Get, "Patient").with_id(PATIENT_NON_AUTHORIZED);

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(!decision.can_access());
    assert_eq!(decision.deny_reason().unwrap().code, "not-in-compartment");
}

#[tokio::test]
async fn test_post_patient_without_id_makes_no_backend_call() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::new(HttpMethod::Post, "Patient")
        .with_body(json!({"resourceType": "Patient", "name": [{"family": "Doe"}]}).to_string());

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(decision.can_access());
    assert!(client.queries().is_empty());
}

#[tokio::test]
async fn test_put_existing_patient() {
    let client = Arc::new(FixtureClient::standard());
    client.respond(patient_query(PATIENT_AUTHORIZED), "patient_id_search_single.json");
    let request = IncomingRequest::new(HttpMethod::Put, "Patient").with_id(PATIENT_AUTHORIZED);

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(decision.can_access());
    assert_eq!(
        client.queries(),
        vec![
            patient_query(PATIENT_AUTHORIZED),
            list_query(&format!("Patient/{PATIENT_AUTHORIZED}")),
        ]
    );
}

#[tokio::test]
async fn test_put_new_patient() {
    let client = Arc::new(FixtureClient::standard());
    client.respond(patient_query(PATIENT_AUTHORIZED), "bundle_empty.json");
    let request = IncomingRequest::new(HttpMethod::Put, "Patient")
        .with_id(PATIENT_AUTHORIZED)
        .with_body(json!({"resourceType": "Patient", "id": PATIENT_AUTHORIZED}).to_string());

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(decision.can_access());
    assert_eq!(client.queries(), vec![patient_query(PATIENT_AUTHORIZED)]);
}

#[tokio::test]
async fn test_put_existing_patient_outside_compartment() {
    let client = Arc::new(FixtureClient::standard());
    client.respond(patient_query(PATIENT_NON_AUTHORIZED), "patient_id_search_single.json");
    let request = IncomingRequest::new(HttpMethod::Put, "Patient").with_id(PATIENT_NON_AUTHORIZED);

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(!decision.can_access());
}

#[tokio::test]
async fn test_patient_search_by_id() {
    let client = Arc::new(FixtureClient::standard());
    let request =
        IncomingRequest::from_path(HttpMethod::Get, &format!("Patient?_id={PATIENT_AUTHORIZED}"), None)
            .unwrap();

    assert!(checker(&client).check_access(&request).await.unwrap().can_access());

    // A patient search without `_id` has no anchor.
    let request = IncomingRequest::from_path(HttpMethod::Get, "Patient?name=doe", None).unwrap();
    let decision = checker(&client).check_access(&request).await.unwrap();
    assert_eq!(decision.deny_reason().unwrap().code, "no-patient-reference");
    assert_eq!(client.queries().len(), 1);
}

// =============================================================================
// List
// =============================================================================

#[tokio::test]
async fn test_get_own_list() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::new(HttpMethod::Get, "List").with_id(TEST_LIST_ID);

    assert!(checker(&client).check_access(&request).await.unwrap().can_access());
    assert!(client.queries().is_empty());
}

#[tokio::test]
async fn test_get_other_list() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::new(HttpMethod::Get, "List").with_id("wrong-id");

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(!decision.can_access());
    assert_eq!(decision.deny_reason().unwrap().code, "list-mismatch");
    assert!(client.queries().is_empty());
}

// =============================================================================
// Observation search
// =============================================================================

#[tokio::test]
async fn test_search_observation_with_subject() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::new(HttpMethod::Get, "Observation")
        .with_param("subject", format!("Patient/{PATIENT_AUTHORIZED}"));

    assert!(checker(&client).check_access(&request).await.unwrap().can_access());
}

#[tokio::test]
async fn test_search_observation_with_bare_subject_id() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::from_path(
        HttpMethod::Get,
        &format!("Observation?subject={PATIENT_AUTHORIZED}&code=8302-2"),
        None,
    )
    .unwrap();

    assert!(checker(&client).check_access(&request).await.unwrap().can_access());
}

#[tokio::test]
async fn test_search_observation_without_subject() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::new(HttpMethod::Get, "Observation").with_param("code", "8302-2");

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(!decision.can_access());
    assert!(client.queries().is_empty());
}

#[tokio::test]
async fn test_search_naming_several_patients_denied() {
    let client = Arc::new(FixtureClient::standard());
    let paths = [
        format!("Observation?subject={PATIENT_AUTHORIZED},{PATIENT_NON_AUTHORIZED}"),
        format!("Observation?subject=Patient/{PATIENT_AUTHORIZED},Patient/{PATIENT_NON_AUTHORIZED}"),
        format!("Observation?subject={PATIENT_AUTHORIZED}&patient={PATIENT_NON_AUTHORIZED}"),
        format!("Observation?subject={PATIENT_AUTHORIZED},Group/g1"),
        format!("Patient?_id={PATIENT_AUTHORIZED},{PATIENT_NON_AUTHORIZED}"),
    ];

    for path in &paths {
        let request = IncomingRequest::from_path(HttpMethod::Get, path, None).unwrap();
        let decision = checker(&client).check_access(&request).await.unwrap();

        assert!(!decision.can_access(), "{path}");
        assert_eq!(decision.deny_reason().unwrap().code, "no-patient-reference", "{path}");
    }
    assert!(client.queries().is_empty());
}

#[tokio::test]
async fn test_search_repeating_one_patient_allowed() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::from_path(
        HttpMethod::Get,
        &format!("Observation?subject={PATIENT_AUTHORIZED},Patient/{PATIENT_AUTHORIZED}"),
        None,
    )
    .unwrap();

    assert!(checker(&client).check_access(&request).await.unwrap().can_access());
    assert_eq!(
        client.queries(),
        vec![list_query(&format!("Patient/{PATIENT_AUTHORIZED}"))]
    );
}

// =============================================================================
// Observation writes
// =============================================================================

#[tokio::test]
async fn test_put_observation_authorized() {
    let client = Arc::new(FixtureClient::standard());
    let request = body_request(HttpMethod::Put, "Observation", "test_obs.json");

    assert!(checker(&client).check_access(&request).await.unwrap().can_access());
}

#[tokio::test]
async fn test_put_observation_non_authorized() {
    let client = Arc::new(FixtureClient::standard());
    let request = body_request(HttpMethod::Put, "Observation", "test_obs_unauthorized.json");

    assert!(!checker(&client).check_access(&request).await.unwrap().can_access());
}

#[tokio::test]
async fn test_post_observation_authorized() {
    let client = Arc::new(FixtureClient::standard());
    let request = body_request(HttpMethod::Post, "Observation", "test_obs.json");

    assert!(checker(&client).check_access(&request).await.unwrap().can_access());
}

#[tokio::test]
async fn test_post_observation_with_performers() {
    let client = Arc::new(FixtureClient::standard());
    let items = format!("Patient/test-patient-1,Patient/{PATIENT_AUTHORIZED},Patient/test-patient-2");
    client.respond(list_query(&items), "bundle_list_patient_item.json");
    let request = body_request(HttpMethod::Post, "Observation", "test_obs_performers.json");

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(decision.can_access());
    assert_eq!(client.queries(), vec![list_query(&items)]);
}

#[tokio::test]
async fn test_post_observation_without_patient_reference() {
    let client = Arc::new(FixtureClient::standard());
    let request = body_request(HttpMethod::Post, "Observation", "test_obs_no_subject.json");

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(!decision.can_access());
    assert_eq!(decision.deny_reason().unwrap().code, "no-patient-reference");
    assert!(client.queries().is_empty());
}

#[tokio::test]
async fn test_post_observation_body_to_encounter() {
    let client = Arc::new(FixtureClient::standard());
    let request = body_request(HttpMethod::Post, "Encounter", "test_obs.json");

    let decision = checker(&client).check_access(&request).await.unwrap();

    assert!(!decision.can_access());
    assert!(client.queries().is_empty());
}

#[tokio::test]
async fn test_post_malformed_body() {
    let client = Arc::new(FixtureClient::standard());
    let request = IncomingRequest::new(HttpMethod::Post, "Observation").with_body(b"{\"subject\":".to_vec());

    assert!(!checker(&client).check_access(&request).await.unwrap().can_access());
    assert!(client.queries().is_empty());
}

// =============================================================================
// Fail-closed and rule registration
// =============================================================================

#[tokio::test]
async fn test_unregistered_types_always_denied() {
    let client = Arc::new(FixtureClient::standard());
    let checker = checker(&client);

    for resource_type in ["Organization", "Practitioner", "Appointment", "Bundle"] {
        let requests = [
            IncomingRequest::new(HttpMethod::Get, resource_type).with_id("x1"),
            IncomingRequest::new(HttpMethod::Get, resource_type)
                .with_param("subject", format!("Patient/{PATIENT_AUTHORIZED}")),
            IncomingRequest::new(HttpMethod::Post, resource_type).with_body(
                json!({
                    "resourceType": resource_type,
                    "subject": {"reference": format!("Patient/{PATIENT_AUTHORIZED}")}
                })
                .to_string(),
            ),
        ];
        for request in &requests {
            let decision = checker.check_access(request).await.unwrap();
            assert_eq!(
                decision.deny_reason().map(|r| r.code.as_str()),
                Some("unsupported-resource-type"),
                "{resource_type} must be denied"
            );
        }
    }
    assert!(client.queries().is_empty());
}

#[tokio::test]
async fn test_empty_extraction_always_denied() {
    let client = Arc::new(FixtureClient::standard());
    let checker = checker(&client);

    let requests = [
        IncomingRequest::new(HttpMethod::Get, "Observation").with_id("obs-1"),
        IncomingRequest::new(HttpMethod::Delete, "Encounter").with_id("enc-1"),
        IncomingRequest::new(HttpMethod::Get, "Condition"),
        IncomingRequest::new(HttpMethod::Get, "Observation").with_param("subject", "Group/g1"),
        IncomingRequest::new(HttpMethod::Post, "Observation"),
        IncomingRequest::new(HttpMethod::Patch, "Observation")
            .with_id("obs-1")
            .with_body(b"[]".to_vec()),
    ];
    for request in &requests {
        let decision = checker.check_access(request).await.unwrap();
        assert!(decision.is_denied(), "{request:?} must be denied");
    }
    assert!(client.queries().is_empty());
}

#[tokio::test]
async fn test_registered_rule_is_used() {
    let client = Arc::new(FixtureClient::standard());
    let mut rules = ReferenceRules::empty();
    rules.register("Flag", ReferenceRule::new(&["patient"], &["subject"]));
    let checker = checker(&client).with_extractor(Arc::new(ReferenceExtractor::new(Arc::new(rules))));

    let request = IncomingRequest::new(HttpMethod::Post, "Flag").with_body(
        json!({
            "resourceType": "Flag",
            "subject": {"reference": format!("Patient/{PATIENT_AUTHORIZED}")}
        })
        .to_string(),
    );
    assert!(checker.check_access(&request).await.unwrap().can_access());

    // Observation is not in this table.
    let request = body_request(HttpMethod::Post, "Observation", "test_obs.json");
    assert!(checker.check_access(&request).await.unwrap().is_denied());
}

// =============================================================================
// Idempotence, backend failures, cancellation
// =============================================================================

#[tokio::test]
async fn test_repeated_checks_are_identical_and_not_cached() {
    let client = Arc::new(FixtureClient::standard());
    let checker = checker(&client);
    let request = body_request(HttpMethod::Put, "Observation", "test_obs.json");

    let first = checker.check_access(&request).await.unwrap();
    let second = checker.check_access(&request).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(client.queries().len(), 2);
}

#[tokio::test]
async fn test_concurrent_checks_share_one_checker() {
    let client = Arc::new(FixtureClient::standard());
    let checker = Arc::new(checker(&client));

    let handles: Vec<_> = [PATIENT_AUTHORIZED, PATIENT_NON_AUTHORIZED]
        .into_iter()
        .cycle()
        .take(8)
        .map(|id| {
            let checker = Arc::clone(&checker);
            tokio::spawn(async move {
                let request = IncomingRequest::new(HttpMethod::Get, "Patient").with_id(id);
                (id, checker.check_access(&request).await.unwrap().can_access())
            })
        })
        .collect();

    for handle in handles {
        let (id, allowed) = handle.await.unwrap();
        assert_eq!(allowed, id == PATIENT_AUTHORIZED);
    }
    assert_eq!(client.queries().len(), 8);
}

#[tokio::test]
async fn test_backend_failure_is_an_error() {
    let client = Arc::new(FixtureClient::default());
    client.fail(
        list_query(&format!("Patient/{PATIENT_AUTHORIZED}")),
        BackendError::Http(503),
    );
    let request = IncomingRequest::new(HttpMethod::Get, "Patient").with_id(PATIENT_AUTHORIZED);

    let err = checker(&client).check_access(&request).await.unwrap_err();

    assert!(err.is_backend_unavailable());
    assert!(matches!(
        err,
        AccessError::BackendUnavailable {
            source: BackendError::Http(503)
        }
    ));
}

#[tokio::test]
async fn test_existence_check_failure_is_an_error() {
    let client = Arc::new(FixtureClient::standard());
    client.fail(patient_query(PATIENT_AUTHORIZED), BackendError::Timeout);
    let request = IncomingRequest::new(HttpMethod::Put, "Patient").with_id(PATIENT_AUTHORIZED);

    let err = checker(&client).check_access(&request).await.unwrap_err();

    assert!(matches!(
        err,
        AccessError::BackendUnavailable {
            source: BackendError::Timeout
        }
    ));
}

#[tokio::test]
async fn test_malformed_backend_response_is_an_error() {
    let client = Arc::new(FixtureClient::default());
    client.respond(
        list_query(&format!("Patient/{PATIENT_AUTHORIZED}")),
        "test_obs.json",
    );
    let request = IncomingRequest::new(HttpMethod::Get, "Patient").with_id(PATIENT_AUTHORIZED);

    let err = checker(&client).check_access(&request).await.unwrap_err();

    assert!(matches!(
        err,
        AccessError::BackendUnavailable {
            source: BackendError::Parse(_)
        }
    ));
}

#[tokio::test]
async fn test_cancellation_during_query() {
    let client = Arc::new(FixtureClient::standard().with_delay(Duration::from_secs(30)));
    let checker = checker(&client);
    let cancel = CancellationToken::new();
    let request = IncomingRequest::new(HttpMethod::Get, "Patient").with_id(PATIENT_AUTHORIZED);

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = checker
        .check_access_with_cancel(&request, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AccessError::BackendUnavailable {
            source: BackendError::Cancelled
        }
    ));
    assert_eq!(client.queries().len(), 1);
}

// =============================================================================
// Factory
// =============================================================================

#[test]
fn test_factory_rejects_bad_claims() {
    let client: Arc<dyn FhirClient> = Arc::new(FixtureClient::default());
    let factory = AccessCheckerFactory::new();

    let missing = factory.create(&json!({"sub": "u1"}), Arc::clone(&client));
    assert!(matches!(missing, Err(AccessError::Configuration { .. })));

    let not_a_string = factory.create(&json!({"patient_list": ["a", "b"]}), Arc::clone(&client));
    assert!(matches!(not_a_string, Err(AccessError::Configuration { .. })));

    let not_an_id = factory.create(&json!({"patient_list": "List/test-list"}), client);
    assert!(matches!(not_an_id, Err(AccessError::Configuration { .. })));
}

#[test]
fn test_factory_reads_verified_token() {
    let token = jsonwebtoken::TokenData {
        header: jsonwebtoken::Header::default(),
        claims: json!({"sub": "u1", "patient_list": TEST_LIST_ID}),
    };
    let checker = AccessCheckerFactory::new()
        .create(&token, Arc::new(FixtureClient::default()))
        .unwrap();
    assert_eq!(checker.list_id(), TEST_LIST_ID);
}
