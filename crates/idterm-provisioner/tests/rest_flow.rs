//! Full lifecycle against mocked AD Graph and ARM endpoints.

use std::sync::Arc;
use std::time::Duration;

use idterm_client::{Authorizer, AuthorizerProvider, ClientError, StaticToken};
use idterm_config::Settings;
use idterm_domain::{App, ProvisionPhase};
use idterm_provisioner::{ProvisionError, Provisioner, RetryPolicy};
use serde_json::json;
use wiremock::{
    matchers::{body_partial_json, header, method, path, path_regex, query_param},
    Mock, MockServer, ResponseTemplate,
};

const ASSIGNMENT_PATH: &str =
    r"^/subscriptions/sub-1/resourceGroups/rg-test/providers/Microsoft\.Authorization/roleAssignments/[0-9a-f-]{36}$";
const ASSIGNMENT_ID: &str =
    "/subscriptions/sub-1/resourceGroups/rg-test/providers/Microsoft.Authorization/roleAssignments/ra-1";

struct FixedTokens;

impl AuthorizerProvider for FixedTokens {
    fn graph_authorizer(&self) -> Result<Arc<dyn Authorizer>, ClientError> {
        Ok(Arc::new(StaticToken("graph-token".into())))
    }

    fn resource_management_authorizer(&self) -> Result<Arc<dyn Authorizer>, ClientError> {
        Ok(Arc::new(StaticToken("arm-token".into())))
    }
}

fn provisioner(graph: &MockServer, arm: &MockServer) -> Provisioner {
    let mut settings = Settings::new("tenant-1", "sub-1");
    settings.endpoints.graph = graph.uri();
    settings.endpoints.management = arm.uri();
    Provisioner::from_provider(settings, &FixedTokens)
        .unwrap()
        .with_retry_policy(RetryPolicy {
            initial_delay: Duration::from_millis(1),
            max_delay:     Duration::from_millis(5),
            max_attempts:  5,
            deadline:      Duration::from_secs(10),
        })
}

async fn mount_directory(graph: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/tenant-1/applications"))
        .and(query_param("api-version", "1.6"))
        .and(header("authorization", "Bearer graph-token"))
        .and(body_partial_json(json!({
            "displayName": "svc-test",
            "availableToOtherTenants": false,
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "appId":       "client-123",
            "objectId":    "app-obj-1",
            "displayName": "svc-test",
        })))
        .expect(1)
        .mount(graph)
        .await;

    Mock::given(method("POST"))
        .and(path("/tenant-1/servicePrincipals"))
        .and(body_partial_json(json!({
            "appId": "client-123",
            "accountEnabled": true,
            "tags": ["env:test"],
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "objectId": "sp-obj-1",
            "appId":    "client-123",
        })))
        .expect(1)
        .mount(graph)
        .await;
}

fn assignment_body() -> serde_json::Value {
    json!({
        "id":   ASSIGNMENT_ID,
        "name": "ra-1",
        "properties": {
            "scope":            "/subscriptions/sub-1/resourceGroups/rg-test",
            "roleDefinitionId": "/subscriptions/sub-1/providers/Microsoft.Authorization/roleDefinitions/acdd72a7-3385-48ef-bd42-f606fba81ae7",
            "principalId":      "sp-obj-1",
        }
    })
}

#[tokio::test]
async fn provision_then_deprovision() {
    let graph = MockServer::start().await;
    let arm = MockServer::start().await;
    mount_directory(&graph).await;

    // The principal is not visible to ARM on the first attempt.
    Mock::given(method("PUT"))
        .and(path_regex(ASSIGNMENT_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": "PrincipalNotFound",
                "message": "Principal sp-obj-1 does not exist in the directory tenant-1.",
            }
        })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&arm)
        .await;
    Mock::given(method("PUT"))
        .and(path_regex(ASSIGNMENT_PATH))
        .and(header("authorization", "Bearer arm-token"))
        .and(body_partial_json(json!({
            "properties": { "principalId": "sp-obj-1", "principalType": "ServicePrincipal" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(assignment_body()))
        .expect(1)
        .mount(&arm)
        .await;

    let p = provisioner(&graph, &arm);
    let mut app = p
        .provision(App::new("svc-test", "24h", vec!["env:test".into()], "rg-test"))
        .await
        .unwrap();

    assert_eq!(app.client_id, "client-123");
    assert_eq!(app.tenant_id, "tenant-1");
    assert_eq!(app.service_principal.object_id, "sp-obj-1");
    assert_eq!(app.role_assignment.object_id, ASSIGNMENT_ID);
    assert_eq!(app.role_assignment.name, "ra-1");
    assert_eq!(app.phase(), ProvisionPhase::RoleAssigned);

    Mock::given(method("DELETE"))
        .and(path(ASSIGNMENT_ID))
        .respond_with(ResponseTemplate::new(200).set_body_json(assignment_body()))
        .expect(1)
        .mount(&arm)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/tenant-1/applications/app-obj-1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&graph)
        .await;

    p.deprovision(&mut app).await.unwrap();
    assert_eq!(app.phase(), ProvisionPhase::Pending);
}

#[tokio::test]
async fn forbidden_role_assignment_leaves_partial_state() {
    let graph = MockServer::start().await;
    let arm = MockServer::start().await;
    mount_directory(&graph).await;

    Mock::given(method("PUT"))
        .and(path_regex(ASSIGNMENT_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": { "code": "AuthorizationFailed", "message": "caller lacks write on roleAssignments" }
        })))
        .expect(1)
        .mount(&arm)
        .await;

    let partial = provisioner(&graph, &arm)
        .provision(App::new("svc-test", "24h", vec!["env:test".into()], "rg-test"))
        .await
        .unwrap_err();

    assert_eq!(partial.phase, ProvisionPhase::PrincipalCreated);
    assert_eq!(partial.app.object_id, "app-obj-1");
    match partial.error {
        ProvisionError::Authorization(e) => assert_eq!(e.code(), Some("AuthorizationFailed")),
        other => panic!("expected Authorization, got {}", other),
    }
}
