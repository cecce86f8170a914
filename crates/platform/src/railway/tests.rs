use serde_json::json;

use super::client::{create_input_json, fold_ack};
use super::graphql::{
    classify_error_message, is_already_applied, DeploymentStopData, GraphQlResponse,
    ServiceDeleteData, ServicesData,
};
use crate::status::DeploymentStatus;
use crate::traits::{Ack, PlatformError, ServiceCreateInput, ServiceSource, ServiceSummary};

#[test]
fn classify_maps_messages_onto_taxonomy() {
    assert!(matches!(
        classify_error_message("Not Authorized"),
        PlatformError::Unauthorized(_)
    ));
    assert!(matches!(
        classify_error_message("Service not found"),
        PlatformError::NotFound(_)
    ));
    assert!(matches!(
        classify_error_message("Deployment does not exist"),
        PlatformError::NotFound(_)
    ));
    assert!(matches!(
        classify_error_message("Problem processing request"),
        PlatformError::Rejected(_)
    ));
}

#[test]
fn already_applied_detection() {
    assert!(is_already_applied("Deployment is already stopped"));
    assert!(is_already_applied("service already deleted"));
    assert!(!is_already_applied("Deployment is stopped"));
    assert!(!is_already_applied("already in progress"));
}

#[test]
fn mutation_results_fold_into_acks() {
    let stopped = fold_ack(
        "deploymentStop",
        Ok(DeploymentStopData { deployment_stop: true }),
        |d: DeploymentStopData| d.deployment_stop,
    );
    assert_eq!(stopped, Ok(Ack::Applied));

    let refused = fold_ack(
        "serviceDelete",
        Ok(ServiceDeleteData { service_delete: false }),
        |d: ServiceDeleteData| d.service_delete,
    );
    assert_eq!(
        refused,
        Err(PlatformError::Rejected("serviceDelete returned false".into()))
    );

    let already = fold_ack(
        "deploymentStop",
        Err(PlatformError::Rejected("Deployment is already stopped".into())),
        |d: DeploymentStopData| d.deployment_stop,
    );
    assert_eq!(already, Ok(Ack::AlreadyInTargetState));

    let transport = fold_ack(
        "serviceDelete",
        Err(PlatformError::Transport("HTTP 502".into())),
        |d: ServiceDeleteData| d.service_delete,
    );
    assert_eq!(transport, Err(PlatformError::Transport("HTTP 502".into())));
}

#[test]
fn errors_array_wins_over_data() {
    let resp: GraphQlResponse<DeploymentStopData> = serde_json::from_value(json!({
        "data": { "deploymentStop": true },
        "errors": [{ "message": "Not Authorized" }]
    }))
    .unwrap();
    assert!(matches!(resp.into_result(), Err(PlatformError::Unauthorized(_))));
}

#[test]
fn missing_data_is_rejected() {
    let resp: GraphQlResponse<DeploymentStopData> =
        serde_json::from_value(json!({ "data": null })).unwrap();
    assert!(matches!(resp.into_result(), Err(PlatformError::Rejected(_))));
}

#[test]
fn services_listing_decodes() {
    let resp: GraphQlResponse<ServicesData> = serde_json::from_value(json!({
        "data": {
            "environment": {
                "id": "env-1",
                "serviceInstances": {
                    "edges": [
                        {
                            "node": {
                                "serviceId": "svc-1",
                                "serviceName": "api",
                                "latestDeployment": {
                                    "id": "dep-9",
                                    "status": "SUCCESS",
                                    "createdAt": "2026-03-01T12:00:00.000Z"
                                }
                            }
                        },
                        {
                            "node": {
                                "serviceId": "svc-2",
                                "serviceName": "worker",
                                "latestDeployment": null
                            }
                        }
                    ]
                }
            }
        }
    }))
    .unwrap();

    let env = resp.into_result().unwrap().environment.unwrap();
    let summaries: Vec<ServiceSummary> = env
        .service_instances
        .edges
        .into_iter()
        .map(|e| ServiceSummary::from(e.node))
        .collect();

    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].status, DeploymentStatus::Success);
    assert_eq!(summaries[0].latest_deployment_id.as_deref(), Some("dep-9"));
    assert!(summaries[0].last_deploy_time.is_some());
    assert_eq!(summaries[1].status, DeploymentStatus::Unknown);
    assert!(summaries[1].latest_deployment_id.is_none());
}

#[test]
fn missing_environment_decodes_to_none() {
    let resp: GraphQlResponse<ServicesData> =
        serde_json::from_value(json!({ "data": { "environment": null } })).unwrap();
    assert!(resp.into_result().unwrap().environment.is_none());
}

#[test]
fn create_input_carries_source_and_optional_environment() {
    let input = ServiceCreateInput {
        name: "preview-42".into(),
        project_id: "proj-1".into(),
        environment_id: None,
        source: ServiceSource::Repo("acme/api".into()),
    };
    let value = create_input_json(&input);
    assert_eq!(value["source"]["repo"], "acme/api");
    assert_eq!(value["projectId"], "proj-1");
    assert!(value.get("environmentId").is_none());

    let input = ServiceCreateInput {
        environment_id: Some("env-1".into()),
        source: ServiceSource::Image("nginx:latest".into()),
        ..input
    };
    let value = create_input_json(&input);
    assert_eq!(value["source"]["image"], "nginx:latest");
    assert_eq!(value["environmentId"], "env-1");
}
