//! Unit tests for the KairosConfig reconciler

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::reconciler::{ReconcileOutcome, WAIT_REQUEUE};
    use crate::test_utils::*;
    use cluster_client::MockClusterClient;
    use crds::{
        ConditionStatus, Distribution, KairosConfig, Role, SecretKeyReference, find_condition, is_condition_true,
    };

    const NS: &str = "default";

    fn worker_config(name: &str) -> KairosConfig {
        let mut config = create_test_kairos_config(name, NS, Role::Worker);
        config.spec.worker_token = Some("inline-worker-token".to_string());
        config
    }

    /// Mock with an owner Machine and a fully ready Cluster
    fn ready_fixture(config: &KairosConfig) -> MockClusterClient {
        let client = MockClusterClient::new();
        let name = config.metadata.name.clone().unwrap_or_default();
        client.add_cluster(create_test_cluster("demo", NS, true, true));
        client.add_machine(create_test_machine(&name, NS, "demo", "demo-cp"));
        client.add_kairos_config(config.clone());
        client
    }

    /// The config as stored in the mock, i.e. with the last patched status
    fn stored(client: &MockClusterClient, name: &str) -> KairosConfig {
        client.kairos_config(NS, name).expect("KairosConfig exists")
    }

    #[tokio::test]
    async fn test_worker_bootstrap_data_secret_written() {
        let config = worker_config("worker-0");
        let client = ready_fixture(&config);
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.reconcile_kairos_config(&config).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);

        let secret = client.secret(NS, "worker-0").expect("data secret created");
        assert_eq!(secret.type_.as_deref(), Some(BOOTSTRAP_SECRET_TYPE));
        let owner = &secret.metadata.owner_references.as_ref().unwrap()[0];
        assert_eq!(owner.kind, "KairosConfig");
        assert_eq!(owner.name, "worker-0");

        let document = client.secret_string(NS, "worker-0", BOOTSTRAP_DATA_KEY).unwrap();
        assert!(document.starts_with("#cloud-config"));
        assert!(document.contains("k0s-worker"));
        assert!(document.contains("inline-worker-token"));
        assert_eq!(
            client.secret_string(NS, "worker-0", BOOTSTRAP_FORMAT_KEY).as_deref(),
            Some("cloud-config")
        );

        let status = stored(&client, "worker-0").status.unwrap();
        assert!(status.ready);
        assert_eq!(status.data_secret_name.as_deref(), Some("worker-0"));
        assert_eq!(status.observed_generation, Some(1));
        assert!(is_condition_true(&status.conditions, "Ready"));
        assert!(is_condition_true(&status.conditions, "BootstrapReady"));
        assert!(is_condition_true(&status.conditions, "DataSecretAvailable"));
    }

    #[tokio::test]
    async fn test_server_address_taken_from_cluster_endpoint() {
        let config = worker_config("worker-0");
        let client = ready_fixture(&config);
        let reconciler = create_test_reconciler(&client);

        reconciler.reconcile_kairos_config(&config).await.unwrap();

        // The rendered document only needs a server address to exist; an
        // unset spec.serverAddress would otherwise fail the worker render.
        assert!(stored(&client, "worker-0").status.unwrap().ready);
    }

    #[tokio::test]
    async fn test_worker_waits_for_control_plane_endpoint() {
        let config = worker_config("worker-0");
        let client = ready_fixture(&config);
        let mut cluster = create_test_cluster("demo", NS, true, true);
        cluster.spec.control_plane_endpoint = None;
        client.add_cluster(cluster);
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.reconcile_kairos_config(&config).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
        assert!(client.secret(NS, "worker-0").is_none());
        let waiting = stored(&client, "worker-0");
        let status = waiting.status.clone().unwrap();
        assert!(!status.ready);
        assert_eq!(status.failure_reason, None);
        assert_eq!(status.failure_message, None);
        let condition = find_condition(&status.conditions, "BootstrapReady").unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason.as_deref(), Some("WaitingForControlPlaneEndpoint"));

        // The endpoint shows up without any change to the KairosConfig
        client.add_cluster(create_test_cluster("demo", NS, true, true));
        let outcome = reconciler.reconcile_kairos_config(&waiting).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(stored(&client, "worker-0").status.unwrap().ready);
        assert!(
            client
                .secret_string(NS, "worker-0", BOOTSTRAP_DATA_KEY)
                .unwrap()
                .contains("k0s-worker")
        );
    }

    #[tokio::test]
    async fn test_ready_config_is_not_regenerated() {
        let config = worker_config("worker-0");
        let client = ready_fixture(&config);
        let reconciler = create_test_reconciler(&client);

        reconciler.reconcile_kairos_config(&config).await.unwrap();
        let patches = client.status_patch_count();

        let ready = stored(&client, "worker-0");
        let outcome = reconciler.reconcile_kairos_config(&ready).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert_eq!(client.status_patch_count(), patches);
    }

    #[tokio::test]
    async fn test_paused_config_is_skipped() {
        let mut config = worker_config("worker-0");
        config.spec.pause = true;
        let client = ready_fixture(&config);
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.reconcile_kairos_config(&config).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(client.secret(NS, "worker-0").is_none());
        assert_eq!(client.status_patch_count(), 0);
    }

    #[tokio::test]
    async fn test_waits_for_cluster_infrastructure() {
        let config = worker_config("worker-0");
        let client = MockClusterClient::new();
        client.add_cluster(create_test_cluster("demo", NS, false, false));
        client.add_machine(create_test_machine("worker-0", NS, "demo", "demo-cp"));
        client.add_kairos_config(config.clone());
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.reconcile_kairos_config(&config).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
        assert!(client.secret(NS, "worker-0").is_none());
        let status = stored(&client, "worker-0").status.unwrap();
        let condition = find_condition(&status.conditions, "BootstrapReady").unwrap();
        assert_eq!(condition.status, ConditionStatus::False);
        assert_eq!(condition.reason.as_deref(), Some("WaitingForClusterInfrastructure"));
    }

    #[tokio::test]
    async fn test_worker_waits_for_control_plane() {
        let config = worker_config("worker-0");
        let client = MockClusterClient::new();
        client.add_cluster(create_test_cluster("demo", NS, true, false));
        client.add_machine(create_test_machine("worker-0", NS, "demo", "demo-cp"));
        client.add_kairos_config(config.clone());
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.reconcile_kairos_config(&config).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
        let status = stored(&client, "worker-0").status.unwrap();
        let condition = find_condition(&status.conditions, "BootstrapReady").unwrap();
        assert_eq!(condition.reason.as_deref(), Some("WaitingForControlPlaneInitialization"));
    }

    #[tokio::test]
    async fn test_control_plane_config_does_not_wait_for_control_plane() {
        let config = create_test_kairos_config("cp-0", NS, Role::ControlPlane);
        let client = MockClusterClient::new();
        client.add_cluster(create_test_cluster("demo", NS, true, false));
        client.add_machine(create_test_machine("cp-0", NS, "demo", "demo-cp"));
        client.add_kairos_config(config.clone());
        let reconciler = create_test_reconciler(&client);

        reconciler.reconcile_kairos_config(&config).await.unwrap();

        let document = client.secret_string(NS, "cp-0", BOOTSTRAP_DATA_KEY).unwrap();
        assert!(document.contains("k0s:"));
        assert!(!document.contains("k0s-worker"));
    }

    #[tokio::test]
    async fn test_missing_owner_machine_requeues() {
        let config = worker_config("worker-0");
        let client = MockClusterClient::new();
        client.add_kairos_config(config.clone());
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.reconcile_kairos_config(&config).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::RequeueAfter(WAIT_REQUEUE));
    }

    #[tokio::test]
    async fn test_config_without_owner_waits() {
        let mut config = worker_config("worker-0");
        config.metadata.owner_references = None;
        let client = MockClusterClient::new();
        client.add_kairos_config(config.clone());
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.reconcile_kairos_config(&config).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        assert!(client.secret(NS, "worker-0").is_none());
    }

    #[tokio::test]
    async fn test_missing_token_is_sticky_until_generation_changes() {
        let mut config = worker_config("worker-0");
        config.spec.worker_token = None;
        let client = ready_fixture(&config);
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.reconcile_kairos_config(&config).await.unwrap();
        assert_eq!(outcome, ReconcileOutcome::Done);

        let failed = stored(&client, "worker-0");
        let status = failed.status.clone().unwrap();
        assert!(!status.ready);
        assert_eq!(status.failure_reason.as_deref(), Some("InvalidConfiguration"));
        assert!(status.failure_message.as_deref().unwrap().contains("worker token is required"));
        assert_eq!(status.observed_generation, Some(1));
        assert!(client.secret(NS, "worker-0").is_none());

        // Same generation: nothing happens
        let patches = client.status_patch_count();
        reconciler.reconcile_kairos_config(&failed).await.unwrap();
        assert_eq!(client.status_patch_count(), patches);

        // Fixed spec with a new generation: failure cleared and data written
        let mut fixed = failed;
        fixed.spec.worker_token = Some("fixed-token".to_string());
        fixed.metadata.generation = Some(2);
        client.add_kairos_config(fixed.clone());
        reconciler.reconcile_kairos_config(&fixed).await.unwrap();

        let status = stored(&client, "worker-0").status.unwrap();
        assert!(status.ready);
        assert_eq!(status.failure_reason, None);
        assert_eq!(status.failure_message, None);
        assert_eq!(status.observed_generation, Some(2));
        assert!(
            client
                .secret_string(NS, "worker-0", BOOTSTRAP_DATA_KEY)
                .unwrap()
                .contains("fixed-token")
        );
    }

    #[tokio::test]
    async fn test_unsupported_distribution_is_sticky() {
        let mut config = worker_config("worker-0");
        config.spec.distribution = Distribution::K3s;
        let client = ready_fixture(&config);
        let reconciler = create_test_reconciler(&client);

        let outcome = reconciler.reconcile_kairos_config(&config).await.unwrap();

        assert_eq!(outcome, ReconcileOutcome::Done);
        let status = stored(&client, "worker-0").status.unwrap();
        assert_eq!(status.failure_reason.as_deref(), Some("UnsupportedConfiguration"));
        assert_eq!(client.secret_lookup_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_token_secret_is_retried_not_sticky() {
        let mut config = worker_config("worker-0");
        config.spec.worker_token_secret_ref = Some(SecretKeyReference {
            name: "join".to_string(),
            namespace: None,
            key: "token".to_string(),
        });
        let client = ready_fixture(&config);
        let reconciler = create_test_reconciler(&client);

        let result = reconciler.reconcile_kairos_config(&config).await;
        assert!(result.is_err());

        let status = stored(&client, "worker-0").status.unwrap();
        assert_eq!(status.failure_reason, None);
        let condition = find_condition(&status.conditions, "BootstrapReady").unwrap();
        assert_eq!(condition.reason.as_deref(), Some("BootstrapDataSecretGenerationFailed"));

        // Once the Secret appears the next pass succeeds
        client.add_secret(NS, "join", &[("token", "secret-join-token")]);
        let retried = stored(&client, "worker-0");
        reconciler.reconcile_kairos_config(&retried).await.unwrap();

        assert!(stored(&client, "worker-0").status.unwrap().ready);
        assert!(
            client
                .secret_string(NS, "worker-0", BOOTSTRAP_DATA_KEY)
                .unwrap()
                .contains("secret-join-token")
        );
    }
}
