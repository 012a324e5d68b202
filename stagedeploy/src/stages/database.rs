use super::broker::uninstall_release;
use super::{provisioning, StageDriver, TeardownAction};
use crate::adapters::{Adapters, DatabaseAdapter, DbConnection, ReleaseAdapter, ReleaseValues};
use crate::config::DatabaseConfig;
use crate::context::StageView;
use crate::core::ResourceId;
use crate::errors::{DeployError, DeployResult};
use crate::provision::{ConfigResolver, ReleaseProbe, ResourceProbe};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};

/// Operational database release.
///
/// The post-condition writes a health-check row and reads it back. The
/// write is an upsert so a re-run against a ready database stays a no-op.
pub struct DatabaseDriver {
    config: DatabaseConfig,
    resource: ResourceId,
    pull_secret: Option<String>,
    releases: Arc<dyn ReleaseAdapter>,
    database: Arc<dyn DatabaseAdapter>,
    probe: ReleaseProbe,
}

impl DatabaseDriver {
    /// Creates the driver. `pull_secret` is referenced from the chart when set.
    #[must_use]
    pub fn new(config: DatabaseConfig, adapters: &Adapters, pull_secret: Option<String>) -> Self {
        let probe = ReleaseProbe::new(
            adapters.releases.clone(),
            adapters.kube.clone(),
            config.selector(),
            config.replicas,
        );
        Self {
            resource: config.resource(),
            config,
            pull_secret,
            releases: adapters.releases.clone(),
            database: adapters.database.clone(),
            probe,
        }
    }

    /// Chart values, including the license, schema and procedure files.
    #[must_use]
    pub fn values(&self) -> ReleaseValues {
        let c = &self.config;
        let mut values = ReleaseValues::new()
            .set("global.voltdbVersion", c.product_version.as_str())
            .set("cluster.clusterSpec.replicas", c.replicas)
            .set("cluster.config.deployment.cluster.kfactor", c.kfactor)
            .set("cluster.config.deployment.cluster.sitesperhost", c.sites_per_host)
            .set("security.internalHostAuth.enabled", true)
            .set_file("cluster.config.licenseXMLFile", &c.license_file)
            .set_file(format!("cluster.config.schemas.{}", c.ddl_key), &c.ddl_file)
            .set_file(format!("cluster.config.classes.{}", c.jar_key), &c.jar_file);
        if let Some(secret) = &self.pull_secret {
            values = values.set("imagePullSecrets", json!([{ "name": secret }]));
        }
        values
    }

    /// Where health-check statements run.
    #[must_use]
    pub fn connection(&self) -> DbConnection {
        let c = &self.config;
        DbConnection {
            namespace: c.namespace.clone(),
            pod: format!("{}-0", c.statefulset()),
            address: ConfigResolver::service_address(
                &self.resource,
                Some("voltdb-cluster-client"),
                c.port,
            )
            .unwrap_or_default(),
        }
    }
}

#[async_trait]
impl StageDriver for DatabaseDriver {
    fn probe(&self) -> &dyn ResourceProbe {
        &self.probe
    }

    async fn provision(&self, _view: &StageView<'_>) -> DeployResult<()> {
        let c = &self.config;
        let fail = provisioning(&self.resource);
        self.releases
            .add_repository(&c.chart.repository())
            .await
            .map_err(&fail)?;
        info!(
            version = %c.product_version,
            replicas = c.replicas,
            kfactor = c.kfactor,
            "Installing database"
        );
        self.releases
            .install_or_upgrade(&c.namespace, &c.release, &c.chart.chart_ref(), &self.values())
            .await
            .map_err(&fail)
    }

    async fn post_check(&self, _view: &StageView<'_>) -> DeployResult<()> {
        let c = &self.config;
        let connection = self.connection();
        let fail = |e: crate::errors::AdapterError| DeployError::connectivity(&self.resource, e.to_string());

        let upsert = format!("UPSERT INTO {} VALUES ('{}');", c.health_table, c.health_value);
        self.database
            .execute_statement(&connection, &upsert)
            .await
            .map_err(fail)?;

        let select = format!("SELECT COUNT(*) FROM {};", c.health_table);
        let output = self
            .database
            .execute_statement(&connection, &select)
            .await
            .map_err(fail)?;

        let rows = output
            .scalar()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(0);
        debug!(table = %c.health_table, rows, "Health check read back");
        if rows == 0 {
            return Err(DeployError::connectivity(
                &self.resource,
                format!("health row written to {} was not read back", c.health_table),
            ));
        }
        Ok(())
    }

    async fn teardown(&self) -> DeployResult<TeardownAction> {
        uninstall_release(self.releases.as_ref(), &self.resource).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{MockDatabaseAdapter, StatementOutput};
    use crate::context::{RunContext, RunIdentity};
    use crate::errors::AdapterError;
    use crate::pipeline::{StageParams, StageSpec};
    use crate::testing::FakeEnvironment;
    use mockall::predicate::{always, eq};
    use mockall::Sequence;
    use std::path::PathBuf;

    fn driver_with(database: MockDatabaseAdapter, pull_secret: Option<&str>) -> DatabaseDriver {
        let adapters = Adapters {
            database: Arc::new(database),
            ..Adapters::uniform(Arc::new(FakeEnvironment::new()))
        };
        DatabaseDriver::new(
            DatabaseConfig::default(),
            &adapters,
            pull_secret.map(str::to_string),
        )
    }

    fn count(n: &str) -> StatementOutput {
        StatementOutput {
            rows: vec![vec![n.to_string()]],
        }
    }

    async fn post_check(driver: &DatabaseDriver) -> DeployResult<()> {
        let spec = StageSpec::new(StageParams::Database(DatabaseConfig::default()));
        let ctx = RunContext::new(RunIdentity::new());
        driver.post_check(&ctx.view(&spec)).await
    }

    #[test]
    fn test_values() {
        let driver = driver_with(MockDatabaseAdapter::new(), Some("dockerio-registry"));
        let values = driver.values();

        assert_eq!(values.get("global.voltdbVersion"), Some(&json!("13.3.6")));
        assert_eq!(
            values.get("cluster.config.deployment.cluster.sitesperhost"),
            Some(&json!(8))
        );
        assert_eq!(
            values.get("imagePullSecrets"),
            Some(&json!([{ "name": "dockerio-registry" }]))
        );
        assert_eq!(
            values.files["cluster.config.schemas.vwap_ddl_sql"],
            PathBuf::from("ddl/vwap_ddl.sql")
        );
        assert_eq!(values.files.len(), 3);
    }

    #[test]
    fn test_values_without_pull_secret() {
        let driver = driver_with(MockDatabaseAdapter::new(), None);
        assert!(driver.values().get("imagePullSecrets").is_none());
    }

    #[test]
    fn test_connection() {
        let driver = driver_with(MockDatabaseAdapter::new(), None);
        let connection = driver.connection();
        assert_eq!(connection.pod, "volt-vwap-voltdb-cluster-0");
        assert_eq!(
            connection.address,
            "volt-vwap-voltdb-cluster-client.voltdb.svc.cluster.local:21212"
        );
    }

    #[tokio::test]
    async fn test_health_check_round_trip() {
        let mut seq = Sequence::new();
        let mut db = MockDatabaseAdapter::new();
        db.expect_execute_statement()
            .with(always(), eq("UPSERT INTO DUMMY VALUES ('X');"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(StatementOutput::default()));
        db.expect_execute_statement()
            .with(always(), eq("SELECT COUNT(*) FROM DUMMY;"))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(count("1")));

        post_check(&driver_with(db, None)).await.unwrap();
    }

    #[tokio::test]
    async fn test_write_error_is_connectivity() {
        let mut db = MockDatabaseAdapter::new();
        db.expect_execute_statement()
            .times(1)
            .returning(|_, _| Err(AdapterError::new("sqlcmd", "Connection refused")));

        let err = post_check(&driver_with(db, None)).await.unwrap_err();
        assert_eq!(err.kind(), "connectivity");
        assert!(err.to_string().contains("Connection refused"));
    }

    #[tokio::test]
    async fn test_empty_read_back_is_connectivity() {
        let mut db = MockDatabaseAdapter::new();
        db.expect_execute_statement()
            .returning(|_, sql| Ok(if sql.starts_with("SELECT") { count("0") } else { StatementOutput::default() }));

        let err = post_check(&driver_with(db, None)).await.unwrap_err();
        assert!(err.to_string().contains("was not read back"));
    }
}
