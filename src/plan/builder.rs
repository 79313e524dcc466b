use chrono::{DateTime, Utc};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::collectors::{CollectorError, FailingCollector};
use crate::output::DiscardOutput;
use crate::topology::{Component, ComponentKind, Host, Status, Topology};

use super::discovery::{Discovery, PreparationError};
use super::duration::DurationError;
use super::metric::MetricWindow;
use super::operation::Operation;
use super::options::InspectOptions;
use super::profile::ProfileTarget;
use super::target::{TargetError, TargetOption, TargetSpec};
use super::{basic, component_addr, config, dbinfo, logs, meta, metric, profile, Category, Plan};

/// Errors that abort plan construction
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("invalid metric duration: {0}")]
    Duration(#[from] DurationError),

    #[error("failed to snapshot run inputs: {0}")]
    Snapshot(#[from] CollectorError),
}

/// Cluster-wide facts accumulated while walking hosts and components
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildState {
    /// An explicit `profile:service:ip:port` target was planned
    pub has_profiled: bool,
    /// Schema enumeration was planned against some TiDB instance
    pub db_collected: bool,
    /// Metric export was planned against some Prometheus instance
    pub metric_collected: bool,
}

/// Inputs shared by every per-host step of one build
struct Scope<'s> {
    targets: &'s TargetSpec,
    root: &'s Path,
    window: Option<&'s MetricWindow>,
}

/// Builds the [`Plan`] of one inspection run.
pub struct PlanBuilder<'a> {
    topology: &'a Topology,
    options: &'a InspectOptions,
    discovery: &'a dyn Discovery,
    client: &'a Client,
    now: DateTime<Utc>,
}

impl<'a> PlanBuilder<'a> {
    pub fn new(
        topology: &'a Topology,
        options: &'a InspectOptions,
        discovery: &'a dyn Discovery,
        client: &'a Client,
    ) -> Self {
        Self {
            topology,
            options,
            discovery,
            client,
            now: Utc::now(),
        }
    }

    /// Pin the run's start time, which anchors relative metric windows
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub async fn build(&self) -> Result<Plan, PlanError> {
        let targets = TargetSpec::parse(&self.options.collect)?;
        targets.validate(self.options)?;

        let root: PathBuf = self.options.inspection_dir();
        let window = if targets.contains(Category::Metric) {
            Some(MetricWindow::resolve(targets.option(Category::Metric), self.options, self.now)?)
        } else {
            None
        };

        info!(
            "Planning inspection {} of cluster '{}' into {}",
            self.options.inspection_id,
            self.topology.cluster_name,
            root.display()
        );
        if self.topology.status != Status::Success {
            warn!("Topology of '{}' was discovered with errors", self.topology.cluster_name);
        }

        let mut plan = Plan::new(&self.options.inspection_id);
        plan.group_mut(Category::Setup)
            .add_ops(meta::setup_ops(&root, self.options, self.topology)?);
        plan.group_mut(Category::Teardown)
            .add_op(meta::teardown_op(&root, self.topology, self.now));

        let mut state = BuildState::default();
        match targets.option(Category::Profile) {
            Some(TargetOption::Parts(parts)) => {
                let target = ProfileTarget::from_parts(parts)?;
                state = self.plan_profile_target(&mut plan, &root, &target, state)?;
            }
            Some(TargetOption::Value(value)) => {
                return Err(TargetError::InvalidOption {
                    category: Category::Profile,
                    value: value.clone(),
                    reason: "expected service:ip:port".to_string(),
                }
                .into());
            }
            Some(TargetOption::Flag) | None => {}
        }

        let scope = Scope {
            targets: &targets,
            root: &root,
            window: window.as_ref(),
        };
        for host in &self.topology.hosts {
            state = self.plan_host(&mut plan, &scope, host, state).await;
        }

        if targets.contains(Category::Log) {
            plan.group_mut(Category::Log)
                .add_op(logs::spliter_op(&root, self.options)?);
        }

        for group in plan.groups() {
            debug!("Group {} has {} operations", group.name(), group.len());
        }
        info!("Planned {} operations", plan.total_operations());
        Ok(plan)
    }

    /// Profile exactly the requested instance and nothing else
    fn plan_profile_target(
        &self,
        plan: &mut Plan,
        root: &Path,
        target: &ProfileTarget,
        mut state: BuildState,
    ) -> Result<BuildState, PlanError> {
        let user = self
            .topology
            .hosts
            .iter()
            .find(|h| h.ip == target.ip)
            .map(|h| h.user.as_str())
            .unwrap_or_default();

        let ops = profile::service_ops(self.client, root, target.service, user, &target.ip, target.port, self.options)
            .ok_or_else(|| TargetError::InvalidOption {
                category: Category::Profile,
                value: format!("{}:{}:{}", target.service, target.ip, target.port),
                reason: format!("{} cannot be profiled", target.service),
            })?;

        info!("Profiling only {} at {}:{}", target.service, target.ip, target.port);
        plan.group_mut(Category::Profile).add_ops(ops);
        state.has_profiled = true;
        Ok(state)
    }

    async fn plan_host(&self, plan: &mut Plan, scope: &Scope<'_>, host: &Host, mut state: BuildState) -> BuildState {
        if host.status != Status::Success {
            warn!("Host {} reported errors, collecting what is reachable", host.ip);
        }

        if scope.targets.contains(Category::Basic) {
            plan.group_mut(Category::Basic)
                .add_ops(basic::host_ops(scope.root, host));
        }

        for component in &host.components {
            if !component.is_healthy() {
                warn!(
                    "Skipping {} on {}: status is {:?}",
                    component.name, host.ip, component.status
                );
                continue;
            }
            state = self.plan_component(plan, scope, host, component, state).await;
        }

        state
    }

    async fn plan_component(
        &self,
        plan: &mut Plan,
        scope: &Scope<'_>,
        host: &Host,
        component: &Component,
        mut state: BuildState,
    ) -> BuildState {
        match component.name {
            ComponentKind::Tidb => {
                self.plan_auto_profile(plan, scope, host, component, state);
                self.plan_config(plan, scope, host, component);
                if scope.targets.contains(Category::DbInfo) && !state.db_collected {
                    state.db_collected = self.plan_dbinfo(plan, scope, host, component).await;
                }
            }
            ComponentKind::Tikv | ComponentKind::Pd => {
                self.plan_config(plan, scope, host, component);
                self.plan_auto_profile(plan, scope, host, component, state);
            }
            ComponentKind::Prometheus => {
                if let (Some(window), false) = (scope.window, state.metric_collected) {
                    state.metric_collected = self.plan_metric(plan, scope, host, component, window).await;
                }
            }
            ComponentKind::Alertmanager
            | ComponentKind::Grafana
            | ComponentKind::NodeExporter
            | ComponentKind::BlackboxExporter
            | ComponentKind::Pushgateway
            | ComponentKind::Unknown => {
                debug!("Nothing to collect from {} on {}", component.name, host.ip);
            }
        }
        state
    }

    fn plan_auto_profile(&self, plan: &mut Plan, scope: &Scope<'_>, host: &Host, component: &Component, state: BuildState) {
        if !scope.targets.contains(Category::Profile) || state.has_profiled {
            return;
        }
        let Some(port) = component.status_addr_port() else {
            warn!("Cannot profile {} on {}: no port in topology", component.name, host.ip);
            return;
        };
        if let Some(ops) = profile::service_ops(self.client, scope.root, component.name, &host.user, &host.ip, port, self.options) {
            plan.group_mut(Category::Profile).add_ops(ops);
        }
    }

    fn plan_config(&self, plan: &mut Plan, scope: &Scope<'_>, host: &Host, component: &Component) {
        if !scope.targets.contains(Category::Config) {
            return;
        }
        if let Some(op) = config::config_op(scope.root, &host.user, &host.ip, component) {
            plan.group_mut(Category::Config).add_op(op);
        }
    }

    /// Returns whether schema collection is now planned
    async fn plan_dbinfo(&self, plan: &mut Plan, scope: &Scope<'_>, host: &Host, component: &Component) -> bool {
        let Some(port) = component.status_addr_port() else {
            warn!("Cannot read schema from tidb on {}: no status port in topology", host.ip);
            return false;
        };
        let addr = component_addr(&host.ip, Some(port));
        let result = dbinfo::schema_ops(self.client, self.discovery, scope.root, &addr, self.options.http_timeout()).await;
        plan.group_mut(Category::DbInfo)
            .add_ops(isolate_failure("database discovery", &addr, result));
        true
    }

    /// Returns whether metric export is now planned
    async fn plan_metric(
        &self,
        plan: &mut Plan,
        scope: &Scope<'_>,
        host: &Host,
        component: &Component,
        window: &MetricWindow,
    ) -> bool {
        let Some(port) = component.port else {
            warn!("Cannot export metrics from prometheus on {}: no port in topology", host.ip);
            return false;
        };
        let addr = component_addr(&host.ip, Some(port));
        let timeout = self.options.http_timeout();
        let result = metric::metric_ops(self.client, self.discovery, scope.root, &addr, window, timeout).await;

        let group = plan.group_mut(Category::Metric);
        group.add_ops(isolate_failure("metric discovery", &addr, result));
        group.add_op(metric::alert_op(self.client, scope.root, &addr, timeout));
        true
    }
}

/// A failed discovery becomes one operation that reports the failure when run,
/// so the rest of the plan is unaffected.
fn isolate_failure(
    what: &str,
    addr: &str,
    result: Result<Vec<Operation>, PreparationError>,
) -> Vec<Operation> {
    match result {
        Ok(ops) => ops,
        Err(e) => {
            warn!("{} on {} failed: {}", what, addr, e);
            vec![Operation::new(
                FailingCollector::new(format!("{} on {}", what, addr), e.to_string()),
                DiscardOutput,
            )]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::operation::OperationError;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubDiscovery {
        databases: Option<Vec<String>>,
        metrics: Option<Vec<String>>,
        database_calls: AtomicUsize,
    }

    impl StubDiscovery {
        fn healthy() -> Self {
            Self {
                databases: Some(vec!["test".to_string()]),
                metrics: Some(vec![
                    "up".to_string(),
                    "ALERTS".to_string(),
                    "tidb_server_query_total".to_string(),
                ]),
                database_calls: AtomicUsize::new(0),
            }
        }

        fn unreachable() -> Self {
            Self {
                databases: None,
                metrics: None,
                database_calls: AtomicUsize::new(0),
            }
        }
    }

    fn refused(addr: &str) -> PreparationError {
        PreparationError::Request {
            addr: addr.to_string(),
            source: CollectorError::ConnectionFailed("connection refused".to_string()),
        }
    }

    #[async_trait]
    impl Discovery for StubDiscovery {
        async fn list_databases(&self, status_addr: &str) -> Result<Vec<String>, PreparationError> {
            self.database_calls.fetch_add(1, Ordering::SeqCst);
            self.databases.clone().ok_or_else(|| refused(status_addr))
        }

        async fn list_metrics(&self, prometheus_addr: &str) -> Result<Vec<String>, PreparationError> {
            self.metrics.clone().ok_or_else(|| refused(prometheus_addr))
        }
    }

    fn component(name: ComponentKind, port: u16, status_port: Option<u16>) -> Component {
        Component {
            name,
            status: Status::Success,
            deploy_dir: format!("/data/deploy/{}", name),
            port: Some(port),
            status_port,
        }
    }

    fn host(ip: &str, components: Vec<Component>) -> Host {
        Host {
            ip: ip.to_string(),
            user: "tidb".to_string(),
            status: Status::Success,
            components,
        }
    }

    fn single_host_topology() -> Topology {
        Topology {
            cluster_name: "test-cluster".to_string(),
            status: Status::Success,
            hosts: vec![host(
                "10.0.0.1",
                vec![
                    component(ComponentKind::Tidb, 4000, Some(10080)),
                    component(ComponentKind::Tikv, 20160, Some(20180)),
                    component(ComponentKind::Pd, 2379, None),
                    component(ComponentKind::Prometheus, 9090, None),
                ],
            )],
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    async fn build(topology: &Topology, collect: &str, discovery: &StubDiscovery) -> Result<Plan, PlanError> {
        let options = InspectOptions::new("insp-1", "/data", collect);
        PlanBuilder::new(topology, &options, discovery, &Client::new()).with_now(now()).build().await
    }

    fn labels(plan: &Plan, category: Category) -> Vec<String> {
        plan.group(category).operations().iter().map(Operation::label).collect()
    }

    #[tokio::test]
    async fn test_full_plan_for_single_host() {
        let topology = single_host_topology();
        let discovery = StubDiscovery::healthy();
        let plan = build(&topology, "basic,profile,metric,config,dbinfo", &discovery).await.unwrap();

        assert_eq!(plan.group(Category::Setup).len(), 3);
        assert_eq!(plan.group(Category::Teardown).len(), 1);
        assert_eq!(plan.group(Category::Basic).len(), 5);
        assert_eq!(plan.group(Category::DbInfo).len(), 1);
        assert_eq!(plan.group(Category::Config).len(), 3);
        assert!(plan.group(Category::Log).is_empty());

        // 8 pprof profiles each for tidb and pd, one perf recording for tikv
        let profile = labels(&plan, Category::Profile);
        assert_eq!(profile.len(), 17);
        assert_eq!(profile.iter().collect::<HashSet<_>>().len(), profile.len());
        assert_eq!(profile.iter().filter(|l| l.contains("/profile/tidb/10.0.0.1:10080/")).count(), 8);
        assert_eq!(profile.iter().filter(|l| l.contains("/profile/pd/10.0.0.1:2379/")).count(), 8);
        assert_eq!(profile.iter().filter(|l| l.ends_with("/profile/tikv/10.0.0.1:20160/perf.data")).count(), 1);

        // ALERTS is exported through the alert query only
        let metric = labels(&plan, Category::Metric);
        assert_eq!(metric.len(), 3);
        assert!(metric.iter().any(|l| l.ends_with("/metric/up_1709290800_to_1709294400_60s.json")));
        assert!(metric.iter().any(|l| l.ends_with("/metric/alert.json")));
        assert!(!metric.iter().any(|l| l.contains("ALERTS_")));

        let dbinfo = labels(&plan, Category::DbInfo);
        assert!(dbinfo[0].starts_with("test http://10.0.0.1:10080/schema/test"));
        assert!(dbinfo[0].ends_with("/data/insp-1/dbinfo/test.json"));
    }

    #[tokio::test]
    async fn test_schema_collected_once_per_cluster() {
        let topology = Topology {
            cluster_name: "two-tidb".to_string(),
            status: Status::Success,
            hosts: vec![
                host("10.0.0.1", vec![component(ComponentKind::Tidb, 4000, Some(10080))]),
                host("10.0.0.2", vec![component(ComponentKind::Tidb, 4000, Some(10080))]),
            ],
        };
        let discovery = StubDiscovery::healthy();
        let plan = build(&topology, "dbinfo,config", &discovery).await.unwrap();

        assert_eq!(plan.group(Category::DbInfo).len(), 1);
        assert_eq!(discovery.database_calls.load(Ordering::SeqCst), 1);
        assert_eq!(plan.group(Category::Config).len(), 2);
    }

    #[tokio::test]
    async fn test_explicit_profile_target_suppresses_automatic_profiling() {
        let topology = single_host_topology();
        let discovery = StubDiscovery::healthy();
        let plan = build(
            &topology,
            "profile:tidb:10.0.0.1:10080,profile:pd:10.0.0.1:2379",
            &discovery,
        )
        .await
        .unwrap();

        let profile = labels(&plan, Category::Profile);
        assert_eq!(profile.len(), 8);
        assert!(profile.iter().all(|l| l.contains("/profile/tidb/10.0.0.1:10080/")));
    }

    #[tokio::test]
    async fn test_explicit_profile_target_must_be_profilable() {
        let topology = single_host_topology();
        let discovery = StubDiscovery::healthy();
        let err = build(&topology, "profile:prometheus:10.0.0.1:9090", &discovery)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, PlanError::Target(TargetError::InvalidOption { .. })));

        let err = build(&topology, "profile:tidb", &discovery).await.err().unwrap();
        assert!(matches!(
            err,
            PlanError::Target(TargetError::InvalidOption { category: Category::Profile, .. })
        ));
    }

    #[tokio::test]
    async fn test_unhealthy_component_is_skipped() {
        let mut topology = single_host_topology();
        for c in &mut topology.hosts[0].components {
            if c.name == ComponentKind::Tikv {
                c.status = Status::Exception;
            }
        }
        let discovery = StubDiscovery::healthy();
        let plan = build(&topology, "profile,config", &discovery).await.unwrap();

        assert_eq!(plan.group(Category::Config).len(), 2);
        assert!(!labels(&plan, Category::Profile).iter().any(|l| l.contains("tikv")));
        assert!(!labels(&plan, Category::Config).iter().any(|l| l.contains("tikv")));
    }

    #[tokio::test]
    async fn test_discovery_failure_is_isolated() {
        let topology = single_host_topology();
        let discovery = StubDiscovery::unreachable();
        let plan = build(&topology, "basic,metric,dbinfo", &discovery).await.unwrap();

        assert_eq!(plan.group(Category::Basic).len(), 5);
        assert_eq!(plan.group(Category::DbInfo).len(), 1);
        let err = plan.group(Category::DbInfo).operations()[0].run().await.unwrap_err();
        assert!(err.is_preparation_failure());
        assert!(matches!(
            err,
            OperationError::Collection(CollectorError::PreparationFailed(ref cause)) if cause.contains("connection refused")
        ));

        // the alert query does not depend on discovery
        let metric = labels(&plan, Category::Metric);
        assert_eq!(metric.len(), 2);
        assert!(metric[0].starts_with("metric discovery on 10.0.0.1:9090"));
    }

    #[tokio::test]
    async fn test_absolute_metric_window() {
        let topology = single_host_topology();
        let discovery = StubDiscovery::healthy();
        let begin = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let options = InspectOptions::new("insp-1", "/data", "metric").with_window(begin, end);

        let plan = PlanBuilder::new(&topology, &options, &discovery, &Client::new()).build().await.unwrap();
        assert!(labels(&plan, Category::Metric)
            .iter()
            .any(|l| l.ends_with("/metric/up_1709280000_to_1709287200_120s.json")));
    }

    #[tokio::test]
    async fn test_duration_option_wins_over_lone_bound() {
        let topology = single_host_topology();
        let discovery = StubDiscovery::healthy();
        let begin = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let mut options = InspectOptions::new("insp-1", "/data", "metric:2h");
        options.begin = Some(begin);

        let plan = PlanBuilder::new(&topology, &options, &discovery, &Client::new())
            .with_now(now())
            .build()
            .await
            .unwrap();
        // 2024-03-01 10:00 to 12:00, anchored at now
        assert!(labels(&plan, Category::Metric)
            .iter()
            .any(|l| l.ends_with("/metric/up_1709287200_to_1709294400_120s.json")));
    }

    #[tokio::test]
    async fn test_invalid_targets_are_fatal() {
        let topology = single_host_topology();
        let discovery = StubDiscovery::healthy();

        let err = build(&topology, "basic,bogus", &discovery).await.err().unwrap();
        assert!(matches!(err, PlanError::Target(TargetError::Unsupported(ref name)) if name == "bogus"));

        let err = build(&topology, "log", &discovery).await.err().unwrap();
        assert!(matches!(err, PlanError::Target(TargetError::MissingArgument { category: Category::Log, .. })));

        let err = build(&topology, "metric:1x", &discovery).await.err().unwrap();
        assert!(matches!(err, PlanError::Duration(DurationError::InvalidFormat { found: 'x', .. })));

        let err = build(&topology, "metric:1h:2h", &discovery).await.err().unwrap();
        assert!(matches!(
            err,
            PlanError::Target(TargetError::InvalidOption { category: Category::Metric, .. })
        ));
    }

    #[tokio::test]
    async fn test_metadata_groups_always_present() {
        let topology = single_host_topology();
        let discovery = StubDiscovery::healthy();
        let plan = build(&topology, "basic", &discovery).await.unwrap();

        let setup = labels(&plan, Category::Setup);
        assert_eq!(setup.len(), 3);
        assert!(setup[0].ends_with("/data/insp-1/args.json"));
        assert!(setup[1].ends_with("/data/insp-1/env.json"));
        assert!(setup[2].ends_with("/data/insp-1/topology.json"));

        let teardown = plan.group(Category::Teardown);
        assert_eq!(teardown.len(), 1);
        assert!(teardown.operations()[0].has_pre_hook());
        assert!(teardown.operations()[0].label().ends_with("/data/insp-1/meta.json"));

        for category in [Category::Profile, Category::Metric, Category::Config, Category::DbInfo, Category::Log] {
            assert!(plan.group(category).is_empty(), "{} should be empty", category);
        }
    }

    #[tokio::test]
    async fn test_log_target_plans_spliter() {
        let topology = single_host_topology();
        let discovery = StubDiscovery::healthy();
        let begin = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let options = InspectOptions::new("insp-1", "/data", "log")
            .with_log_source("/data/remote-log/c1", "/opt/diag/bin/spliter")
            .with_window(begin, now());

        let plan = PlanBuilder::new(&topology, &options, &discovery, &Client::new()).build().await.unwrap();
        assert_eq!(labels(&plan, Category::Log), vec!["exec /opt/diag/bin/spliter -> discard"]);
    }
}
