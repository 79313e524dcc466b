use reqwest::Client;
use std::path::{Path, PathBuf};

use crate::collectors::{HttpCollector, SshCollector};
use crate::output::FileOutput;
use crate::topology::ComponentKind;

use super::operation::Operation;
use super::options::InspectOptions;
use super::target::TargetError;
use super::Category;

/// Profiles exposed by Go's `net/http/pprof`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PprofKind {
    Cpu,
    Heap,
    Block,
    Allocs,
    Goroutine,
    Mutex,
    ThreadCreate,
    Trace,
}

impl PprofKind {
    pub const ALL: [PprofKind; 8] = [
        PprofKind::Cpu,
        PprofKind::Heap,
        PprofKind::Block,
        PprofKind::Allocs,
        PprofKind::Goroutine,
        PprofKind::Mutex,
        PprofKind::ThreadCreate,
        PprofKind::Trace,
    ];

    pub fn endpoint(&self) -> &'static str {
        match self {
            PprofKind::Cpu => "/debug/pprof/profile",
            PprofKind::Heap => "/debug/pprof/heap",
            PprofKind::Block => "/debug/pprof/block",
            PprofKind::Allocs => "/debug/pprof/allocs",
            PprofKind::Goroutine => "/debug/pprof/goroutine",
            PprofKind::Mutex => "/debug/pprof/mutex",
            PprofKind::ThreadCreate => "/debug/pprof/threadcreate",
            PprofKind::Trace => "/debug/pprof/trace",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            PprofKind::Cpu => "cpu.pb.gz",
            PprofKind::Heap => "mem.pb.gz",
            PprofKind::Block => "block.pb.gz",
            PprofKind::Allocs => "allocs.pb.gz",
            PprofKind::Goroutine => "goroutine.pb.gz",
            PprofKind::Mutex => "mutex.pb.gz",
            PprofKind::ThreadCreate => "threadcreate.pb.gz",
            PprofKind::Trace => "trace.out",
        }
    }

    /// Sampled profiles block for `seconds` before the server answers
    pub fn is_sampled(&self) -> bool {
        matches!(self, PprofKind::Cpu | PprofKind::Trace)
    }

    fn name(&self) -> &'static str {
        self.file_name().split('.').next().unwrap_or_default()
    }
}

/// `profile/{service}/{ip}:{port}`
fn profile_dir(root: &Path, service: ComponentKind, ip: &str, port: u16) -> PathBuf {
    root.join("profile")
        .join(service.as_str())
        .join(format!("{}:{}", ip, port))
}

/// One operation per pprof profile of a Go service
pub fn pprof_ops(
    client: &Client,
    root: &Path,
    service: ComponentKind,
    ip: &str,
    port: u16,
    options: &InspectOptions,
) -> Vec<Operation> {
    let dir = profile_dir(root, service, ip, port);
    let addr = format!("{}:{}", ip, port);

    PprofKind::ALL
        .iter()
        .map(|kind| {
            let collector = HttpCollector::new(client, kind.name(), &addr, kind.endpoint());
            let collector = if kind.is_sampled() {
                collector
                    .with_param("seconds", options.profile_seconds)
                    .with_timeout(options.profile_timeout())
            } else {
                collector.with_timeout(options.http_timeout())
            };
            Operation::new(collector, FileOutput::new(dir.join(kind.file_name())))
        })
        .collect()
}

/// `perf record` against the process listening on `port`, streamed back as `perf.data`
pub fn perf_op(root: &Path, user: &str, ip: &str, port: u16, options: &InspectOptions) -> Operation {
    let remote = format!("/tmp/diagpilot_perf_{}.data", port);
    let command = format!(
        "perf record -F 99 -g -p $(/usr/sbin/lsof -tiTCP:{port} -sTCP:LISTEN -P -n) -o {remote} -- sleep {secs} >/dev/null 2>&1 && cat {remote} && rm -f {remote}",
        port = port,
        remote = remote,
        secs = options.profile_seconds,
    );
    Operation::new(
        SshCollector::new(user, ip, command),
        FileOutput::new(profile_dir(root, ComponentKind::Tikv, ip, port).join("perf.data")),
    )
}

/// Profiling operations for one service instance, or `None` when the kind is
/// not profiled at all
pub fn service_ops(
    client: &Client,
    root: &Path,
    service: ComponentKind,
    user: &str,
    ip: &str,
    port: u16,
    options: &InspectOptions,
) -> Option<Vec<Operation>> {
    match service {
        ComponentKind::Tidb | ComponentKind::Pd => Some(pprof_ops(client, root, service, ip, port, options)),
        ComponentKind::Tikv => Some(vec![perf_op(root, user, ip, port, options)]),
        ComponentKind::Prometheus
        | ComponentKind::Alertmanager
        | ComponentKind::Grafana
        | ComponentKind::NodeExporter
        | ComponentKind::BlackboxExporter
        | ComponentKind::Pushgateway
        | ComponentKind::Unknown => None,
    }
}

/// A single profiling target given as `service:ip:port`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileTarget {
    pub service: ComponentKind,
    pub ip: String,
    pub port: u16,
}

impl ProfileTarget {
    pub fn from_parts(parts: &[String]) -> Result<Self, TargetError> {
        let invalid = |reason: &str| TargetError::InvalidOption {
            category: Category::Profile,
            value: parts.join(":"),
            reason: reason.to_string(),
        };

        let [service, ip, port] = parts else {
            return Err(invalid("expected service:ip:port"));
        };
        let service = ComponentKind::parse(service).ok_or_else(|| invalid("unknown service"))?;
        let port = port.parse::<u16>().map_err(|_| invalid("port is not a number"))?;

        Ok(Self {
            service,
            ip: ip.clone(),
            port,
        })
    }
}
