use std::path::Path;

use crate::collectors::SshCollector;
use crate::output::FileOutput;
use crate::topology::{Component, ComponentKind};

use super::component_addr;
use super::operation::Operation;

/// Fetch `{deploy_dir}/conf/{service}.toml` into `config/{ip}:{port}/{service}.toml`.
/// Only TiDB, TiKV and PD ship a TOML config.
pub fn config_op(root: &Path, user: &str, ip: &str, component: &Component) -> Option<Operation> {
    let service = match component.name {
        ComponentKind::Tidb | ComponentKind::Tikv | ComponentKind::Pd => component.name.as_str(),
        _ => return None,
    };

    let deploy_dir = component.deploy_dir.trim_end_matches('/');
    let command = format!("cat {}/conf/{}.toml", deploy_dir, service);
    let file = root
        .join("config")
        .join(component_addr(ip, component.port))
        .join(format!("{}.toml", service));

    Some(Operation::new(SshCollector::new(user, ip, command), FileOutput::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Status;

    fn component(name: ComponentKind, port: u16) -> Component {
        Component {
            name,
            status: Status::Success,
            deploy_dir: "/data/deploy/".to_string(),
            port: Some(port),
            status_port: None,
        }
    }

    #[test]
    fn test_config_op_path_and_command() {
        let op = config_op(Path::new("/r"), "tidb", "10.0.0.1", &component(ComponentKind::Tikv, 20160)).unwrap();
        assert_eq!(
            op.label(),
            "ssh tidb@10.0.0.1 'cat /data/deploy/conf/tikv.toml' -> /r/config/10.0.0.1:20160/tikv.toml"
        );
    }

    #[test]
    fn test_services_without_config_are_skipped() {
        assert!(config_op(Path::new("/r"), "tidb", "10.0.0.1", &component(ComponentKind::Prometheus, 9090)).is_none());
        assert!(config_op(Path::new("/r"), "tidb", "10.0.0.1", &component(ComponentKind::Grafana, 3000)).is_none());
    }
}
