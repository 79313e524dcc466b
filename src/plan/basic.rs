use std::path::Path;

use crate::collectors::SshCollector;
use crate::output::FileOutput;
use crate::topology::Host;

use super::operation::Operation;

/// OS-level commands run on every host, with the file each one lands in
const HOST_COMMANDS: &[(&str, &str)] = &[
    ("dmesg.txt", "dmesg"),
    ("netstat.txt", "netstat -s"),
    ("vmstat.txt", "vmstat 1 5"),
    ("df.txt", "df -h"),
    ("meminfo.txt", "cat /proc/meminfo"),
];

/// Kernel log, network counters and resource usage of one host, under `basic/{ip}/`
pub fn host_ops(root: &Path, host: &Host) -> Vec<Operation> {
    let dir = root.join("basic").join(&host.ip);
    HOST_COMMANDS
        .iter()
        .map(|(file, command)| {
            Operation::new(
                SshCollector::new(&host.user, &host.ip, *command),
                FileOutput::new(dir.join(file)),
            )
        })
        .collect()
}
