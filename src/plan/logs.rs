use std::path::Path;

use crate::collectors::CommandCollector;
use crate::output::DiscardOutput;

use super::operation::Operation;
use super::options::InspectOptions;
use super::target::TargetError;
use super::Category;

/// Run the log spliter over the gathered remote logs. It writes the sliced
/// files into `log/` itself, so its stdout is discarded.
pub fn spliter_op(root: &Path, options: &InspectOptions) -> Result<Operation, TargetError> {
    let missing = |argument| TargetError::MissingArgument {
        category: Category::Log,
        argument,
    };
    let log_dir = options.log_dir.as_ref().ok_or_else(|| missing("log-dir"))?;
    let spliter = options.log_spliter.as_ref().ok_or_else(|| missing("log-spliter"))?;
    let begin = options.begin.ok_or_else(|| missing("begin"))?;
    let end = options.end.ok_or_else(|| missing("end"))?;

    let collector = CommandCollector::new(spliter)
        .arg(format!("--src={}", log_dir.display()))
        .arg(format!("--dst={}", root.join("log").display()))
        .arg(format!("--begin={}", begin.to_rfc3339()))
        .arg(format!("--end={}", end.to_rfc3339()));

    Ok(Operation::new(collector, DiscardOutput))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_spliter_op_requires_arguments() {
        let opts = InspectOptions::new("i", "/d", "log");
        assert_eq!(
            spliter_op(Path::new("/d/i"), &opts).unwrap_err(),
            TargetError::MissingArgument { category: Category::Log, argument: "log-dir" }
        );
    }

    #[test]
    fn test_spliter_op_label() {
        let begin = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let opts = InspectOptions::new("i", "/d", "log")
            .with_log_source("/d/remote-log", "/opt/bin/spliter")
            .with_window(begin, end);

        let op = spliter_op(Path::new("/d/i"), &opts).unwrap();
        assert_eq!(op.label(), "exec /opt/bin/spliter -> discard");
    }
}
