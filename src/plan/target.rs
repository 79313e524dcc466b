use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::debug;

use super::options::InspectOptions;
use super::Category;

/// Errors in the requested target set, all fatal before any collection starts
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("unsupported target: {0}")]
    Unsupported(String),

    #[error("target '{category}' requires argument --{argument}")]
    MissingArgument {
        category: Category,
        argument: &'static str,
    },

    #[error("invalid option '{value}' for target '{category}': {reason}")]
    InvalidOption {
        category: Category,
        value: String,
        reason: String,
    },
}

/// Value attached to one `category[:opt...]` token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOption {
    /// `basic`
    Flag,
    /// `metric:1h`
    Value(String),
    /// `profile:tidb:10.0.0.1:10080`
    Parts(Vec<String>),
}

impl TargetOption {
    pub fn is_flag(&self) -> bool {
        matches!(self, TargetOption::Flag)
    }
}

/// Requested categories and their options, parsed from `basic,metric:1h,...`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSpec {
    entries: BTreeMap<Category, Vec<TargetOption>>,
}

impl TargetSpec {
    pub fn parse(spec: &str) -> Result<Self, TargetError> {
        let mut entries: BTreeMap<Category, Vec<TargetOption>> = BTreeMap::new();

        for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            let mut segments = token.split(':');
            let name = segments.next().unwrap_or_default();
            let category = Category::from_name(name)
                .ok_or_else(|| TargetError::Unsupported(name.to_string()))?;

            let mut rest: Vec<String> = segments.map(str::to_string).collect();
            let option = match rest.len() {
                0 => TargetOption::Flag,
                1 => TargetOption::Value(rest.remove(0)),
                _ => TargetOption::Parts(rest),
            };
            debug!("Target {} with option {:?}", category, option);
            entries.entry(category).or_default().push(option);
        }

        Ok(Self { entries })
    }

    pub fn contains(&self, category: Category) -> bool {
        self.entries.contains_key(&category)
    }

    /// Requested categories in canonical order
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.entries.keys().copied()
    }

    /// The first non-flag option given for a category
    pub fn option(&self, category: Category) -> Option<&TargetOption> {
        self.options(category).iter().find(|o| !o.is_flag())
    }

    /// Every option given for a category, in the order they appeared
    pub fn options(&self, category: Category) -> &[TargetOption] {
        self.entries.get(&category).map(Vec::as_slice).unwrap_or_default()
    }

    /// Check that the arguments each requested category depends on were supplied
    pub fn validate(&self, options: &InspectOptions) -> Result<(), TargetError> {
        if self.contains(Category::Metric) {
            if let Some(TargetOption::Parts(parts)) = self
                .options(Category::Metric)
                .iter()
                .find(|o| matches!(o, TargetOption::Parts(_)))
            {
                return Err(TargetError::InvalidOption {
                    category: Category::Metric,
                    value: parts.join(":"),
                    reason: "expected a single duration such as 1h".to_string(),
                });
            }

            // without a duration, a lone begin or end cannot be turned into a window
            let has_duration = matches!(self.option(Category::Metric), Some(TargetOption::Value(_)));
            if !has_duration {
                match (options.begin, options.end) {
                    (Some(_), None) => return Err(missing(Category::Metric, "end")),
                    (None, Some(_)) => return Err(missing(Category::Metric, "begin")),
                    _ => {}
                }
            }
        }

        if self.contains(Category::Log) {
            if options.log_dir.is_none() {
                return Err(missing(Category::Log, "log-dir"));
            }
            if options.log_spliter.is_none() {
                return Err(missing(Category::Log, "log-spliter"));
            }
            if options.begin.is_none() {
                return Err(missing(Category::Log, "begin"));
            }
            if options.end.is_none() {
                return Err(missing(Category::Log, "end"));
            }
        }

        Ok(())
    }
}

fn missing(category: Category, argument: &'static str) -> TargetError {
    TargetError::MissingArgument { category, argument }
}

impl FromStr for TargetSpec {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_parse_flags_values_and_parts() {
        let spec = TargetSpec::parse("basic,profile:tidb:10.0.0.1:10080,metric:1h").unwrap();

        assert!(spec.contains(Category::Basic));
        assert_eq!(spec.options(Category::Basic), &[TargetOption::Flag]);
        assert_eq!(spec.option(Category::Basic), None);
        assert_eq!(
            spec.option(Category::Profile),
            Some(&TargetOption::Parts(vec![
                "tidb".to_string(),
                "10.0.0.1".to_string(),
                "10080".to_string()
            ]))
        );
        assert_eq!(
            spec.option(Category::Metric),
            Some(&TargetOption::Value("1h".to_string()))
        );
        assert!(!spec.contains(Category::Log));
    }

    #[test]
    fn test_unsupported_target() {
        assert_eq!(
            TargetSpec::parse("bogus"),
            Err(TargetError::Unsupported("bogus".to_string()))
        );
        assert_eq!(
            "basic,hardware:x".parse::<TargetSpec>(),
            Err(TargetError::Unsupported("hardware".to_string()))
        );
    }

    #[test]
    fn test_first_option_wins() {
        let spec = TargetSpec::parse("profile,profile:pd:10.0.0.2:2379,profile:tidb:10.0.0.1:10080").unwrap();
        assert_eq!(spec.options(Category::Profile).len(), 3);
        match spec.option(Category::Profile) {
            Some(TargetOption::Parts(parts)) => assert_eq!(parts[0], "pd"),
            other => panic!("unexpected option: {:?}", other),
        }
    }

    #[test]
    fn test_categories_are_canonical_and_blank_tokens_ignored() {
        let spec = TargetSpec::parse("log, dbinfo,,basic,").unwrap();
        let categories: Vec<Category> = spec.categories().collect();
        assert_eq!(categories, vec![Category::Basic, Category::DbInfo, Category::Log]);

        assert_eq!(TargetSpec::parse("").unwrap().categories().count(), 0);
        assert!(TargetSpec::parse("_setup,_teardown").unwrap().contains(Category::Setup));
    }

    #[test]
    fn test_validate_metric_arguments() {
        let begin = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let spec = TargetSpec::parse("metric").unwrap();

        let opts = InspectOptions::new("i", "/tmp", "metric");
        assert!(spec.validate(&opts).is_ok());

        let mut half = opts.clone();
        half.begin = Some(begin);
        assert_eq!(
            spec.validate(&half),
            Err(TargetError::MissingArgument { category: Category::Metric, argument: "end" })
        );

        assert!(spec.validate(&opts.clone().with_window(begin, end)).is_ok());

        // a duration anchors the window, so the lone bound is not needed
        let relative = TargetSpec::parse("metric:2h").unwrap();
        assert!(relative.validate(&half).is_ok());
        let mut only_end = opts.clone();
        only_end.end = Some(end);
        assert!(relative.validate(&only_end).is_ok());
        assert_eq!(
            spec.validate(&only_end),
            Err(TargetError::MissingArgument { category: Category::Metric, argument: "begin" })
        );
    }

    #[test]
    fn test_validate_rejects_multipart_metric_option() {
        let opts = InspectOptions::new("i", "/tmp", "metric:1h:2h");
        let spec = TargetSpec::parse("metric:1h:2h").unwrap();
        assert_eq!(
            spec.validate(&opts),
            Err(TargetError::InvalidOption {
                category: Category::Metric,
                value: "1h:2h".to_string(),
                reason: "expected a single duration such as 1h".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_log_arguments() {
        let begin = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let spec = TargetSpec::parse("basic,log").unwrap();

        let opts = InspectOptions::new("i", "/tmp", "basic,log");
        assert_eq!(
            spec.validate(&opts),
            Err(TargetError::MissingArgument { category: Category::Log, argument: "log-dir" })
        );

        let with_source = opts.with_log_source("/data/logs", "/usr/local/bin/spliter");
        assert_eq!(
            spec.validate(&with_source),
            Err(TargetError::MissingArgument { category: Category::Log, argument: "begin" })
        );

        assert!(spec.validate(&with_source.with_window(begin, end)).is_ok());
    }
}
