//! Reserved keys - Tag keys owned by the provider
//!
//! Keys such as `aws:cloudformation:stack-name` are managed by AWS itself and
//! must never be created, changed or removed by user-level tooling.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::ConfigError;
use crate::tags::LabelSet;

/// Prefix AWS reserves for its own tags
pub const AWS_RESERVED_PREFIX: &str = "aws:";

/// Pattern form of [`AWS_RESERVED_PREFIX`], used as the configuration default
pub const AWS_RESERVED_PATTERN: &str = "^aws:";

static AWS_DEFAULT: LazyLock<ReservedKeys> = LazyLock::new(ReservedKeys::aws);

/// A single rule identifying reserved keys
#[derive(Debug, Clone)]
enum KeyMatcher {
    Prefix(&'static str),
    Exact(&'static str),
    Pattern(Regex),
}

impl KeyMatcher {
    fn matches(&self, key: &str) -> bool {
        match self {
            KeyMatcher::Prefix(prefix) => key.starts_with(*prefix),
            KeyMatcher::Exact(exact) => key == *exact,
            KeyMatcher::Pattern(re) => re.is_match(key),
        }
    }
}

impl fmt::Display for KeyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMatcher::Prefix(prefix) => write!(f, "^{}", regex::escape(prefix)),
            KeyMatcher::Exact(exact) => write!(f, "^{}$", regex::escape(exact)),
            KeyMatcher::Pattern(re) => write!(f, "{}", re.as_str()),
        }
    }
}

/// Immutable set of rules for provider-reserved tag keys
#[derive(Debug, Clone)]
pub struct ReservedKeys {
    matchers: Vec<KeyMatcher>,
}

impl ReservedKeys {
    /// Compile user-supplied regular expressions
    pub fn new<I, S>(patterns: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matchers = patterns
            .into_iter()
            .map(|pattern| {
                let pattern = pattern.as_ref();
                Regex::new(pattern)
                    .map(KeyMatcher::Pattern)
                    .map_err(|source| ConfigError::InvalidPattern {
                        pattern: pattern.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { matchers })
    }

    /// Reserve nothing
    pub fn none() -> Self {
        Self {
            matchers: Vec::new(),
        }
    }

    /// Keys starting with `aws:`
    pub fn aws() -> Self {
        Self {
            matchers: vec![KeyMatcher::Prefix(AWS_RESERVED_PREFIX)],
        }
    }

    /// Elastic Beanstalk also manages `elasticbeanstalk:*` and `Name`
    pub fn elasticbeanstalk() -> Self {
        Self {
            matchers: vec![
                KeyMatcher::Prefix(AWS_RESERVED_PREFIX),
                KeyMatcher::Prefix("elasticbeanstalk:"),
                KeyMatcher::Exact("Name"),
            ],
        }
    }

    /// RDS also manages `rds:*`
    pub fn rds() -> Self {
        Self {
            matchers: vec![
                KeyMatcher::Prefix(AWS_RESERVED_PREFIX),
                KeyMatcher::Prefix("rds:"),
            ],
        }
    }

    /// Shared read-only `aws:` rule set
    pub fn aws_default() -> &'static ReservedKeys {
        &AWS_DEFAULT
    }

    pub fn is_reserved(&self, key: &str) -> bool {
        self.matchers.iter().any(|m| m.matches(key))
    }

    /// Copy of `tags` without reserved keys
    pub fn filter(&self, tags: &LabelSet) -> LabelSet {
        tags.retain_keys(|k| !self.is_reserved(k))
    }

    /// Regular-expression form of every rule
    pub fn patterns(&self) -> Vec<String> {
        self.matchers.iter().map(ToString::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.matchers.is_empty()
    }
}

impl Default for ReservedKeys {
    fn default() -> Self {
        Self::aws()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aws_prefix_is_reserved() {
        let reserved = ReservedKeys::aws();

        assert!(reserved.is_reserved("aws:cloudformation:logical-id"));
        assert!(reserved.is_reserved("aws:"));
        assert!(!reserved.is_reserved("Name"));
        assert!(!reserved.is_reserved("xaws:foo"));
        assert!(!reserved.is_reserved("AWS:upper"));
    }

    #[test]
    fn filter_drops_reserved_entries() {
        let tags: LabelSet = [
            ("aws:cloudformation:key1", "value1"),
            ("key2", "value2"),
            ("key3", "value3"),
        ]
        .into_iter()
        .collect();

        let filtered = ReservedKeys::aws().filter(&tags);
        assert_eq!(filtered.keys(), vec!["key2".to_string(), "key3".to_string()]);
    }

    #[test]
    fn elasticbeanstalk_preset() {
        let reserved = ReservedKeys::elasticbeanstalk();

        assert!(reserved.is_reserved("aws:cloudformation:key1"));
        assert!(reserved.is_reserved("elasticbeanstalk:environment-name"));
        assert!(reserved.is_reserved("Name"));
        assert!(!reserved.is_reserved("Names"));
        assert!(!reserved.is_reserved("key2"));
    }

    #[test]
    fn rds_preset() {
        let reserved = ReservedKeys::rds();

        assert!(reserved.is_reserved("aws:cloudformation:key1"));
        assert!(reserved.is_reserved("rds:key2"));
        assert!(!reserved.is_reserved("key4"));
    }

    #[test]
    fn custom_patterns_compile() {
        let reserved = ReservedKeys::new(["^aws:", "^kubernetes\\.io/"]).unwrap();

        assert!(reserved.is_reserved("kubernetes.io/cluster/main"));
        assert!(reserved.is_reserved("aws:autoscaling:groupName"));
        assert!(!reserved.is_reserved("team"));
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = ReservedKeys::new(["(unclosed"]).unwrap_err();
        match err {
            ConfigError::InvalidPattern { pattern, .. } => assert_eq!(pattern, "(unclosed"),
            other => panic!("Expected InvalidPattern, got {:?}", other),
        }
    }

    #[test]
    fn none_reserves_nothing() {
        let reserved = ReservedKeys::none();
        assert!(reserved.is_empty());
        assert!(!reserved.is_reserved("aws:anything"));
    }

    #[test]
    fn patterns_render_as_regex() {
        assert_eq!(ReservedKeys::aws().patterns(), vec!["^aws:".to_string()]);
        assert_eq!(
            ReservedKeys::elasticbeanstalk().patterns(),
            vec![
                "^aws:".to_string(),
                "^elasticbeanstalk:".to_string(),
                "^Name$".to_string()
            ]
        );
    }

    #[test]
    fn shared_default_is_aws() {
        assert!(ReservedKeys::aws_default().is_reserved("aws:foo"));
    }
}
