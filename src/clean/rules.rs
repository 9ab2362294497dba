use arrow::array::StringArray;
use regex::Regex;

/// One rewrite step in a field pipeline. Rules are total: they never fail,
/// they only rewrite or pass the value through.
#[derive(Debug)]
pub enum Rule {
    /// Replace every occurrence of a literal substring.
    Replace {
        from: &'static str,
        to: &'static str,
    },
    /// Remove a literal prefix when present.
    StripPrefix { prefix: &'static str },
    /// Collapse the whole value when it contains a literal substring.
    CollapseContains {
        needle: &'static str,
        to: &'static str,
    },
    /// Collapse the whole value when the pattern matches anywhere in it.
    CollapseMatching { pattern: Regex, to: &'static str },
}

impl Rule {
    fn apply(&self, value: &str) -> String {
        match self {
            Rule::Replace { from, to } => value.replace(from, to),
            Rule::StripPrefix { prefix } => {
                value.strip_prefix(prefix).unwrap_or(value).to_string()
            }
            Rule::CollapseContains { needle, to } => {
                if value.contains(needle) {
                    (*to).to_string()
                } else {
                    value.to_string()
                }
            }
            Rule::CollapseMatching { pattern, to } => {
                if pattern.is_match(value) {
                    (*to).to_string()
                } else {
                    value.to_string()
                }
            }
        }
    }
}

/// The closed set of values a normalized column may take, plus the token
/// everything unrecognized (including missing input) collapses to.
#[derive(Debug)]
pub struct Vocabulary {
    allowed: &'static [&'static str],
    fallback: &'static str,
}

impl Vocabulary {
    fn collapse(&self, value: Option<String>) -> String {
        match value {
            Some(v) if self.allowed.contains(&v.as_str()) => v,
            _ => self.fallback.to_string(),
        }
    }
}

/// An ordered rule pipeline for one categorical column. Every pipeline
/// starts by trimming and lowercasing, then applies its rules in the exact
/// order given; a closing vocabulary, where configured, collapses anything
/// left unrecognized to the fallback token.
pub struct FieldCleaner {
    column: &'static str,
    rules: Vec<Rule>,
    vocabulary: Option<Vocabulary>,
}

impl FieldCleaner {
    pub fn new(column: &'static str, rules: Vec<Rule>) -> Self {
        Self {
            column,
            rules,
            vocabulary: None,
        }
    }

    pub fn with_vocabulary(
        mut self,
        allowed: &'static [&'static str],
        fallback: &'static str,
    ) -> Self {
        self.vocabulary = Some(Vocabulary { allowed, fallback });
        self
    }

    pub fn column(&self) -> &'static str {
        self.column
    }

    /// Clean one raw value. Missing input skips the rewrite rules, is
    /// treated by every check as non-matching, and lands on the vocabulary
    /// fallback where one exists; without a vocabulary it stays missing.
    pub fn clean(&self, raw: Option<&str>) -> Option<String> {
        let rewritten = raw.map(|value| {
            let mut current = value.trim().to_lowercase();
            for rule in &self.rules {
                current = rule.apply(&current);
            }
            current
        });
        match &self.vocabulary {
            Some(vocabulary) => Some(vocabulary.collapse(rewritten)),
            None => rewritten,
        }
    }

    pub fn clean_column(&self, values: &StringArray) -> StringArray {
        values.iter().map(|value| self.clean(value)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rules_apply_in_the_order_given() {
        // swapping these two rules would collapse before the substitution ran
        let cleaner = FieldCleaner::new(
            "FIELD",
            vec![
                Rule::Replace {
                    from: "partial",
                    to: "multiple",
                },
                Rule::CollapseContains {
                    needle: "multiple",
                    to: "mixed",
                },
            ],
        );
        assert_eq!(cleaner.clean(Some("Partial thing")), Some("mixed".into()));
    }

    #[test]
    fn strip_prefix_only_removes_a_leading_match() {
        let cleaner = FieldCleaner::new(
            "FIELD",
            vec![Rule::StripPrefix {
                prefix: "label: ",
            }],
        );
        assert_eq!(cleaner.clean(Some("Label: value")), Some("value".into()));
        assert_eq!(
            cleaner.clean(Some("value label: x")),
            Some("value label: x".into())
        );
    }

    #[test]
    fn vocabulary_collapses_unrecognized_and_missing_values() {
        let cleaner =
            FieldCleaner::new("FIELD", Vec::new()).with_vocabulary(&["good"], "fallback");
        assert_eq!(cleaner.clean(Some("GOOD")), Some("good".into()));
        assert_eq!(cleaner.clean(Some("bad")), Some("fallback".into()));
        assert_eq!(cleaner.clean(Some("")), Some("fallback".into()));
        assert_eq!(cleaner.clean(None), Some("fallback".into()));
    }

    #[test]
    fn without_a_vocabulary_missing_stays_missing() {
        let cleaner = FieldCleaner::new("FIELD", Vec::new());
        assert_eq!(cleaner.clean(None), None);
        assert_eq!(cleaner.clean(Some("  X  ")), Some("x".into()));
    }
}
