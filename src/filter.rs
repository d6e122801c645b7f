//! Filtered find-and-replace over subfield data.
//!
//! A [`ReplaceFilters`] value holds four independent [`Filter`]s: tag, first
//! indicator, second indicator and subfield code. Each is unconstrained, a
//! single value or a set of values. [`ReplaceFilters::predicate`] folds the
//! active ones into a conjunctive SQL condition whose values are always bound
//! parameters; [`ReplaceFilters::matches`] evaluates the same condition in
//! memory.
//!
//! A [`Substitution`] rewrites one subfield value. Case-sensitive search
//! replaces every occurrence of the exact text. Case-insensitive search
//! replaces only the first match.
//!
//! # Examples
//!
//! ```
//! use marc_catalog::filter::{ReplaceFilters, Substitution};
//!
//! let filters = ReplaceFilters::new().tag("245").codes(['a', 'b']);
//! let predicate = filters.predicate();
//! assert_eq!(predicate.sql, "f.tag = ? AND s.code IN (?, ?)");
//! assert_eq!(predicate.params, vec!["245", "a", "b"]);
//!
//! let sub = Substitution::new("abc", "X", false).unwrap();
//! assert_eq!(sub.apply("ABCabc").as_deref(), Some("Xabc"));
//! ```

use regex::{NoExpand, Regex, RegexBuilder};

use crate::error::{MarcError, Result};
use crate::mapper::{FieldRow, SubfieldRow};
use crate::validation::{check_reserved, ValidationError};

/// Column references used in predicates; `f` is `Fields`, `s` is `Subfields`.
const TAG_COLUMN: &str = "f.tag";
const INDICATOR1_COLUMN: &str = "f.indicator1";
const INDICATOR2_COLUMN: &str = "f.indicator2";
const CODE_COLUMN: &str = "s.code";
const DATA_COLUMN: &str = "s.data";

/// One optional, possibly multi-valued filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Filter<T> {
    /// No constraint
    #[default]
    Any,
    /// Equal to this value
    One(T),
    /// Equal to one of these values
    Many(Vec<T>),
}

impl<T: PartialEq> Filter<T> {
    /// Build a filter from a list of accepted values: none is unconstrained,
    /// one is equality, more is set membership.
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        let mut values: Vec<T> = values.into_iter().collect();
        match values.len() {
            0 => Filter::Any,
            1 => values.pop().map_or(Filter::Any, Filter::One),
            _ => Filter::Many(values),
        }
    }

    /// True when `value` passes the filter.
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Filter::Any => true,
            Filter::One(expected) => expected == value,
            Filter::Many(accepted) => accepted.contains(value),
        }
    }

    /// True when the filter constrains nothing
    pub fn is_any(&self) -> bool {
        matches!(self, Filter::Any)
    }
}

impl<T: ToString> Filter<T> {
    fn push_term(&self, column: &str, predicate: &mut Predicate) {
        match self {
            Filter::Any => {},
            Filter::One(value) => {
                predicate.terms.push(format!("{column} = ?"));
                predicate.params.push(value.to_string());
            },
            Filter::Many(values) if values.is_empty() => {
                predicate.terms.push("0".to_string());
            },
            Filter::Many(values) => {
                let marks = vec!["?"; values.len()].join(", ");
                predicate.terms.push(format!("{column} IN ({marks})"));
                predicate
                    .params
                    .extend(values.iter().map(ToString::to_string));
            },
        }
    }
}

/// A conjunctive SQL condition and its bound parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Predicate {
    /// Condition text, `1` when nothing is constrained
    pub sql: String,
    /// Parameter values in placeholder order
    pub params: Vec<String>,
    terms: Vec<String>,
}

impl Predicate {
    fn finish(mut self) -> Self {
        self.sql = if self.terms.is_empty() {
            "1".to_string()
        } else {
            self.terms.join(" AND ")
        };
        self
    }
}

/// The four filters of a find-and-replace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceFilters {
    /// Field tag
    pub tags: Filter<String>,
    /// First indicator
    pub indicator1: Filter<char>,
    /// Second indicator
    pub indicator2: Filter<char>,
    /// Subfield code
    pub codes: Filter<char>,
}

impl ReplaceFilters {
    /// Filters that match every subfield.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one tag.
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags = Filter::One(tag.into());
        self
    }

    /// Restrict to a set of tags.
    #[must_use]
    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = Filter::from_values(tags.into_iter().map(Into::into));
        self
    }

    /// Restrict the first indicator.
    #[must_use]
    pub fn indicator1(mut self, values: impl IntoIterator<Item = char>) -> Self {
        self.indicator1 = Filter::from_values(values);
        self
    }

    /// Restrict the second indicator.
    #[must_use]
    pub fn indicator2(mut self, values: impl IntoIterator<Item = char>) -> Self {
        self.indicator2 = Filter::from_values(values);
        self
    }

    /// Restrict the subfield code.
    #[must_use]
    pub fn codes(mut self, codes: impl IntoIterator<Item = char>) -> Self {
        self.codes = Filter::from_values(codes);
        self
    }

    /// The SQL condition over `Fields f` joined with `Subfields s`.
    #[must_use]
    pub fn predicate(&self) -> Predicate {
        let mut predicate = Predicate::default();
        self.tags.push_term(TAG_COLUMN, &mut predicate);
        self.indicator1.push_term(INDICATOR1_COLUMN, &mut predicate);
        self.indicator2.push_term(INDICATOR2_COLUMN, &mut predicate);
        self.codes.push_term(CODE_COLUMN, &mut predicate);
        predicate.finish()
    }

    /// Evaluate the condition against a subfield and its field in memory.
    #[must_use]
    pub fn matches(&self, field: &FieldRow, subfield: &SubfieldRow) -> bool {
        let indicator_matches = |filter: &Filter<char>, value: Option<char>| {
            filter.is_any() || value.is_some_and(|ch| filter.matches(&ch))
        };
        self.tags.matches(&field.tag)
            && indicator_matches(&self.indicator1, field.indicator1)
            && indicator_matches(&self.indicator2, field.indicator2)
            && self.codes.matches(&subfield.code)
    }
}

/// How one subfield value is rewritten.
#[derive(Debug, Clone)]
pub struct Substitution {
    find: String,
    replacement: String,
    pattern: Option<Regex>,
}

impl Substitution {
    /// Prepare a substitution.
    ///
    /// # Errors
    ///
    /// [`ValidationError::EmptySearch`] when `find` is empty,
    /// [`ValidationError::ReservedByte`] when `replacement` holds a byte the
    /// record format reserves.
    pub fn new(
        find: impl Into<String>,
        replacement: impl Into<String>,
        case_sensitive: bool,
    ) -> Result<Self> {
        let find = find.into();
        if find.is_empty() {
            return Err(ValidationError::EmptySearch.into());
        }
        let replacement = replacement.into();
        check_reserved("Replacement text", &replacement)?;
        let pattern = if case_sensitive {
            None
        } else {
            Some(
                RegexBuilder::new(&regex::escape(&find))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| MarcError::InvalidField(format!("Search text: {e}")))?,
            )
        };
        Ok(Substitution {
            find,
            replacement,
            pattern,
        })
    }

    /// True for exact-case, replace-all substitution.
    #[must_use]
    pub fn is_case_sensitive(&self) -> bool {
        self.pattern.is_none()
    }

    /// The rewritten value, or `None` when `data` would not change.
    #[must_use]
    pub fn apply(&self, data: &str) -> Option<String> {
        let rewritten = match &self.pattern {
            None if data.contains(&self.find) => data.replace(&self.find, &self.replacement),
            None => return None,
            Some(pattern) => pattern
                .replacen(data, 1, NoExpand(&self.replacement))
                .into_owned(),
        };
        (rewritten != data).then_some(rewritten)
    }
}

/// A complete find-and-replace request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaceRequest {
    /// Which subfields are candidates
    pub filters: ReplaceFilters,
    /// Text to look for
    pub find: String,
    /// Text to put in its place
    pub replacement: String,
    /// Exact-case replace-all when true, first case-insensitive match otherwise
    pub case_sensitive: bool,
}

impl ReplaceRequest {
    /// A case-sensitive request over all subfields.
    pub fn new(find: impl Into<String>, replacement: impl Into<String>) -> Self {
        ReplaceRequest {
            filters: ReplaceFilters::new(),
            find: find.into(),
            replacement: replacement.into(),
            case_sensitive: true,
        }
    }

    /// Set the filters.
    #[must_use]
    pub fn with_filters(mut self, filters: ReplaceFilters) -> Self {
        self.filters = filters;
        self
    }

    /// Set case sensitivity.
    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// The substitution this request performs.
    ///
    /// # Errors
    ///
    /// See [`Substitution::new`].
    pub fn substitution(&self) -> Result<Substitution> {
        Substitution::new(&self.find, &self.replacement, self.case_sensitive)
    }

    /// The filters' predicate, narrowed to rows containing the search text
    /// when the search is case-sensitive.
    #[must_use]
    pub fn predicate(&self) -> Predicate {
        let mut predicate = self.filters.predicate();
        if self.case_sensitive && !self.find.is_empty() {
            predicate.terms.push(format!("instr({DATA_COLUMN}, ?) > 0"));
            predicate.params.push(self.find.clone());
        }
        predicate.finish()
    }
}
