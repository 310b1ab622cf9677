use crate::domain::{FIELD_ALIASES, FieldCategory, ZeusDiffError};
use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComparisonMode {
    Exact,
    Tolerant { rtol: f64, atol: f64 },
}

impl ComparisonMode {
    /// Relative tolerance reported alongside a divergence.
    pub const fn rtol(self) -> f64 {
        match self {
            Self::Exact => 0.0,
            Self::Tolerant { rtol, .. } => rtol,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no equality policy category covers field '{field}'")]
pub struct UnknownFieldError {
    pub field: String,
}

impl From<UnknownFieldError> for ZeusDiffError {
    fn from(error: UnknownFieldError) -> Self {
        ZeusDiffError::input_validation("INPUT.POLICY_UNKNOWN_FIELD", error.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("failed to read equality policy '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse equality policy '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid field pattern '{pattern}': {source}")]
    InvalidGlob {
        pattern: String,
        source: globset::Error,
    },
    #[error("category '{category}' has a negative or non-finite tolerance")]
    InvalidTolerance { category: String },
}

impl From<PolicyError> for ZeusDiffError {
    fn from(error: PolicyError) -> Self {
        let message = error.to_string();
        match error {
            PolicyError::Read { .. } => ZeusDiffError::io_system("IO.POLICY_READ", message),
            PolicyError::Parse { .. }
            | PolicyError::InvalidGlob { .. }
            | PolicyError::InvalidTolerance { .. } => {
                ZeusDiffError::input_validation("INPUT.POLICY", message)
            }
        }
    }
}

/// Decides, per field, whether values are compared exactly or within tolerance.
///
/// Categories are tried in order and the first one whose selector matches the
/// field name wins.
#[derive(Debug, Clone)]
pub struct EqualityPolicy {
    categories: Vec<PolicyCategory>,
}

#[derive(Debug, Clone)]
struct PolicyCategory {
    mode: ComparisonMode,
    selectors: Vec<FieldSelector>,
}

#[derive(Debug, Clone)]
enum FieldSelector {
    Name(&'static str),
    Glob(GlobMatcher),
}

impl FieldSelector {
    fn matches(&self, field_name: &str) -> bool {
        match self {
            Self::Name(name) => *name == field_name,
            Self::Glob(matcher) => matcher.is_match(field_name),
        }
    }
}

impl PolicyCategory {
    fn matches(&self, field_name: &str) -> bool {
        self.selectors
            .iter()
            .any(|selector| selector.matches(field_name))
    }
}

impl EqualityPolicy {
    /// Built-in table: time, coordinates and cell volumes exact; every
    /// evolved quantity within `rtol` with no absolute slack.
    pub fn with_rtol(rtol: f64) -> Self {
        let tolerant = ComparisonMode::Tolerant { rtol, atol: 0.0 };
        let categories = [
            (FieldCategory::Time, ComparisonMode::Exact),
            (FieldCategory::Coordinate, ComparisonMode::Exact),
            (FieldCategory::Geometry, ComparisonMode::Exact),
            (FieldCategory::Kinematic, tolerant),
            (FieldCategory::Magnetic, tolerant),
            (FieldCategory::PhysicalState, tolerant),
            (FieldCategory::Composition, tolerant),
        ]
        .into_iter()
        .map(|(category, mode)| PolicyCategory {
            mode,
            selectors: FIELD_ALIASES
                .iter()
                .filter(|alias| alias.category == category)
                .map(|alias| FieldSelector::Name(alias.name))
                .collect(),
        })
        .collect();

        Self { categories }
    }

    pub fn from_policy_path(
        policy_path: impl AsRef<Path>,
        default_rtol: f64,
    ) -> Result<Self, PolicyError> {
        let policy_path = policy_path.as_ref();
        let content = fs::read_to_string(policy_path).map_err(|source| PolicyError::Read {
            path: policy_path.to_path_buf(),
            source,
        })?;
        let raw: RawPolicy = serde_json::from_str(&content).map_err(|source| PolicyError::Parse {
            path: policy_path.to_path_buf(),
            source,
        })?;
        Self::from_raw_policy(raw, default_rtol)
    }

    pub fn from_policy_json(policy_json: &str, default_rtol: f64) -> Result<Self, PolicyError> {
        let raw: RawPolicy = serde_json::from_str(policy_json).map_err(|source| PolicyError::Parse {
            path: PathBuf::from("<inline-policy>"),
            source,
        })?;
        Self::from_raw_policy(raw, default_rtol)
    }

    pub fn mode_for(&self, field_name: &str) -> Result<ComparisonMode, UnknownFieldError> {
        self.category_for(field_name)
            .map(|category| category.mode)
            .ok_or_else(|| UnknownFieldError {
                field: field_name.to_string(),
            })
    }

    /// Fails on the first name that no category covers.
    pub fn ensure_covers<'a>(
        &self,
        field_names: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), UnknownFieldError> {
        field_names
            .into_iter()
            .try_for_each(|name| self.mode_for(name).map(|_| ()))
    }

    fn category_for(&self, field_name: &str) -> Option<&PolicyCategory> {
        self.categories
            .iter()
            .find(|category| category.matches(field_name))
    }

    fn from_raw_policy(raw: RawPolicy, default_rtol: f64) -> Result<Self, PolicyError> {
        let default_rtol = raw.default_rel_tol.unwrap_or(default_rtol);
        let mut categories = Vec::with_capacity(raw.categories.len());
        for category in raw.categories {
            let mut selectors = Vec::with_capacity(category.fields.len());
            for pattern in category.fields {
                let matcher = Glob::new(&pattern)
                    .map_err(|source| PolicyError::InvalidGlob {
                        pattern: pattern.clone(),
                        source,
                    })?
                    .compile_matcher();
                selectors.push(FieldSelector::Glob(matcher));
            }

            let mode = match category.mode {
                RawMode::Exact => ComparisonMode::Exact,
                RawMode::Tolerant => {
                    let tolerance = category.tolerance.unwrap_or(RawTolerance {
                        rel_tol: None,
                        abs_tol: 0.0,
                    });
                    let rtol = tolerance.rel_tol.unwrap_or(default_rtol);
                    let atol = tolerance.abs_tol;
                    if !valid_tolerance(rtol) || !valid_tolerance(atol) {
                        return Err(PolicyError::InvalidTolerance {
                            category: category.id,
                        });
                    }
                    ComparisonMode::Tolerant { rtol, atol }
                }
            };

            categories.push(PolicyCategory {
                mode,
                selectors,
            });
        }

        Ok(Self { categories })
    }
}

fn valid_tolerance(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPolicy {
    #[serde(rename = "defaultRelTol", default)]
    default_rel_tol: Option<f64>,
    #[serde(default)]
    categories: Vec<RawPolicyCategory>,
}

#[derive(Debug, Deserialize)]
struct RawPolicyCategory {
    id: String,
    mode: RawMode,
    #[serde(default)]
    fields: Vec<String>,
    tolerance: Option<RawTolerance>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawMode {
    Exact,
    Tolerant,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct RawTolerance {
    #[serde(rename = "relTol", default)]
    rel_tol: Option<f64>,
    #[serde(rename = "absTol", default)]
    abs_tol: f64,
}
