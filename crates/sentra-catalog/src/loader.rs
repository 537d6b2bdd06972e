//! Catalog file loading and validation.

use crate::{ActivityMap, ConsentTypeDefinition, RetentionSchedule, TypeCatalog};
use sentra_types::{ComplianceAction, DataCategory, RestrictionType};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Catalog loading errors.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("failed to read catalog: {source}")]
    Read {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid YAML at line {}: {message}", line.map(|l| l.to_string()).unwrap_or_else(|| "unknown".to_string()))]
    Parse { line: Option<usize>, message: String },

    #[error("validation error in {field}: {message}")]
    Validation { field: String, message: String },

    #[error("environment variable not found: {var}")]
    EnvVarNotFound { var: String },
}

/// On-disk catalog document. Every section is optional; omitted sections
/// fall back to the built-in catalog.
#[derive(Debug, Deserialize)]
struct CatalogFile {
    version: String,
    #[serde(default)]
    consent_types: Vec<ConsentTypeDefinition>,
    #[serde(default)]
    export_categories: Option<Vec<DataCategory>>,
    #[serde(default)]
    restriction_activities: HashMap<RestrictionType, Vec<String>>,
    #[serde(default)]
    retention: Option<RetentionSection>,
}

#[derive(Debug, Deserialize)]
struct RetentionSection {
    #[serde(default)]
    default_days: Option<u32>,
    #[serde(default)]
    actions: HashMap<ComplianceAction, u32>,
}

/// Loads operator-supplied catalog files over the built-in defaults.
pub struct CatalogLoader {
    path: PathBuf,
}

impl CatalogLoader {
    /// Create a loader for the given catalog file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Load and validate the catalog.
    ///
    /// A missing file yields the built-in catalog unchanged; a present but
    /// invalid file is an error, never a silent fallback.
    pub fn load(&self) -> Result<TypeCatalog, CatalogError> {
        if !self.path.exists() {
            return Ok(TypeCatalog::builtin());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let expanded = expand_env_vars(&contents)?;

        let file: CatalogFile =
            serde_yaml::from_str(&expanded).map_err(|e| CatalogError::Parse {
                line: e.location().map(|l| l.line()),
                message: e.to_string(),
            })?;

        validate(&file)?;
        Ok(merge(file))
    }
}

/// Expand environment variables in the form `${VAR}` or `${VAR:-default}`.
fn expand_env_vars(content: &str) -> Result<String, CatalogError> {
    let mut result = content.to_string();
    let re = regex::Regex::new(r"\$\{([^}:]+)(?::-([^}]*))?\}").expect("static pattern");

    for cap in re.captures_iter(content) {
        let full_match = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
        let var_name = &cap[1];
        let default = cap.get(2).map(|m| m.as_str());

        let value = match std::env::var(var_name) {
            Ok(v) => v,
            Err(_) => match default {
                Some(d) => d.to_string(),
                None => {
                    return Err(CatalogError::EnvVarNotFound {
                        var: var_name.to_string(),
                    })
                }
            },
        };

        result = result.replace(full_match, &value);
    }

    Ok(result)
}

fn validate(file: &CatalogFile) -> Result<(), CatalogError> {
    if file.version.trim().is_empty() {
        return Err(CatalogError::Validation {
            field: "version".to_string(),
            message: "version must not be empty".to_string(),
        });
    }

    let mut seen = std::collections::HashSet::new();
    for def in &file.consent_types {
        if def.key.trim().is_empty() {
            return Err(CatalogError::Validation {
                field: "consent_types".to_string(),
                message: "consent type key must not be empty".to_string(),
            });
        }
        if !seen.insert(def.key.as_str()) {
            return Err(CatalogError::Validation {
                field: format!("consent_types.{}", def.key),
                message: "duplicate consent type key".to_string(),
            });
        }
        if def.purposes.is_empty() {
            return Err(CatalogError::Validation {
                field: format!("consent_types.{}", def.key),
                message: "purposes must not be empty".to_string(),
            });
        }
        if def.required && def.can_withdraw {
            return Err(CatalogError::Validation {
                field: format!("consent_types.{}", def.key),
                message: "a required consent type cannot be withdrawable".to_string(),
            });
        }
    }

    if file.restriction_activities.contains_key(&RestrictionType::All) {
        return Err(CatalogError::Validation {
            field: "restriction_activities.all".to_string(),
            message: "the wildcard type cannot be remapped".to_string(),
        });
    }
    for (kind, activities) in &file.restriction_activities {
        if activities.is_empty() {
            return Err(CatalogError::Validation {
                field: format!("restriction_activities.{}", kind),
                message: "activity list must not be empty".to_string(),
            });
        }
    }

    if let Some(categories) = &file.export_categories {
        if categories.is_empty() {
            return Err(CatalogError::Validation {
                field: "export_categories".to_string(),
                message: "export category list must not be empty".to_string(),
            });
        }
    }

    Ok(())
}

fn merge(file: CatalogFile) -> TypeCatalog {
    let builtin = TypeCatalog::builtin();

    // Operator definitions override by key; new keys append after the
    // built-in ordering.
    let mut consent_types: Vec<ConsentTypeDefinition> = builtin.consent_types().to_vec();
    for def in file.consent_types {
        match consent_types.iter_mut().find(|t| t.key == def.key) {
            Some(existing) => *existing = def,
            None => consent_types.push(def),
        }
    }

    let export_categories = file
        .export_categories
        .unwrap_or_else(|| builtin.export_categories().to_vec());

    let mut activity_map = ActivityMap::builtin();
    activity_map.merge(file.restriction_activities);

    let mut retention = RetentionSchedule::builtin();
    if let Some(section) = file.retention {
        retention.merge(section.actions, section.default_days);
    }

    TypeCatalog::assemble(
        file.version,
        consent_types,
        export_categories,
        activity_map,
        retention,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_catalog(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().expect("tempfile");
        f.write_all(content.as_bytes()).expect("write");
        f
    }

    #[test]
    fn test_missing_file_is_builtin() {
        let catalog = CatalogLoader::new("/nonexistent/catalog.yaml")
            .load()
            .unwrap();
        assert_eq!(catalog.version(), "builtin-1");
    }

    #[test]
    fn test_load_overrides_by_key() {
        let file = write_catalog(
            r#"
version: "2024-06-01"
consent_types:
  - key: analytics
    name: Analytics
    description: Narrowed analytics consent.
    category: functional
    legal_basis: consent
    required: false
    default_granted: false
    can_withdraw: true
    purposes: [usage_analytics]
  - key: beta-features
    name: Beta Features
    description: Early access experiments.
    category: functional
    legal_basis: consent
    required: false
    default_granted: false
    can_withdraw: true
    purposes: [product_experiments]
"#,
        );
        let catalog = CatalogLoader::new(file.path()).load().unwrap();
        assert_eq!(catalog.version(), "2024-06-01");
        assert_eq!(
            catalog.consent_type("analytics").unwrap().description,
            "Narrowed analytics consent."
        );
        assert!(catalog.has_consent_type("beta-features"));
        // Built-ins not mentioned survive.
        assert!(catalog.has_consent_type("terms-of-service"));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let file = write_catalog(
            r#"
version: "v2"
consent_types:
  - key: dup
    name: A
    description: first
    category: functional
    legal_basis: consent
    required: false
    default_granted: false
    can_withdraw: true
    purposes: [x]
  - key: dup
    name: B
    description: second
    category: functional
    legal_basis: consent
    required: false
    default_granted: false
    can_withdraw: true
    purposes: [y]
"#,
        );
        let err = CatalogLoader::new(file.path()).load().unwrap_err();
        assert!(matches!(err, CatalogError::Validation { .. }));
    }

    #[test]
    fn test_required_withdrawable_rejected() {
        let file = write_catalog(
            r#"
version: "v2"
consent_types:
  - key: broken
    name: Broken
    description: contradictory flags
    category: essential
    legal_basis: contract
    required: true
    default_granted: true
    can_withdraw: true
    purposes: [service_provision]
"#,
        );
        assert!(CatalogLoader::new(file.path()).load().is_err());
    }

    #[test]
    fn test_wildcard_remap_rejected() {
        let file = write_catalog(
            r#"
version: "v2"
restriction_activities:
  all: [everything]
"#,
        );
        assert!(CatalogLoader::new(file.path()).load().is_err());
    }

    #[test]
    fn test_env_expansion_with_default() {
        let file = write_catalog(
            r#"
version: "${SENTRA_CATALOG_VERSION:-fallback-7}"
"#,
        );
        let catalog = CatalogLoader::new(file.path()).load().unwrap();
        assert_eq!(catalog.version(), "fallback-7");
    }

    #[test]
    fn test_retention_section_merges() {
        let file = write_catalog(
            r#"
version: "v3"
retention:
  default_days: 365
  actions:
    export_completed: 30
"#,
        );
        let catalog = CatalogLoader::new(file.path()).load().unwrap();
        assert_eq!(
            catalog.retention().days_for(ComplianceAction::ExportCompleted),
            30
        );
        assert_eq!(catalog.retention().default_days(), 365);
    }
}
