//! Reads registry YAML files from disk.

use super::models::{RegistryType, SourceRegistration};
use super::ConfigRegistry;
use crate::errors::ConfigurationError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Directory holding shared schema definitions rather than sources.
const MODEL_DIR: &str = "model";

fn is_registry_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

fn list_sorted(dir: &Path) -> Result<Vec<PathBuf>, ConfigurationError> {
    let entries = std::fs::read_dir(dir).map_err(|err| {
        ConfigurationError::new(format!("Cannot list registry directory: {err}")).in_file(dir.display().to_string())
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| {
            ConfigurationError::new(format!("Cannot list registry directory: {err}")).in_file(dir.display().to_string())
        })?;
        paths.push(entry.path());
    }
    paths.sort();
    Ok(paths)
}

fn parse_file(path: &Path) -> Result<SourceRegistration, ConfigurationError> {
    let file = path.display().to_string();
    let contents = std::fs::read_to_string(path)
        .map_err(|err| ConfigurationError::new(format!("Cannot read registry file: {err}")).in_file(&file))?;

    let value: serde_yaml::Value = serde_yaml::from_str(&contents)
        .map_err(|err| ConfigurationError::new(format!("Malformed YAML: {err}")).in_file(&file))?;

    let raw_type = value
        .get("registry_type")
        .ok_or_else(|| ConfigurationError::new("Missing `registry_type`").in_file(&file))?;
    serde_yaml::from_value::<RegistryType>(raw_type.clone()).map_err(|_| {
        ConfigurationError::new(format!(
            "Unknown registry_type `{}`; expected batch_replication",
            serde_yaml::to_string(raw_type).unwrap_or_default().trim()
        ))
        .in_file(&file)
    })?;

    serde_yaml::from_value(value)
        .map_err(|err| ConfigurationError::new(format!("Invalid registry entry: {err}")).in_file(&file))
}

/// Loads every registry file under `root`.
///
/// Each subdirectory of `root` groups the files of one module; the shared
/// `model` directory is skipped. A missing `root` yields an empty registry.
///
/// # Errors
///
/// Fails on unreadable or malformed files, on a missing or unknown
/// `registry_type`, and on duplicated source names. The error names the
/// offending file.
pub fn load_dir(root: &Path) -> Result<ConfigRegistry, ConfigurationError> {
    if !root.is_dir() {
        warn!(path = %root.display(), "Registry directory not found; using an empty registry");
        return Ok(ConfigRegistry::empty());
    }

    let mut sources = Vec::new();
    for module_dir in list_sorted(root)? {
        if !module_dir.is_dir() {
            continue;
        }
        if module_dir.file_name().and_then(|n| n.to_str()) == Some(MODEL_DIR) {
            continue;
        }
        for file in list_sorted(&module_dir)? {
            if !file.is_file() || !is_registry_file(&file) {
                continue;
            }
            debug!(file = %file.display(), "Parsing registry file");
            let source = parse_file(&file)?;
            sources.push((file, source));
        }
    }

    let mut seen: std::collections::HashMap<String, PathBuf> = std::collections::HashMap::new();
    for (file, source) in &sources {
        let name = source.source_name.trim().to_lowercase();
        if let Some(first) = seen.get(&name) {
            return Err(ConfigurationError::new(format!(
                "Duplicated source name `{}`; already registered in {}",
                source.source_name,
                first.display()
            ))
            .in_file(file.display().to_string()));
        }
        seen.insert(name, file.clone());
    }

    let count = sources.len();
    let registry = ConfigRegistry::from_sources(sources.into_iter().map(|(_, s)| s).collect())?;
    info!(
        path = %root.display(),
        files = count,
        active_sources = registry.len(),
        "Registry loaded"
    );
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{LazyRegistry, Registry};
    use pretty_assertions::assert_eq;
    use std::fs;

    const PG1: &str = r"
registry_type: batch_replication
source_name: PG1
source_type: DATABASE
databases:
  Sales:
    tables:
      Orders:
        etl_mode: FULL_RELOAD
      refunds:
        is_active: false
";

    fn write(root: &Path, module: &str, name: &str, contents: &str) {
        let dir = root.join(module);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn test_load_dir_reads_modules() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "postgres", "pg1.yaml", PG1);
        write(tmp.path(), "model", "schema.yaml", "not: a registry\n");
        write(tmp.path(), "postgres", "README.md", "ignored");

        let registry = load_dir(tmp.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(registry.has_table("pg1", "sales", "orders"));
        assert!(!registry.has_table("pg1", "sales", "refunds"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = load_dir(&tmp.path().join("absent")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_missing_registry_type_names_file() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "api", "crm.yaml", "source_name: crm\nsource_type: THIRD_PARTY\n");

        let err = load_dir(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("registry_type"));
        assert!(err.file.as_deref().unwrap_or_default().ends_with("crm.yaml"));
    }

    #[test]
    fn test_unknown_registry_type_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "api",
            "crm.yaml",
            "registry_type: streaming\nsource_name: crm\nsource_type: THIRD_PARTY\n",
        );

        let err = load_dir(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("Unknown registry_type"));
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "api", "broken.yaml", "registry_type: [unterminated\n");

        let err = load_dir(tmp.path()).unwrap_err();
        assert!(err.file.is_some());
    }

    #[test]
    fn test_inverted_tolerance_rejected_at_load() {
        let tmp = tempfile::tempdir().unwrap();
        write(
            tmp.path(),
            "postgres",
            "pg1.yaml",
            r"
registry_type: batch_replication
source_name: pg1
source_type: DATABASE
databases:
  sales:
    tables:
      orders:
        quality_tolerance: [10, -10]
",
        );

        let err = load_dir(tmp.path()).unwrap_err();
        assert!(err.file.as_deref().is_some_and(|file| file.ends_with("pg1.yaml")));
        assert!(err.message.contains("inverted"));
    }

    #[test]
    fn test_duplicate_source_across_files() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "postgres", "a.yaml", PG1);
        write(tmp.path(), "postgres_legacy", "b.yml", PG1);

        let err = load_dir(tmp.path()).unwrap_err();
        assert!(err.to_string().contains("Duplicated source name"));
        assert!(err.file.as_deref().unwrap_or_default().ends_with("b.yml"));
    }

    #[test]
    fn test_lazy_registry_loads_once() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "postgres", "pg1.yaml", PG1);
        let registry = LazyRegistry::new(Some(tmp.path().to_path_buf()));

        assert!(registry.has_source("pg1"));
        fs::remove_dir_all(tmp.path().join("postgres")).unwrap();
        // Parsed state survives the files going away.
        assert!(registry.has_source("pg1"));
        assert!(registry.get_override("pg1", "sales", "orders").is_some());
    }

    #[test]
    fn test_lazy_registry_surfaces_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "api", "crm.yaml", "source_name: crm\n");
        let registry = LazyRegistry::new(Some(tmp.path().to_path_buf()));

        assert!(registry.ensure_loaded().is_err());
        assert!(!registry.has_source("crm"));
    }
}
