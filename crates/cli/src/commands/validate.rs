//! Validate Command

use anyhow::Result;

use crate::config::Config;
use crate::output::print_success;

/// Parse and register every scenario file without launching a browser
pub fn execute(config: &Config) -> Result<()> {
    let registry = config.load_registry()?;
    let steps: usize = registry.iter().map(|s| s.steps().len()).sum();
    let assertions: usize = registry.iter().map(|s| s.assertions().len()).sum();
    print_success(&format!(
        "{} scenario(s) valid in {} ({} steps, {} assertions)",
        registry.len(),
        config.scenarios_dir.display(),
        steps,
        assertions
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &std::path::Path, file: &str, name: &str) {
        std::fs::write(
            dir.join(file),
            format!("name: {name}\nsteps:\n  - action: navigate\n    url: /login\n"),
        )
        .unwrap();
    }

    #[test]
    fn accepts_distinct_scenarios() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.yaml", "login");
        write(dir.path(), "b.yml", "logout");
        let config = Config {
            scenarios_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(execute(&config).is_ok());
    }

    #[test]
    fn bundled_scenarios_are_valid() {
        let root = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
        let mut config = Config::load(&root.join(crate::DEFAULT_CONFIG_FILE)).unwrap();
        config
            .variables
            .insert("DASHCHECK_EMAIL".into(), "ops@example.com".into());
        config
            .variables
            .insert("DASHCHECK_PASSWORD".into(), "secret".into());

        let registry = config.load_registry().unwrap();
        assert_eq!(registry.len(), 5);
        let retried = registry.get("contractors-search-by-name").unwrap();
        assert!(retried.steps().iter().any(|s| s.attempt.is_some()));
    }

    #[test]
    fn rejects_duplicate_names() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "a.yaml", "login");
        write(dir.path(), "b.yaml", "login");
        let config = Config {
            scenarios_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let err = execute(&config).unwrap_err();
        assert!(format!("{err:#}").contains("already registered"));
    }
}
