use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use camino::Utf8Path;
use camino::Utf8PathBuf;
use config::Config;
use config::ConfigError as ExternalConfigError;
use config::File;
use config::FileFormat;
use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration build/deserialize error")]
    Config(#[from] ExternalConfigError),
    #[error("Failed to read pyproject.toml")]
    PyprojectIo(#[from] std::io::Error),
    #[error("Failed to parse pyproject.toml TOML")]
    PyprojectParse(#[from] toml::de::Error),
    #[error("Failed to serialize extracted pyproject data")]
    PyprojectSerialize(#[from] toml::ser::Error),
}

/// A user-declared container tag.
///
/// ```toml
/// [tagspecs.placeholder]
/// end = { tag = "endplaceholder" }
/// intermediates = ["or"]
/// ```
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct TagSpecDef {
    pub end: Option<EndTagDef>,
    pub intermediates: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EndTagDef {
    pub tag: String,
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub debug: bool,
    pub template_dirs: Vec<Utf8PathBuf>,
    pub extensions: Vec<String>,
    pub tagspecs: BTreeMap<String, TagSpecDef>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debug: false,
            template_dirs: vec![Utf8PathBuf::from("templates")],
            extensions: ["html", "txt", "xml"].map(String::from).to_vec(),
            tagspecs: BTreeMap::new(),
        }
    }
}

impl Settings {
    pub fn new(project_root: &Path) -> Result<Self, ConfigError> {
        let user_config_file = ProjectDirs::from("com.github", "cms-templates", "cmst")
            .map(|proj_dirs| proj_dirs.config_dir().join("cmst.toml"));

        Self::load_from_paths(project_root, user_config_file.as_deref())
    }

    fn load_from_paths(
        project_root: &Path,
        user_config_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = user_config_path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
        }

        let pyproject_path = project_root.join("pyproject.toml");
        if pyproject_path.exists() {
            let content = fs::read_to_string(&pyproject_path)?;
            let full_toml_value: toml::Value = toml::from_str(&content)?;

            let cmst_table = ["tool", "cmst"]
                .iter()
                .try_fold(&full_toml_value, |current_val, &key| current_val.get(key))
                .and_then(toml::Value::as_table);

            if let Some(table) = cmst_table {
                let cmst_toml_string = toml::to_string(table)?;
                builder = builder.add_source(File::from_str(&cmst_toml_string, FileFormat::Toml));
            }
        }

        builder = builder.add_source(
            File::from(project_root.join(".cmst.toml"))
                .format(FileFormat::Toml)
                .required(false),
        );

        builder = builder.add_source(
            File::from(project_root.join("cmst.toml"))
                .format(FileFormat::Toml)
                .required(false),
        );

        let config = builder.build()?;
        let settings = config.try_deserialize()?;
        Ok(settings)
    }

    /// Template directories resolved against the project root.
    #[must_use]
    pub fn resolved_template_dirs(&self, project_root: &Utf8Path) -> Vec<Utf8PathBuf> {
        self.template_dirs
            .iter()
            .map(|dir| {
                if dir.is_absolute() {
                    dir.clone()
                } else {
                    project_root.join(dir)
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn debug_settings(debug: bool) -> Settings {
        Settings {
            debug,
            ..Settings::default()
        }
    }

    mod defaults {
        use super::*;

        #[test]
        fn test_load_no_files() {
            let dir = tempdir().unwrap();
            let settings = Settings::new(dir.path()).unwrap();
            assert_eq!(settings, Settings::default());
            assert_eq!(settings.template_dirs, vec![Utf8PathBuf::from("templates")]);
            assert_eq!(settings.extensions, vec!["html", "txt", "xml"]);
            assert!(settings.tagspecs.is_empty());
        }

        #[test]
        fn test_resolved_template_dirs() {
            let settings = Settings {
                template_dirs: vec![Utf8PathBuf::from("templates"), Utf8PathBuf::from("/abs")],
                ..Settings::default()
            };
            assert_eq!(
                settings.resolved_template_dirs(Utf8Path::new("/project")),
                vec![
                    Utf8PathBuf::from("/project/templates"),
                    Utf8PathBuf::from("/abs")
                ]
            );
        }
    }

    mod project_files {
        use super::*;

        #[test]
        fn test_load_cmst_toml_only() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("cmst.toml"), "debug = true").unwrap();
            let settings = Settings::new(dir.path()).unwrap();
            assert_eq!(settings, debug_settings(true));
        }

        #[test]
        fn test_load_dot_cmst_toml_only() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join(".cmst.toml"), "debug = true").unwrap();
            let settings = Settings::new(dir.path()).unwrap();
            assert_eq!(settings, debug_settings(true));
        }

        #[test]
        fn test_load_pyproject_toml_only() {
            let dir = tempdir().unwrap();
            let content = "[tool.cmst]\ndebug = true\n";
            fs::write(dir.path().join("pyproject.toml"), content).unwrap();
            let settings = Settings::new(dir.path()).unwrap();
            assert_eq!(settings, debug_settings(true));
        }

        #[test]
        fn test_pyproject_without_cmst_table() {
            let dir = tempdir().unwrap();
            let content = "[tool.ruff]\nline-length = 100\n";
            fs::write(dir.path().join("pyproject.toml"), content).unwrap();
            let settings = Settings::new(dir.path()).unwrap();
            assert_eq!(settings, Settings::default());
        }

        #[test]
        fn test_template_dirs_and_extensions() {
            let dir = tempdir().unwrap();
            let content = "template_dirs = [\"site/templates\", \"shared\"]\nextensions = [\"html\"]\n";
            fs::write(dir.path().join("cmst.toml"), content).unwrap();
            let settings = Settings::new(dir.path()).unwrap();
            assert_eq!(
                settings.template_dirs,
                vec![
                    Utf8PathBuf::from("site/templates"),
                    Utf8PathBuf::from("shared")
                ]
            );
            assert_eq!(settings.extensions, vec!["html"]);
        }

        #[test]
        fn test_tagspecs_table() {
            let dir = tempdir().unwrap();
            let content = r#"
[tool.cmst.tagspecs.placeholder]
end = { tag = "endplaceholder" }
intermediates = ["or"]

[tool.cmst.tagspecs.mytag]
end = { tag = "endmytag" }
"#;
            fs::write(dir.path().join("pyproject.toml"), content).unwrap();
            let settings = Settings::new(dir.path()).unwrap();

            let placeholder = &settings.tagspecs["placeholder"];
            assert_eq!(
                placeholder.end,
                Some(EndTagDef {
                    tag: "endplaceholder".to_string()
                })
            );
            assert_eq!(placeholder.intermediates, vec!["or"]);
            assert!(settings.tagspecs["mytag"].intermediates.is_empty());
        }
    }

    mod priority {
        use super::*;

        #[test]
        fn test_project_priority_cmst_overrides_dot_cmst() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join(".cmst.toml"), "debug = false").unwrap();
            fs::write(dir.path().join("cmst.toml"), "debug = true").unwrap();
            let settings = Settings::new(dir.path()).unwrap();
            assert_eq!(settings, debug_settings(true));
        }

        #[test]
        fn test_project_priority_dot_cmst_overrides_pyproject() {
            let dir = tempdir().unwrap();
            let pyproject_content = "[tool.cmst]\ndebug = false\n";
            fs::write(dir.path().join("pyproject.toml"), pyproject_content).unwrap();
            fs::write(dir.path().join(".cmst.toml"), "debug = true").unwrap();
            let settings = Settings::new(dir.path()).unwrap();
            assert_eq!(settings, debug_settings(true));
        }

        #[test]
        fn test_project_priority_all_files_cmst_wins() {
            let dir = tempdir().unwrap();
            let pyproject_content = "[tool.cmst]\ndebug = false\n";
            fs::write(dir.path().join("pyproject.toml"), pyproject_content).unwrap();
            fs::write(dir.path().join(".cmst.toml"), "debug = false").unwrap();
            fs::write(dir.path().join("cmst.toml"), "debug = true").unwrap();
            let settings = Settings::new(dir.path()).unwrap();
            assert_eq!(settings, debug_settings(true));
        }

        #[test]
        fn test_user_priority_project_overrides_user() {
            let user_dir = tempdir().unwrap();
            let project_dir = tempdir().unwrap();
            let user_conf_path = user_dir.path().join("config.toml");
            fs::write(&user_conf_path, "debug = true").unwrap();
            let pyproject_content = "[tool.cmst]\ndebug = false\n";
            fs::write(project_dir.path().join("pyproject.toml"), pyproject_content).unwrap();

            let settings =
                Settings::load_from_paths(project_dir.path(), Some(&user_conf_path)).unwrap();
            assert_eq!(settings, debug_settings(false));
        }

        #[test]
        fn test_user_priority_cmst_overrides_user() {
            let user_dir = tempdir().unwrap();
            let project_dir = tempdir().unwrap();
            let user_conf_path = user_dir.path().join("config.toml");
            fs::write(&user_conf_path, "debug = true").unwrap();
            fs::write(project_dir.path().join("cmst.toml"), "debug = false").unwrap();

            let settings =
                Settings::load_from_paths(project_dir.path(), Some(&user_conf_path)).unwrap();
            assert_eq!(settings, debug_settings(false));
        }
    }

    mod user_config {
        use super::*;

        #[test]
        fn test_load_user_config_only() {
            let user_dir = tempdir().unwrap();
            let project_dir = tempdir().unwrap();
            let user_conf_path = user_dir.path().join("config.toml");
            fs::write(&user_conf_path, "debug = true").unwrap();

            let settings =
                Settings::load_from_paths(project_dir.path(), Some(&user_conf_path)).unwrap();
            assert_eq!(settings, debug_settings(true));
        }

        #[test]
        fn test_no_user_config_file_present() {
            let user_dir = tempdir().unwrap();
            let project_dir = tempdir().unwrap();
            let user_conf_path = user_dir.path().join("config.toml");
            let pyproject_content = "[tool.cmst]\ndebug = true\n";
            fs::write(project_dir.path().join("pyproject.toml"), pyproject_content).unwrap();

            let settings =
                Settings::load_from_paths(project_dir.path(), Some(&user_conf_path)).unwrap();
            assert_eq!(settings, debug_settings(true));
        }

        #[test]
        fn test_user_config_path_not_provided() {
            let project_dir = tempdir().unwrap();
            fs::write(project_dir.path().join("cmst.toml"), "debug = true").unwrap();

            let settings = Settings::load_from_paths(project_dir.path(), None).unwrap();
            assert_eq!(settings, debug_settings(true));
        }
    }

    mod errors {
        use super::*;

        #[test]
        fn test_invalid_toml_content() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("cmst.toml"), "debug = not_a_boolean").unwrap();
            let result = Settings::new(dir.path());
            assert!(matches!(result.unwrap_err(), ConfigError::Config(_)));
        }

        #[test]
        fn test_invalid_pyproject() {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("pyproject.toml"), "[tool.cmst\n").unwrap();
            let result = Settings::new(dir.path());
            assert!(matches!(result.unwrap_err(), ConfigError::PyprojectParse(_)));
        }
    }
}
