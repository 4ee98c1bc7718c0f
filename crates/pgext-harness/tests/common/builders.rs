//! Test data builders for creating registry records

use pgext_core::types::{CustomScriptFile, ExtensionRecord, ExtensionRecordFile, RegressFile};
use pgext_harness::ExtensionRegistry;

/// Builder for registry records
pub struct RecordBuilder {
    id: String,
    file: ExtensionRecordFile,
}

impl RecordBuilder {
    /// A record with no methods at all
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            file: ExtensionRecordFile::default(),
        }
    }

    /// contrib module that ships with the engine build
    pub fn contrib(id: &str) -> Self {
        Self::new(id)
            .download("contrib", None)
            .install("installed")
            .folder(id)
    }

    /// Git-hosted extension built with PGXS
    pub fn git(id: &str, url: &str) -> Self {
        Self::new(id)
            .download("git", Some(url))
            .install("pgxs")
            .folder(id)
    }

    /// Sources already staged in the working directory
    pub fn staged(id: &str) -> Self {
        Self::new(id)
            .download("downloaded", None)
            .install("installed")
            .folder(id)
    }

    pub fn download(mut self, method: &str, url: Option<&str>) -> Self {
        self.file.download_method = Some(method.to_string());
        self.file.download_url = url.map(str::to_string);
        self
    }

    pub fn install(mut self, method: &str) -> Self {
        self.file.install_method = Some(method.to_string());
        self
    }

    pub fn install_script(mut self, script: &str) -> Self {
        self.file.install_method = Some("shell_script".to_string());
        self.file.shell_script = Some(script.to_string());
        self
    }

    pub fn folder(mut self, folder: &str) -> Self {
        self.file.folder_name = Some(folder.to_string());
        self
    }

    pub fn deps(mut self, deps: &[&str]) -> Self {
        self.file.dependencies = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn configure(mut self, options: &[&str]) -> Self {
        self.file.configure_options = options.iter().map(|o| o.to_string()).collect();
        self
    }

    /// Declare a pg_regress test over `tests` in `input_dir`
    pub fn regress(mut self, input_dir: &str, tests: &[&str]) -> Self {
        self.file.test_method = Some("pg_regress".to_string());
        self.file.pg_regress = Some(RegressFile {
            input_dir: Some(input_dir.to_string()),
            test_list: tests.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        });
        self
    }

    /// Extra runner options for an already declared pg_regress test
    pub fn regress_options(mut self, options: &[&str]) -> Self {
        if let Some(regress) = self.file.pg_regress.as_mut() {
            regress.options = options.iter().map(|o| o.to_string()).collect();
        }
        self
    }

    pub fn regress_expected_dir(mut self, dir: &str) -> Self {
        if let Some(regress) = self.file.pg_regress.as_mut() {
            regress.expected_dir = Some(dir.to_string());
        }
        self
    }

    /// Declare a custom script test
    pub fn script_test(mut self, script: &str, expected: &str, location: &str) -> Self {
        self.file.test_method = Some("custom_test_script".to_string());
        self.file.custom_test_script = Some(CustomScriptFile {
            script: script.to_string(),
            expected: expected.to_string(),
            expected_location: location.to_string(),
            ..Default::default()
        });
        self
    }

    /// Files preserved when the custom script test fails
    pub fn fail_files(mut self, files: &[(&str, &str)]) -> Self {
        if let Some(script) = self.file.custom_test_script.as_mut() {
            script.fail_files = files.iter().map(|(source, _)| source.to_string()).collect();
            script.fail_file_names = files.iter().map(|(_, target)| target.to_string()).collect();
        }
        self
    }

    pub fn before_test(mut self, snippet: &str) -> Self {
        self.file.before_test_scripts.push(snippet.to_string());
        self
    }

    pub fn after_test(mut self, snippet: &str) -> Self {
        self.file.after_test_scripts.push(snippet.to_string());
        self
    }

    pub fn env(mut self, entry: &str) -> Self {
        self.file.env.push(entry.to_string());
        self
    }

    pub fn custom_config(mut self, line: &str) -> Self {
        self.file.custom_config.push(line.to_string());
        self
    }

    pub fn no_create(mut self) -> Self {
        self.file.no_create_extn = true;
        self
    }

    pub fn no_preload(mut self) -> Self {
        self.file.no_preload = true;
        self
    }

    pub fn preload_name(mut self, name: &str) -> Self {
        self.file.preload_name = Some(name.to_string());
        self
    }

    pub fn preload_first(mut self) -> Self {
        self.file.preload_first = true;
        self
    }

    pub fn post_install(mut self, script: &str) -> Self {
        self.file.post_install_shell_script = Some(script.to_string());
        self
    }

    pub fn build(self) -> ExtensionRecord {
        ExtensionRecord::from_file(self.id, self.file).expect("builder produced an invalid record")
    }
}

/// Registry holding exactly `records`
pub fn registry_of(records: Vec<ExtensionRecord>) -> ExtensionRegistry {
    let mut registry = ExtensionRegistry::new();
    for record in records {
        registry.insert(record);
    }
    registry
}
