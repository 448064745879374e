//! Result sinks
//!
//! The runtime hands finished report items to a [`ResultsWriter`]. The
//! filesystem writer produces the layout `allure generate` expects; the
//! memory writer keeps everything in process for inspection.

use indexmap::IndexMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::RelayResult;
use crate::model::{Category, TestResult, TestResultContainer};

/// Destination for finished report items
pub trait ResultsWriter {
    fn write_result(&mut self, result: &TestResult) -> RelayResult<()>;

    fn write_container(&mut self, container: &TestResultContainer) -> RelayResult<()>;

    /// Store attachment bytes under the given source file name
    fn write_attachment(&mut self, source: &str, content: &[u8]) -> RelayResult<()>;

    fn write_categories(&mut self, categories: &[Category]) -> RelayResult<()>;

    fn write_environment(&mut self, environment: &IndexMap<String, String>) -> RelayResult<()>;
}

/// Writes results into a directory
#[derive(Debug, Clone)]
pub struct FileSystemWriter {
    dir: PathBuf,
}

impl FileSystemWriter {
    /// Open the results directory, optionally wiping previous results
    pub fn new(dir: impl AsRef<Path>, clean: bool) -> RelayResult<Self> {
        let dir = dir.as_ref().to_path_buf();

        if clean && dir.exists() {
            info!("Cleaning previous results in {}", dir.display());
            std::fs::remove_dir_all(&dir)?;
        }
        std::fs::create_dir_all(&dir)?;

        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write_json<T: serde::Serialize + ?Sized>(&self, file_name: &str, value: &T) -> RelayResult<()> {
        let path = self.dir.join(file_name);
        let json = serde_json::to_string(value)?;
        std::fs::write(&path, json)?;
        debug!("Wrote {}", path.display());
        Ok(())
    }
}

impl ResultsWriter for FileSystemWriter {
    fn write_result(&mut self, result: &TestResult) -> RelayResult<()> {
        self.write_json(&format!("{}-result.json", result.uuid), result)
    }

    fn write_container(&mut self, container: &TestResultContainer) -> RelayResult<()> {
        self.write_json(&format!("{}-container.json", container.uuid), container)
    }

    fn write_attachment(&mut self, source: &str, content: &[u8]) -> RelayResult<()> {
        std::fs::write(self.dir.join(source), content)?;
        Ok(())
    }

    fn write_categories(&mut self, categories: &[Category]) -> RelayResult<()> {
        self.write_json("categories.json", categories)
    }

    fn write_environment(&mut self, environment: &IndexMap<String, String>) -> RelayResult<()> {
        let mut content = String::new();
        for (key, value) in environment {
            content.push_str(&format!("{}={}\n", key, value));
        }
        std::fs::write(self.dir.join("environment.properties"), content)?;
        Ok(())
    }
}

/// Keeps every written item in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryWriter {
    pub results: Vec<TestResult>,
    pub containers: Vec<TestResultContainer>,
    pub attachments: HashMap<String, Vec<u8>>,
    pub categories: Vec<Category>,
    pub environment: IndexMap<String, String>,
}

impl MemoryWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent result written for a test name
    pub fn result(&self, name: &str) -> Option<&TestResult> {
        self.results.iter().rev().find(|r| r.name == name)
    }
}

impl ResultsWriter for MemoryWriter {
    fn write_result(&mut self, result: &TestResult) -> RelayResult<()> {
        self.results.push(result.clone());
        Ok(())
    }

    fn write_container(&mut self, container: &TestResultContainer) -> RelayResult<()> {
        self.containers.push(container.clone());
        Ok(())
    }

    fn write_attachment(&mut self, source: &str, content: &[u8]) -> RelayResult<()> {
        self.attachments.insert(source.to_string(), content.to_vec());
        Ok(())
    }

    fn write_categories(&mut self, categories: &[Category]) -> RelayResult<()> {
        self.categories = categories.to_vec();
        Ok(())
    }

    fn write_environment(&mut self, environment: &IndexMap<String, String>) -> RelayResult<()> {
        self.environment = environment.clone();
        Ok(())
    }
}
