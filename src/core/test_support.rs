//! Fakes shared by the unit and integration tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::downloader::{CommandOutput, CommandRunner};
use super::models::AppResult;

type Effect = Arc<dyn Fn(&[String], &Path) + Send + Sync>;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
}

/// Records every invocation; programs are matched by file name
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<RecordedCall>>,
    failing: Vec<String>,
    effects: HashMap<String, Effect>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, program: &str) -> Self {
        self.failing.push(program.to_string());
        self
    }

    /// Run `effect` (e.g. create output files) whenever `program` is invoked
    pub fn with_effect(
        mut self,
        program: &str,
        effect: impl Fn(&[String], &Path) + Send + Sync + 'static,
    ) -> Self {
        self.effects.insert(program.to_string(), Arc::new(effect));
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| Self::name_of(&call.program) == program)
            .collect()
    }

    fn name_of(program: &Path) -> String {
        program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, program: &Path, args: &[String], cwd: &Path) -> AppResult<CommandOutput> {
        self.calls.lock().push(RecordedCall {
            program: program.to_path_buf(),
            args: args.to_vec(),
            cwd: cwd.to_path_buf(),
        });

        let name = Self::name_of(program);
        if let Some(effect) = self.effects.get(&name) {
            effect(args, cwd);
        }

        if self.failing.contains(&name) {
            return Ok(CommandOutput {
                success: false,
                code: Some(1),
                stderr: "ERROR: boom".to_string(),
            });
        }

        Ok(CommandOutput {
            success: true,
            code: Some(0),
            stderr: String::new(),
        })
    }
}

/// Create empty files named `names` inside `dir`
pub fn touch_all(dir: &Path, names: &[&str]) {
    for name in names {
        std::fs::write(dir.join(name), b"x").unwrap();
    }
}
