//! Scripted tool runner for tests

use std::cell::RefCell;

use crate::winre::error::ResizeError;

use super::{ExternalToolResult, ToolRunner};

struct Response {
    needle: String,
    result: ExternalToolResult,
    once: bool,
}

/// Answers each invocation with the first registered response whose needle
/// occurs in the command line, and records every command line it sees.
#[derive(Default)]
pub struct ScriptedRunner {
    responses: RefCell<Vec<Response>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, needle: &str, result: ExternalToolResult) -> Self {
        self.responses.borrow_mut().push(Response {
            needle: needle.to_string(),
            result,
            once: false,
        });
        self
    }

    /// Response used for the first match only
    pub fn once(self, needle: &str, result: ExternalToolResult) -> Self {
        self.responses.borrow_mut().push(Response {
            needle: needle.to_string(),
            result,
            once: true,
        });
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called_with(&self, needle: &str) -> bool {
        self.calls.borrow().iter().any(|c| c.contains(needle))
    }

    pub fn count(&self, needle: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.contains(needle)).count()
    }
}

impl ToolRunner for ScriptedRunner {
    fn run(&self, program: &str, args: &[String]) -> Result<ExternalToolResult, ResizeError> {
        let line = format!("{} {}", program, args.join(" "));
        self.calls.borrow_mut().push(line.clone());

        let mut responses = self.responses.borrow_mut();
        let Some(index) = responses.iter().position(|r| line.contains(&r.needle)) else {
            return Ok(ExternalToolResult::failed(
                1,
                format!("no scripted response for: {line}"),
            ));
        };
        let result = responses[index].result.clone();
        if responses[index].once {
            responses.remove(index);
        }
        Ok(result)
    }
}
