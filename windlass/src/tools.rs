//! Ready-made demonstration tools for the chat loop.
//!
//! Filesystem tools stay inside the directory they are constructed with;
//! the summarizer delegates back to a chat backend.

use std::path::PathBuf;
use std::sync::Arc;

use wbackend::{ChatBackend, ChatRequest, Message, ToolDefinition};
use wtooling::{
    Tool, ToolError, ToolExecutionContext, ToolFuture, optional_str, parse_json_object,
    required_str,
};

/// Lists the entries of one directory, hiding dotfiles and editor backups.
pub struct ListDirectoryTool {
    root: PathBuf,
}

impl ListDirectoryTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ListDirectoryTool {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Tool for ListDirectoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_directory".to_string(),
            description: "Lists files and directories in the working directory".to_string(),
            parameters: "{\"type\":\"object\",\"properties\":{}}".to_string(),
        }
    }

    fn invoke<'a>(
        &'a self,
        _args_json: &'a str,
        _context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<String, ToolError>> {
        Box::pin(async move {
            let entries = std::fs::read_dir(&self.root).map_err(|error| {
                ToolError::execution(format!(
                    "failed to list '{}': {error}",
                    self.root.display()
                ))
            })?;

            let mut names = Vec::new();
            for entry in entries {
                let entry = entry.map_err(|error| ToolError::execution(error.to_string()))?;
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.starts_with('.') || name.ends_with('~') {
                    continue;
                }
                names.push(name);
            }
            names.sort();

            Ok(format!(
                "Contents of directory '{}': [{}]",
                self.root.display(),
                names.join(", ")
            ))
        })
    }
}

/// Reads a file relative to the configured root and returns its text.
pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Tool for ReadFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file_contents".to_string(),
            description: "Reads contents from a file and returns the text".to_string(),
            parameters: "{\"type\":\"object\",\"properties\":{\"file_path\":{\"type\":\"string\",\"description\":\"Path to the file to read\"}},\"required\":[\"file_path\"]}".to_string(),
        }
    }

    fn invoke<'a>(
        &'a self,
        args_json: &'a str,
        _context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<String, ToolError>> {
        Box::pin(async move {
            let args = parse_json_object(args_json)?;
            let file_path = required_str(&args, "file_path")?;

            let path = self.root.join(&file_path);
            if !path.exists() {
                return Ok(format!("File not found: {file_path}"));
            }

            let content = std::fs::read_to_string(&path).map_err(|error| {
                ToolError::execution(format!("failed to read '{file_path}': {error}"))
            })?;

            Ok(format!("Contents of file '{file_path}':\n{content}"))
        })
    }
}

/// Summarizes text by asking a chat backend, the way a summarization tool
/// in a tool-calling demo shells back out to the model.
pub struct SummarizeTextTool {
    backend: Arc<dyn ChatBackend>,
    model: String,
}

impl SummarizeTextTool {
    pub fn new(backend: Arc<dyn ChatBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }
}

impl Tool for SummarizeTextTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "summarize_text".to_string(),
            description: "Summarizes input text".to_string(),
            parameters: "{\"type\":\"object\",\"properties\":{\"text\":{\"type\":\"string\",\"description\":\"Text to summarize\"},\"context\":{\"type\":\"string\",\"description\":\"Optional context from an earlier tool\"}},\"required\":[\"text\"]}".to_string(),
        }
    }

    fn invoke<'a>(
        &'a self,
        args_json: &'a str,
        _context: &'a ToolExecutionContext,
    ) -> ToolFuture<'a, Result<String, ToolError>> {
        Box::pin(async move {
            let args = parse_json_object(args_json)?;
            let mut text = required_str(&args, "text")?;
            let context = optional_str(&args, "context").unwrap_or_default();

            // A near-empty text argument usually means the model meant to
            // summarize the previous tool's output.
            let mut prompt = String::from(
                "Summarize this text (and be concise), returning only the summary \
                 with NO OTHER COMMENTS:",
            );
            if text.trim().len() < 50 && !context.is_empty() {
                text = context;
            } else if context.len() > 50 {
                prompt = format!("Given this context:\n\n{context}\n\n{prompt}");
            }

            let request = ChatRequest::new(
                self.model.clone(),
                vec![Message::system(prompt), Message::user(text)],
            );

            let response = self
                .backend
                .complete(request)
                .await
                .map_err(|error| ToolError::execution(error.to_string()))?;

            Ok(response.content)
        })
    }
}
