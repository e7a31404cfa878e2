//! Prompt library for model calls
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/dedux/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! This allows users to tune prompts without modifying the source, while
//! automatically getting new default prompts on upgrade.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const EXTRACT_RECEIPT: &str = include_str!("../../../prompts/extract_receipt.md");
    pub const CLASSIFY_DEDUCTION: &str = include_str!("../../../prompts/classify_deduction.md");
    pub const ANSWER_QUESTION: &str = include_str!("../../../prompts/answer_question.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    /// Vision extraction of receipt fields
    ExtractReceipt,
    /// Deduction classification against knowledge-base context
    ClassifyDeduction,
    /// Free-text tax question answering
    AnswerQuestion,
}

impl PromptId {
    /// Get the string identifier for this prompt
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractReceipt => "extract_receipt",
            Self::ClassifyDeduction => "classify_deduction",
            Self::AnswerQuestion => "answer_question",
        }
    }

    /// Get all known prompt IDs
    pub fn all() -> &'static [PromptId] {
        &[
            Self::ExtractReceipt,
            Self::ClassifyDeduction,
            Self::AnswerQuestion,
        ]
    }

    /// Get the default embedded content for this prompt
    fn default_content(&self) -> &'static str {
        match self {
            Self::ExtractReceipt => defaults::EXTRACT_RECEIPT,
            Self::ClassifyDeduction => defaults::CLASSIFY_DEDUCTION,
            Self::AnswerQuestion => defaults::ANSWER_QUESTION,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    /// Unique identifier
    pub id: String,
    /// Version number for tracking changes
    pub version: u32,
    /// Task type (vision, reasoning)
    pub task_type: String,
}

/// A loaded prompt with metadata and content
#[derive(Debug, Clone)]
pub struct Prompt {
    /// Metadata from frontmatter
    pub metadata: PromptMetadata,
    /// The prompt content (system + user sections)
    pub content: String,
    /// Whether this came from an override file
    pub is_override: bool,
    /// Path to override file (if any)
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    /// Get the system section of the prompt
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    /// Get the user section of the prompt
    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the prompt with template variables replaced
    pub fn render(&self, vars: &HashMap<&str, &str>) -> String {
        let mut result = self.content.clone();

        // Simple mustache-style replacement: {{var}}
        for (key, value) in vars {
            let pattern = format!("{{{{{}}}}}", key);
            result = result.replace(&pattern, value);
        }

        remove_unmatched_conditionals(&result, vars)
    }

    /// Render just the user section with variables
    pub fn render_user(&self, vars: &HashMap<&str, &str>) -> String {
        if let Some(user) = self.user_section() {
            let mut result = user.to_string();
            for (key, value) in vars {
                let pattern = format!("{{{{{}}}}}", key);
                result = result.replace(&pattern, value);
            }
            remove_unmatched_conditionals(&result, vars)
        } else {
            self.render(vars)
        }
    }
}

/// Prompt library for loading and caching prompts
pub struct PromptLibrary {
    /// Override directory path
    override_dir: Option<PathBuf>,
    /// Cached parsed prompts
    cache: HashMap<PromptId, Prompt>,
}

impl PromptLibrary {
    /// Create a new prompt library with default paths
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with a custom override directory
    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
            cache: HashMap::new(),
        }
    }

    /// Create a prompt library with no override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self {
            override_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Get a prompt by ID, loading from override or default
    pub fn get(&mut self, id: PromptId) -> Result<&Prompt> {
        if !self.cache.contains_key(&id) {
            let prompt = self.load(id)?;
            self.cache.insert(id, prompt);
        }
        Ok(self.cache.get(&id).unwrap())
    }

    /// Load a prompt (checking override first, then default)
    fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(ref override_dir) = self.override_dir {
            let override_path = override_dir.join(format!("{}.md", id.as_str()));
            if override_path.exists() {
                let content = fs::read_to_string(&override_path).map_err(|e| {
                    Error::InvalidData(format!("Failed to read prompt override: {}", e))
                })?;
                let (metadata, body) = parse_prompt(&content)?;
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                    override_path: Some(override_path),
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    /// List all prompts with their override status
    pub fn list(&mut self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let has_override = self.has_override(id);
                let prompt = self.get(id).ok();
                PromptInfo {
                    id: id.as_str().to_string(),
                    version: prompt.map(|p| p.metadata.version).unwrap_or(0),
                    task_type: prompt
                        .map(|p| p.metadata.task_type.clone())
                        .unwrap_or_default(),
                    has_override,
                    override_path: if has_override {
                        self.override_dir
                            .as_ref()
                            .map(|d| d.join(format!("{}.md", id.as_str())))
                    } else {
                        None
                    },
                }
            })
            .collect()
    }

    /// Check if a prompt has an override file
    pub fn has_override(&self, id: PromptId) -> bool {
        if let Some(ref override_dir) = self.override_dir {
            override_dir.join(format!("{}.md", id.as_str())).exists()
        } else {
            false
        }
    }

    /// Get the override directory path
    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    /// Clear the cache (useful after editing override files)
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone)]
pub struct PromptInfo {
    /// Prompt identifier
    pub id: String,
    /// Version from metadata
    pub version: u32,
    /// Task type (vision, reasoning)
    pub task_type: String,
    /// Whether an override exists
    pub has_override: bool,
    /// Path to override file (if exists)
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("dedux").join("prompts").join("overrides"))
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    if !content.starts_with("---") {
        return Err(Error::InvalidData(
            "Prompt must start with YAML frontmatter (---)".into(),
        ));
    }

    let rest = &content[3..];
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let frontmatter = rest[..end].trim();
    let body = rest[end + 3..].trim();

    let metadata: PromptMetadata = serde_yaml::from_str(frontmatter)
        .map_err(|e| Error::InvalidData(format!("Invalid prompt frontmatter: {}", e)))?;

    Ok((metadata, body.to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];

    // Section runs until the next header or end of content
    let end = after_header.find("\n# ").unwrap_or(after_header.len());

    Some(after_header[..end].trim())
}

/// Remove `{{#if var}}...{{/if}}` blocks whose variable is absent or empty,
/// keeping the inner content of blocks whose variable is present
fn remove_unmatched_conditionals(content: &str, vars: &HashMap<&str, &str>) -> String {
    let mut result = content.to_string();

    loop {
        let Some(if_start) = result.find("{{#if ") else {
            break;
        };
        let var_start = if_start + 6;
        let Some(var_end) = result[var_start..].find("}}") else {
            break;
        };
        let var_name = result[var_start..var_start + var_end].to_string();
        let block_start = var_start + var_end + 2;
        let Some(endif_pos) = result[block_start..].find("{{/if}}") else {
            break;
        };
        let block_end = block_start + endif_pos;
        let full_end = block_end + 7;

        let should_include = vars
            .get(var_name.as_str())
            .is_some_and(|v| !v.is_empty());

        if should_include {
            let block_content = result[block_start..block_end].to_string();
            result.replace_range(if_start..full_end, &block_content);
        } else {
            result.replace_range(if_start..full_end, "");
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 1
task_type: reasoning
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;
        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 1);
        assert_eq!(metadata.task_type, "reasoning");
        assert!(body.contains("# System"));
        assert!(body.contains("{{variable}}"));
    }

    #[test]
    fn test_parse_prompt_missing_frontmatter() {
        assert!(parse_prompt("# System\nNo frontmatter here.").is_err());
    }

    #[test]
    fn test_render_replaces_variables() {
        let prompt = Prompt {
            metadata: PromptMetadata {
                id: "t".into(),
                version: 1,
                task_type: "reasoning".into(),
            },
            content: "# User\nClassify {{merchant}} for {{amount}} THB.".into(),
            is_override: false,
            override_path: None,
        };
        let mut vars = HashMap::new();
        vars.insert("merchant", "Bangkok Hospital");
        vars.insert("amount", "18000");
        assert_eq!(
            prompt.render_user(&vars),
            "Classify Bangkok Hospital for 18000 THB."
        );
    }

    #[test]
    fn test_conditional_blocks() {
        let prompt = Prompt {
            metadata: PromptMetadata {
                id: "t".into(),
                version: 1,
                task_type: "reasoning".into(),
            },
            content: "# User\nQuestion.{{#if context}} Context: {{context}}{{/if}}".into(),
            is_override: false,
            override_path: None,
        };

        let mut vars = HashMap::new();
        vars.insert("context", "rule text");
        assert_eq!(prompt.render_user(&vars), "Question. Context: rule text");

        let empty: HashMap<&str, &str> = HashMap::new();
        assert_eq!(prompt.render_user(&empty), "Question.");
    }

    #[test]
    fn test_embedded_defaults_parse() {
        let mut library = PromptLibrary::embedded_only();
        for &id in PromptId::all() {
            let prompt = library.get(id).unwrap();
            assert_eq!(prompt.metadata.id, id.as_str());
            assert!(!prompt.is_override);
            assert!(prompt.user_section().is_some(), "{} has no user section", id.as_str());
        }
    }

    #[test]
    fn test_override_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let override_path = dir.path().join("answer_question.md");
        fs::write(
            &override_path,
            "---\nid: answer_question\nversion: 9\ntask_type: reasoning\n---\n\n# User\nCustom {{question}}",
        )
        .unwrap();

        let mut library = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        let prompt = library.get(PromptId::AnswerQuestion).unwrap();
        assert!(prompt.is_override);
        assert_eq!(prompt.metadata.version, 9);

        // Other ids still come from embedded defaults
        let prompt = library.get(PromptId::ExtractReceipt).unwrap();
        assert!(!prompt.is_override);
    }

    #[test]
    fn test_clear_cache_picks_up_edited_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("answer_question.md");
        fs::write(
            &path,
            "---\nid: answer_question\nversion: 1\ntask_type: reasoning\n---\n\n# User\nFirst {{question}}",
        )
        .unwrap();

        let mut library = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        let version = library.get(PromptId::AnswerQuestion).unwrap().metadata.version;
        assert_eq!(version, 1);

        // Cached copy survives the edit until the cache is cleared
        fs::write(
            &path,
            "---\nid: answer_question\nversion: 2\ntask_type: reasoning\n---\n\n# User\nSecond {{question}}",
        )
        .unwrap();
        let version = library.get(PromptId::AnswerQuestion).unwrap().metadata.version;
        assert_eq!(version, 1);

        library.clear_cache();
        let version = library.get(PromptId::AnswerQuestion).unwrap().metadata.version;
        assert_eq!(version, 2);
    }

    #[test]
    fn test_list_reports_override_status() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("classify_deduction.md"),
            "---\nid: classify_deduction\nversion: 4\ntask_type: reasoning\n---\n\n# User\nCustom",
        )
        .unwrap();

        let mut library = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        let infos = library.list();
        assert_eq!(infos.len(), PromptId::all().len());

        let classify = infos
            .iter()
            .find(|i| i.id == "classify_deduction")
            .unwrap();
        assert!(classify.has_override);
        assert_eq!(classify.version, 4);
        assert!(classify.override_path.is_some());

        let extract = infos.iter().find(|i| i.id == "extract_receipt").unwrap();
        assert!(!extract.has_override);
        assert!(extract.override_path.is_none());
    }
}
