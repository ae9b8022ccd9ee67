//! Centralized constants for kasane.
//!
//! All magic numbers, default strings, and policy defaults live here
//! so they can be changed in one place.

/// Application name used in CLI output and directory paths.
pub const APP_NAME: &str = "kasane";

/// Default LLM model identifier.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-6";

/// Maximum tokens for LLM completions (summaries are short by construction).
pub const MAX_TOKENS: u64 = 4096;

/// Default system prompt assumed when estimating a request without one.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant. Answer clearly and concisely.";

/// Configuration filename.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Per-project configuration filename.
pub const PROJECT_CONFIG_FILENAME: &str = "kasane.toml";

/// File under the data directory holding persisted summaries.
pub const SUMMARY_STORE_FILENAME: &str = "summaries.json";

/// Directory under the data directory holding conversation logs.
pub const CONVERSATIONS_DIRNAME: &str = "conversations";

/// Default LLM model identifier for OpenAI.
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1";

/// Default LLM model identifier for OpenRouter.
pub const DEFAULT_OPENROUTER_MODEL: &str = "arcee-ai/trinity-large-preview:free";

/// Default base URL for local Ollama server.
pub const OLLAMA_DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Default LLM model identifier for Ollama.
pub const OLLAMA_DEFAULT_MODEL: &str = "llama3";

// --- Provider defaults ---

/// Default provider when none is configured.
pub const DEFAULT_PROVIDER: &str = "anthropic";

// --- Context window ---

/// Default context window size for models not in the registry.
pub const DEFAULT_CONTEXT_WINDOW: usize = 128_000;

// --- Token estimation ---

/// Characters per token for Latin-script text.
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Characters per token for Hangul/CJK-heavy text.
pub const DENSE_CHARS_PER_TOKEN: f64 = 1.5;

/// Share of dense-script characters above which the dense ratio applies.
pub const DENSE_SCRIPT_SHARE: f64 = 0.3;

/// Flat cost of an image part or image attachment.
pub const IMAGE_TOKENS: usize = 1_000;

/// Flat cost of a PDF attachment.
pub const PDF_TOKENS: usize = 5_000;

/// Flat cost of a source-code attachment.
pub const CODE_FILE_TOKENS: usize = 3_000;

/// Flat cost of any other attachment.
pub const OTHER_FILE_TOKENS: usize = 2_000;

/// Cost charged for part kinds the estimator does not recognise.
pub const UNKNOWN_PART_TOKENS: usize = 500;

// --- Compaction defaults ---

/// Fraction of the context window the request may occupy.
pub const COMPACTION_THRESHOLD_DEFAULT: f64 = 0.80;

/// Number of newest messages always kept verbatim.
pub const COMPACTION_RECENT_WINDOW_DEFAULT: usize = 4;

/// Upper bound on summary size, in tokens.
pub const COMPACTION_MAX_SUMMARY_TOKENS_DEFAULT: usize = 32_000;

/// Per-message character cap applied before summarization.
pub const COMPACTION_MESSAGE_CHAR_CAP_DEFAULT: usize = 2_000;

/// Per-tool-result character cap applied before summarization.
pub const COMPACTION_TOOL_RESULT_CHAR_CAP_DEFAULT: usize = 1_000;

/// Seconds before a summarization call is abandoned for the fallback.
pub const COMPACTION_SUMMARY_TIMEOUT_SECS_DEFAULT: u64 = 60;

/// Length of the oldest-message excerpt in the fallback summary.
pub const FALLBACK_EXCERPT_CHARS: usize = 100;

/// Tool-results key that carries provider token usage, never summarized.
pub const TOKEN_USAGE_KEY: &str = "token_usage";

/// Preamble for the summarization agent.
pub const SUMMARY_PREAMBLE: &str =
    "You condense chat transcripts into compact notes that let another model continue the conversation.";

/// Instruction prepended to the transcript sent for summarization.
pub const COMPACTION_PROMPT: &str =
    "Summarize the following conversation concisely. Include only essential information:\n\
- Main topics and decisions made\n\
- The user's requests and preferences\n\
- Important code snippets, data, or file contents (key parts only)\n\
- Incomplete tasks or next steps\n\
- Any specific context needed to continue the conversation\n\n\
Conversation:\n";

/// Trailer appended after the transcript.
pub const COMPACTION_PROMPT_TRAILER: &str =
    "\n\nSummary (be concise, focus on what is needed to continue the conversation):";

/// Header of the synthetic summary message handed to the reply model.
pub const SUMMARY_MESSAGE_HEADER: &str = "[Previous Conversation Summary]";

/// Footer of the synthetic summary message handed to the reply model.
pub const SUMMARY_MESSAGE_FOOTER: &str =
    "---\nPlease continue the conversation based on the above summary.";

/// Header of the pseudo-message carrying an existing summary into an extension round.
pub const SUMMARY_CONTEXT_HEADER: &str = "[Previous Summary Context]";
