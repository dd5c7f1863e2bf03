//! Model identifiers advertised by `GET /v1/agents/models`.
//!
//! The first entry is the default. Any `provider:model` pair whose provider
//! is configured can be used, listed here or not.

pub const KNOWN_MODELS: &[&str] = &[
    // OpenAI
    "openai:gpt-4o-mini",
    "openai:gpt-4o",
    "openai:gpt-4.5-preview",
    "openai:o3-mini",
    "openai:o1-mini",
    "openai:o1",
    // Anthropic
    "anthropic:claude-3-7-sonnet-latest",
    "anthropic:claude-3-5-haiku-latest",
    "anthropic:claude-3-5-sonnet-latest",
    "anthropic:claude-3-5-sonnet-20240620",
    // Google GenAI
    "google_genai:gemini-2.5-pro-exp-03-25",
    "google_genai:gemini-2.0-flash",
    "google_genai:gemini-2.0-flash-lite",
    "google_genai:gemini-1.5-flash",
    "google_genai:gemini-1.5-flash-8b",
    "google_genai:gemini-1.5-pro",
    // Groq
    "groq:meta-llama/llama-4-scout-17b-16e-instruct",
    "groq:llama-3.3-70b-versatile",
    "groq:llama-3.3-70b-specdec",
    "groq:llama-3.1-8b-instant",
    "groq:mistral-saba-24b",
    "groq:qwen-qwq-32b",
    "groq:deepseek-r1-distill-llama-70b",
];
