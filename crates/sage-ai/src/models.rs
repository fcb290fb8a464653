//! Model registry with context window data and public lookup API.

/// Static registry entry for a known model
#[derive(Debug, Clone, Copy)]
pub struct ModelEntry {
    /// Model identifier used in API calls
    pub id: &'static str,
    /// Context window size in tokens (prompt + history + response)
    pub context_window: u32,
    /// Training data cutoff, for display
    pub training_cutoff: &'static str,
}

/// Known chat models and their context windows
pub const MODEL_ENTRIES: &[ModelEntry] = &[
    ModelEntry {
        id: "gpt-4-0125-preview",
        context_window: 128_000,
        training_cutoff: "Apr 2023",
    },
    ModelEntry {
        id: "gpt-4-turbo-preview",
        context_window: 128_000,
        training_cutoff: "Apr 2023",
    },
    ModelEntry {
        id: "gpt-4-1106-preview",
        context_window: 128_000,
        training_cutoff: "Apr 2023",
    },
    ModelEntry {
        id: "gpt-4",
        context_window: 8_192,
        training_cutoff: "Sep 2021",
    },
    ModelEntry {
        id: "gpt-4-0613",
        context_window: 8_192,
        training_cutoff: "Sep 2021",
    },
    ModelEntry {
        id: "gpt-4-32k",
        context_window: 32_768,
        training_cutoff: "Sep 2021",
    },
    ModelEntry {
        id: "gpt-4-32k-0613",
        context_window: 32_768,
        training_cutoff: "Sep 2021",
    },
    ModelEntry {
        id: "gpt-3.5-turbo-1106",
        context_window: 16_385,
        training_cutoff: "Sep 2021",
    },
    ModelEntry {
        id: "gpt-3.5-turbo",
        context_window: 4_096,
        training_cutoff: "Sep 2021",
    },
];

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4-0125-preview";

/// Known-good model substituted when the configured one is rejected
pub const FALLBACK_MODEL: &str = "gpt-4-0125-preview";

/// Context window assumed for unrecognized model ids
pub const DEFAULT_CONTEXT_WINDOW: u32 = 8_192;

/// Look up a model by ID.
pub fn get_model(id: &str) -> Option<&'static ModelEntry> {
    MODEL_ENTRIES.iter().find(|e| e.id == id)
}

/// Context window for a model id, falling back to a conservative default
/// when the id is not in the registry.
pub fn context_window_for(id: &str) -> u32 {
    get_model(id)
        .map(|e| e.context_window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}
