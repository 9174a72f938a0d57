//! Model capability lookup.
//!
//! Providers rarely advertise what a model accepts, so capabilities are
//! resolved from a wildcard table keyed by model name. Unknown models fall
//! back to text-only without tool calling; adapters use the result to reject
//! unsupported content early instead of round-tripping a provider error.

/// Stable capabilities of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelCapabilities {
    pub image_input: bool,
    pub audio_input: bool,
    pub video_input: bool,
    pub tool_calling: bool,
    pub is_embedding_model: bool,
}

impl ModelCapabilities {
    pub const TEXT_ONLY: Self = Self {
        image_input: false,
        audio_input: false,
        video_input: false,
        tool_calling: false,
        is_embedding_model: false,
    };

    pub const TEXT_WITH_TOOLS: Self = Self {
        tool_calling: true,
        ..Self::TEXT_ONLY
    };

    pub const FULL_MULTIMODAL: Self = Self {
        image_input: true,
        audio_input: true,
        video_input: true,
        tool_calling: true,
        is_embedding_model: false,
    };

    pub const EMBEDDING: Self = Self {
        is_embedding_model: true,
        ..Self::TEXT_ONLY
    };

    const VISION: Self = Self {
        image_input: true,
        ..Self::TEXT_WITH_TOOLS
    };

    pub fn multimodal_input(&self) -> bool {
        self.image_input || self.audio_input || self.video_input
    }
}

/// Pattern table, first match wins. More specific patterns go first.
const CAPABILITY_TABLE: &[(&str, ModelCapabilities)] = &[
    ("gemini-embedding*", ModelCapabilities::EMBEDDING),
    ("text-embedding*", ModelCapabilities::EMBEDDING),
    ("embedding-*", ModelCapabilities::EMBEDDING),
    ("gemini-*", ModelCapabilities::FULL_MULTIMODAL),
    ("gpt-4o*", ModelCapabilities::VISION),
    ("gpt-4.1*", ModelCapabilities::VISION),
    ("gpt-4-turbo*", ModelCapabilities::VISION),
    ("gpt-4*", ModelCapabilities::TEXT_WITH_TOOLS),
    ("gpt-3.5*", ModelCapabilities::TEXT_WITH_TOOLS),
    ("o1*", ModelCapabilities::TEXT_WITH_TOOLS),
    ("o3*", ModelCapabilities::TEXT_WITH_TOOLS),
    ("glm-4v*", ModelCapabilities::VISION),
    ("GLM-4V*", ModelCapabilities::VISION),
    ("glm-*", ModelCapabilities::TEXT_WITH_TOOLS),
    ("deepseek-*", ModelCapabilities::TEXT_WITH_TOOLS),
    ("qwen*", ModelCapabilities::TEXT_WITH_TOOLS),
];

/// Resolve capabilities for a model name.
pub fn capabilities_for(model_name: &str) -> ModelCapabilities {
    for (pattern, caps) in CAPABILITY_TABLE {
        if wildcard_match(pattern, model_name) {
            return *caps;
        }
    }
    ModelCapabilities::TEXT_ONLY
}

/// Glob match supporting `*` only. Iterative backtracking, no allocation.
fn wildcard_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();
    let (mut pi, mut ni) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ni < n.len() {
        if pi < p.len() && (p[pi] == n[ni]) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ni));
            pi += 1;
        } else if let Some((sp, sn)) = star {
            pi = sp + 1;
            ni = sn + 1;
            star = Some((sp, sn + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
