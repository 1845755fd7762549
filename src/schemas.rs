use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct CompileRequest {
    /// The source text to compile.
    #[serde(default)]
    pub code: String,
    /// Language tag; `c`, `cpp`, `cc`, `c++` or absent (defaults to C).
    #[serde(default, rename = "type")]
    pub lang: String,
    /// User-supplied compiler arguments, filtered before use.
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CompileResponse {
    pub ok: bool,
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub js: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wasm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CompileResponse {
    pub fn success(id: String, js: String, wasm: String) -> Self {
        Self {
            ok: true,
            id,
            js: Some(js),
            wasm: Some(wasm),
            error: None,
        }
    }

    pub fn failure(id: String, error: String) -> Self {
        Self {
            ok: false,
            id,
            js: None,
            wasm: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    C,
    Cpp,
}

impl Language {
    /// Parse a request language tag. An empty tag defaults to C; unknown tags
    /// are rejected.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "" | "c" => Some(Self::C),
            "cpp" | "cc" | "c++" => Some(Self::Cpp),
            _ => None,
        }
    }

    pub fn source_file(self) -> &'static str {
        match self {
            Self::C => "main.c",
            Self::Cpp => "main.cpp",
        }
    }

    pub fn compiler(self) -> &'static str {
        match self {
            Self::C => "emcc",
            Self::Cpp => "em++",
        }
    }
}
