use std::fmt;

/// Longest diagnostic handed to the host.
pub const MAX_DIAGNOSTIC_CHARS: usize = 500;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("no WebGL2 or WebGL context available")]
    Unsupported,
    #[error("{stage} shader failed to compile: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("program link failed: {log}")]
    ProgramLink { log: String },
    #[error("graphics resource error: {0}")]
    Resource(String),
}

impl RenderError {
    pub fn shader_compile(stage: ShaderStage, log: &str) -> Self {
        RenderError::ShaderCompile {
            stage,
            log: truncate_diagnostic(log, "Unknown shader error"),
        }
    }

    pub fn program_link(log: &str) -> Self {
        RenderError::ProgramLink {
            log: truncate_diagnostic(log, "Program link failed"),
        }
    }

    /// Text shown in the host's fallback panel.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RenderError::ShaderCompile { log, .. } | RenderError::ProgramLink { log } => Some(log),
            RenderError::Resource(msg) => Some(msg),
            RenderError::Unsupported => None,
        }
    }
}

/// Cuts `log` to [`MAX_DIAGNOSTIC_CHARS`] characters, substituting `empty`
/// when the driver returned nothing.
pub fn truncate_diagnostic(log: &str, empty: &str) -> String {
    let log = log.trim();
    if log.is_empty() {
        return empty.to_string();
    }
    match log.char_indices().nth(MAX_DIAGNOSTIC_CHARS) {
        Some((cut, _)) => log[..cut].to_string(),
        None => log.to_string(),
    }
}

/// The two flags the host reads to decide between the canvas and a fallback panel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FailureSurface {
    pub graphics_unsupported: bool,
    pub shader_error: Option<String>,
}

impl FailureSurface {
    pub fn from_error(error: &RenderError) -> Self {
        match error {
            RenderError::Unsupported => Self {
                graphics_unsupported: true,
                shader_error: None,
            },
            other => Self {
                graphics_unsupported: false,
                shader_error: Some(
                    other
                        .diagnostic()
                        .map(str::to_string)
                        .unwrap_or_else(|| other.to_string()),
                ),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_logs_are_truncated() {
        let log = "x".repeat(2000);
        let err = RenderError::shader_compile(ShaderStage::Fragment, &log);
        assert_eq!(err.diagnostic().map(str::len), Some(MAX_DIAGNOSTIC_CHARS));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let log = "é".repeat(600);
        let cut = truncate_diagnostic(&log, "");
        assert_eq!(cut.chars().count(), MAX_DIAGNOSTIC_CHARS);
    }

    #[test]
    fn empty_logs_get_placeholder() {
        assert_eq!(
            RenderError::program_link("  ").diagnostic(),
            Some("Program link failed")
        );
        assert_eq!(
            RenderError::shader_compile(ShaderStage::Vertex, "").diagnostic(),
            Some("Unknown shader error")
        );
    }

    #[test]
    fn failure_surface_flags() {
        let unsupported = FailureSurface::from_error(&RenderError::Unsupported);
        assert!(unsupported.graphics_unsupported);
        assert!(unsupported.shader_error.is_none());

        let link = FailureSurface::from_error(&RenderError::program_link("varying mismatch"));
        assert!(!link.graphics_unsupported);
        assert_eq!(link.shader_error.as_deref(), Some("varying mismatch"));
        assert_eq!(
            FailureSurface::default(),
            FailureSurface {
                graphics_unsupported: false,
                shader_error: None,
            }
        );
    }
}
