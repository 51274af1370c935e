use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Every failure the converter can surface to the window.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("select a video file")]
    NotAVideo { mime: String },

    #[error("invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },

    #[error("no file selected")]
    NoFileSelected,

    #[error("cannot read {}: {message}", path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("a conversion is already running")]
    Busy,

    #[error("{0} is not available on this system")]
    UnsupportedEnvironment(String),

    #[error("failed to load {}: {message}", path.display())]
    MediaLoad { path: PathBuf, message: String },

    #[error("cannot allocate a {width}x{height} drawing surface")]
    SurfaceUnavailable { width: u32, height: u32 },

    #[error("GIF encoding failed: {0}")]
    Encode(String),

    #[error("transcoding failed: {0}")]
    Transcode(String),

    #[error("the transcoder produced no output")]
    NoOutput,

    #[error("conversion was interrupted")]
    Interrupted,

    #[error("{tool} failed: {message}")]
    Tool { tool: String, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Whether the error stopped a conversion before any pipeline ran.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::NotAVideo { .. }
                | Self::InvalidField { .. }
                | Self::NoFileSelected
                | Self::Unreadable { .. }
                | Self::Busy
                | Self::UnsupportedEnvironment(_)
        )
    }

    /// The text shown in the window's error line.
    pub fn user_message(&self) -> String {
        if self.is_precondition() {
            self.to_string()
        } else {
            format!("conversion failed: {self}")
        }
    }
}
