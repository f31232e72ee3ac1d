use exif::Error as ExifError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("EXIF error: {0}")]
    Exif(#[from] ExifError),

    #[error("JSON error: {0}")]
    Json(#[from] SerdeJsonError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Submission rejected with status {0}")]
    SubmissionRejected(reqwest::StatusCode),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Failure reasons of the metadata normalizer. All are terminal for the
/// attempt; the caller may start a new one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("no authenticated owner")]
    Unauthenticated,

    #[error("location permission denied")]
    LocationPermissionDenied,

    #[error("location fix unavailable")]
    LocationUnavailable,

    #[error("capture returned no usable image")]
    CaptureFailed,

    #[error("one or more GPS tags are missing")]
    MissingGpsData,

    #[error("GPS coordinates out of range")]
    InvalidGpsData,

    #[error("no capture date in EXIF")]
    MissingCaptureDate,

    #[error("EXIF capture date does not parse to a real instant")]
    InvalidExifDate,

    #[error("image has no EXIF data")]
    NoExifData,

    #[error("selected file is not an image")]
    UnsupportedFile,

    #[error("image could not be read")]
    ImageReadFailed,
}

/// Severity of a notice, rendered as the dialog title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Warning,
    Error,
}

/// A localized message the UI layer shows verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: &'static str,
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self.level {
            NoticeLevel::Warning => "Aviso",
            NoticeLevel::Error => "Erro",
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.title(), self.message)
    }
}

impl NormalizeError {
    pub fn notice(&self) -> Notice {
        use NoticeLevel::*;
        let (level, message) = match self {
            NormalizeError::Unauthenticated => {
                (Warning, "Sessão não encontrada. Faça login para enviar fotos.")
            }
            NormalizeError::LocationPermissionDenied => (
                Warning,
                "Permissão de localização negada. Ative a localização para georreferenciar a foto.",
            ),
            NormalizeError::LocationUnavailable | NormalizeError::CaptureFailed => (
                Error,
                "Falha ao capturar a foto ou obter localização. Tente novamente.",
            ),
            NormalizeError::MissingGpsData => (
                Warning,
                "A imagem selecionada não possui dados de GPS, ative esta funcionalidade na câmera do seu dispositivo.",
            ),
            NormalizeError::InvalidGpsData => {
                (Error, "As coordenadas GPS da imagem são inválidas.")
            }
            NormalizeError::MissingCaptureDate => (
                Warning,
                "A imagem selecionada não possui data de captura.",
            ),
            NormalizeError::InvalidExifDate => {
                (Error, "A data de captura da imagem é inválida.")
            }
            NormalizeError::NoExifData => (Error, "Nenhum dado EXIF encontrado na imagem."),
            NormalizeError::UnsupportedFile => {
                (Warning, "Selecione um arquivo de imagem.")
            }
            NormalizeError::ImageReadFailed => {
                (Error, "Falha ao processar a imagem. Tente novamente.")
            }
        };
        Notice { level, message }
    }
}
