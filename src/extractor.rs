//! Income extraction from scanned income certificates.
//!
//! Text recognition is delegated to a [`TextRecognizer`]; the income heuristic
//! takes the numerically largest digit run in the recognised text, so other large
//! numbers on a certificate (reference ids, unseparated dates) can be misread as
//! income.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Failure inside a text recognizer
#[derive(Debug, Error)]
pub enum RecognitionError {
    #[error("failed to run recognizer: {0}")]
    Io(#[from] std::io::Error),
    #[error("recognizer timed out after {0:?}")]
    Timeout(Duration),
    #[error("recognizer exited with {status}: {stderr}")]
    Engine { status: String, stderr: String },
}

/// Converts a document image into text
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    async fn recognize(&self, path: &Path) -> Result<String, RecognitionError>;
}

/// Runs the `tesseract` CLI, writing recognised text to stdout
pub struct TesseractRecognizer {
    command: String,
    timeout: Duration,
}

impl TesseractRecognizer {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl TextRecognizer for TesseractRecognizer {
    async fn recognize(&self, path: &Path) -> Result<String, RecognitionError> {
        let mut command = Command::new(&self.command);
        command
            .arg(path)
            .arg("stdout")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // dropping the future on timeout must not leave tesseract running
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| RecognitionError::Timeout(self.timeout))??;

        if !output.status.success() {
            return Err(RecognitionError::Engine {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// How an extraction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStatus {
    /// Text was recognised and contained a number
    Recognized,
    /// Text was recognised but had no digits
    NoIncomeFound,
    /// The document path does not point at a readable file
    DocumentMissing,
    /// The recognizer failed or timed out, or the figure was out of range
    Failed,
}

/// Best-effort income read from a document
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extraction {
    /// Extracted income; 0.0 means nothing usable was found
    pub income: f64,
    pub status: ExtractionStatus,
}

impl Extraction {
    fn zero(status: ExtractionStatus) -> Self {
        Self {
            income: 0.0,
            status,
        }
    }

    /// Whether a usable income value came out
    pub fn is_confident(&self) -> bool {
        self.status == ExtractionStatus::Recognized && self.income > 0.0
    }

    /// Whether the stage itself broke, as opposed to finding nothing
    pub fn is_degraded(&self) -> bool {
        matches!(
            self.status,
            ExtractionStatus::DocumentMissing | ExtractionStatus::Failed
        )
    }
}

/// Reads the declared income off a scanned certificate; never fails
#[derive(Clone)]
pub struct DocumentTextExtractor {
    recognizer: Arc<dyn TextRecognizer>,
}

impl DocumentTextExtractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self { recognizer }
    }

    pub async fn extract(&self, path: &Path) -> Extraction {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => {
                warn!(path = %path.display(), "Document path is not a file");
                return Extraction::zero(ExtractionStatus::DocumentMissing);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Document not readable");
                return Extraction::zero(ExtractionStatus::DocumentMissing);
            }
        }

        let text = match self.recognizer.recognize(path).await {
            Ok(text) => text,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "OCR failed, continuing without extracted income");
                return Extraction::zero(ExtractionStatus::Failed);
            }
        };

        match largest_digit_run(&text) {
            Some(income) => {
                debug!(path = %path.display(), income = income, "Extracted income from document");
                Extraction {
                    income,
                    status: ExtractionStatus::Recognized,
                }
            }
            None if contains_digits(&text) => {
                warn!(
                    path = %path.display(),
                    "Income figure out of range, continuing without extracted income"
                );
                Extraction::zero(ExtractionStatus::Failed)
            }
            None => Extraction::zero(ExtractionStatus::NoIncomeFound),
        }
    }
}

/// Zero code points of the decimal digit blocks a recognizer may emit:
/// ASCII, Arabic-Indic, Extended Arabic-Indic, the Indic scripts from
/// Devanagari to Malayalam, and fullwidth forms.
const DIGIT_ZEROS: [u32; 13] = [
    0x0030, 0x0660, 0x06F0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66, 0x0CE6,
    0x0D66, 0xFF10,
];

/// ASCII equivalent of a decimal digit from any supported script
fn ascii_digit(c: char) -> Option<char> {
    let code = u32::from(c);
    DIGIT_ZEROS.iter().find_map(|&zero| {
        code.checked_sub(zero)
            .filter(|&offset| offset < 10)
            .and_then(|offset| char::from_digit(offset, 10))
    })
}

/// Numerically largest run of decimal digits, after dropping `,` separators.
///
/// Digits from other scripts (e.g. Devanagari `४५०००`) count as their ASCII
/// values. A run too large to represent as a finite `f64` yields `None`.
pub fn largest_digit_run(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|&c| c != ',')
        .map(|c| ascii_digit(c).unwrap_or(c))
        .collect();

    cleaned
        .split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .map(|run| {
            let trimmed = run.trim_start_matches('0');
            if trimmed.is_empty() {
                "0"
            } else {
                trimmed
            }
        })
        // compare as integers without overflowing: more digits wins, then lexical
        .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
        .and_then(|run| run.parse::<f64>().ok())
        .filter(|income| income.is_finite())
}

fn contains_digits(text: &str) -> bool {
    text.chars().any(|c| ascii_digit(c).is_some())
}
