use thiserror::Error;

/// Errors surfaced by detectors, sessions and frame sources.
///
/// A reference/frame dimension mismatch is not an error: the detector
/// rebuilds its reference and reports an empty result for that frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// No frame source could be acquired (no device, empty directory, ...).
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(String),
    /// The execution context forbids acquiring this source.
    #[error("unsupported capture environment: {0}")]
    UnsupportedEnvironment(String),
    /// Luminance or diff computation failed on a malformed frame.
    /// Fatal for the session that hit it.
    #[error("frame processing fault: {0}")]
    ProcessingFault(String),
    #[error("detection session is not running (state: {0})")]
    NotRunning(&'static str),
    #[error("detection start cancelled by stop request")]
    Cancelled,
}

impl DetectorError {
    /// True for errors raised while acquiring a source.
    pub fn is_acquisition(&self) -> bool {
        matches!(
            self,
            DetectorError::SourceUnavailable(_) | DetectorError::UnsupportedEnvironment(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_cause() {
        let err = DetectorError::SourceUnavailable("no capture device found".into());
        assert_eq!(
            err.to_string(),
            "frame source unavailable: no capture device found"
        );
        assert!(err.is_acquisition());
        assert!(!DetectorError::ProcessingFault("bad".into()).is_acquisition());
    }
}
