use thiserror::Error;

/// Crate-wide result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the simulation core and its configuration layer.
///
/// Every variant carries enough context to name the offending input.
/// Nothing inside a single step is recoverable: a failure there means a
/// precondition was violated before the step began.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid user or API parameter (non-positive scattering time, timestep, ensemble size, ...).
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration document is well-formed YAML but semantically unusable.
    #[error("configuration error: {0}")]
    Config(String),

    /// Propagated I/O errors (reading scenario files).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Propagated YAML decoding errors.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidParameter(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_informative() {
        let e = Error::invalid("scattering_time must be > 0");
        let msg = format!("{e}");
        assert!(msg.contains("invalid parameter"));
        assert!(msg.contains("scattering_time"));
    }

    #[test]
    fn yaml_errors_convert() {
        let bad: std::result::Result<u32, serde_yaml::Error> = serde_yaml::from_str("[1, 2");
        let e: Error = bad.unwrap_err().into();
        assert!(matches!(e, Error::Yaml(_)));
    }

    #[test]
    fn result_type_alias_compiles() -> Result<()> {
        Ok(())
    }
}
