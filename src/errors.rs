use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("cannot merge metadata key '{key}': {target_kind} in target, {source_kind} in source")]
    MetadataMerge {
        key: String,
        target_kind: &'static str,
        source_kind: &'static str,
    },
    #[error("no active vertex at coordinate {coord}")]
    NotFound { coord: String },
    #[error("failed to decode stored row {id}: {reason}")]
    Decode { id: i64, reason: String },
    #[error("repository error: {0}")]
    Persistence(String),
}

pub type Result<T> = std::result::Result<T, NetworkError>;

macro_rules! validation_err {
    ($($arg:tt)*) => {
        $crate::errors::NetworkError::Validation(format!($($arg)*))
    };
}

pub(crate) use validation_err;

/// Margins and tolerances are distances; anything not strictly positive and finite is rejected.
pub fn ensure_positive_distance(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(validation_err!("{} must be a positive distance, got {}", name, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_distance() {
        assert!(ensure_positive_distance("margin", 0.5).is_ok());
        assert!(matches!(
            ensure_positive_distance("margin", 0.0),
            Err(NetworkError::Validation(_))
        ));
        assert!(ensure_positive_distance("tolerance", -1.0).is_err());
        assert!(ensure_positive_distance("tolerance", f64::NAN).is_err());
        assert!(ensure_positive_distance("tolerance", f64::INFINITY).is_err());
    }

    #[test]
    fn test_merge_error_names_key() {
        let err = NetworkError::MetadataMerge {
            key: "capacity".to_string(),
            target_kind: "number",
            source_kind: "string",
        };
        assert!(err.to_string().contains("'capacity'"));
    }
}
