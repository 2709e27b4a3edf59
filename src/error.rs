use thiserror::Error;

/// Error taxonomy for the signal core.
///
/// Data/precondition failures and internal scoring failures are local to one
/// (engine, symbol) pair and are never auto-retried. Factory misuse surfaces
/// immediately. Aggregation raises only when every requested engine failed.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Precondition unmet: missing/short market data or absent context
    #[error("insufficient data for {engine} on {symbol}: {details}")]
    InsufficientData {
        engine: String,
        symbol: String,
        details: String,
    },

    /// Internal scoring failure inside one engine
    #[error("scoring failed in {engine} for {symbol}: {details}")]
    ModelPrediction {
        engine: String,
        symbol: String,
        details: String,
    },

    /// Factory lookup of a name nobody registered
    #[error("unknown engine '{name}', registered engines: [{}]", known.join(", "))]
    UnknownEngine { name: String, known: Vec<String> },

    /// Factory misuse at registration time
    #[error("invalid engine registration: {0}")]
    InvalidRegistration(String),

    /// Every engine in an aggregation batch failed
    #[error("all {} engine(s) failed for {symbol}: {}", failures.len(), failures.join("; "))]
    AllEnginesFailed {
        symbol: String,
        failures: Vec<String>,
    },
}

impl EngineError {
    pub fn insufficient_data(
        engine: impl Into<String>,
        symbol: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        EngineError::InsufficientData {
            engine: engine.into(),
            symbol: symbol.into(),
            details: details.into(),
        }
    }

    pub fn model_prediction(
        engine: impl Into<String>,
        symbol: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        EngineError::ModelPrediction {
            engine: engine.into(),
            symbol: symbol.into(),
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_engine_lists_known_keys() {
        let err = EngineError::UnknownEngine {
            name: "missing".to_string(),
            known: vec!["swing".to_string(), "momentum".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("missing"));
        assert!(msg.contains("swing"));
        assert!(msg.contains("momentum"));
    }

    #[test]
    fn test_all_failed_enumerates_messages() {
        let err = EngineError::AllEnginesFailed {
            symbol: "AAPL".to_string(),
            failures: vec!["swing: too short".to_string(), "value: nan".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("swing: too short"));
        assert!(msg.contains("value: nan"));
    }
}
