// ❌ Load Errors - conditions that abort a pipeline run
//
// Only identity-breaking problems are fatal. Everything else the loader,
// resolver and engine run into is a warning (see warnings.rs).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    /// The same hierarchical code appears twice in the canonical source.
    /// Parent lookup is by exact code, so the whole tree becomes ambiguous.
    #[error("duplicate code {code} appears twice in canonical source (rows {first} and {second})")]
    DuplicateCode {
        code: String,
        first: usize,
        second: usize,
    },

    #[error("failed to read {source_name}: {source}")]
    Io {
        source_name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse JSON from {source_name}: {source}")]
    Json {
        source_name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to parse CSV line {line} in {source_name}: {source}")]
    Csv {
        source_name: String,
        line: usize,
        #[source]
        source: csv::Error,
    },

    /// The document parsed but does not have the expected shape.
    #[error("{source_name} is not a valid {expected}: {detail}")]
    Format {
        source_name: String,
        expected: &'static str,
        detail: String,
    },

    #[error("could not detect source type from filename: {0}")]
    UnknownSource(String),
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_code_message_names_code_and_rule() {
        let err = LoadError::DuplicateCode {
            code: "B".to_string(),
            first: 1,
            second: 7,
        };

        assert_eq!(
            err.to_string(),
            "duplicate code B appears twice in canonical source (rows 1 and 7)"
        );
    }
}
