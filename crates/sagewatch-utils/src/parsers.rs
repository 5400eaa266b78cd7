use crate::errors::{ParseError, Result, UtilsError};

/// Trait for parsing different types of inputs
pub trait Parser<T> {
    type Output;

    fn parse(&self, input: &str) -> Result<Self::Output>;
}

/// Parser for platform error type identifiers.
///
/// The platform reports error codes in several shapes:
/// - `ThrottlingException`
/// - `com.amazonaws.sagemaker#ValidationException`
/// - `ThrottlingException:http://internal.amazon.com/coral/...` (header form)
///
/// All of them reduce to the bare code.
pub struct ErrorTypeParser;

impl Parser<String> for ErrorTypeParser {
    type Output = String;

    fn parse(&self, raw: &str) -> Result<Self::Output> {
        let without_uri = raw.split(':').next().unwrap_or(raw);
        let code = without_uri
            .rsplit('#')
            .next()
            .unwrap_or(without_uri)
            .trim();

        if code.is_empty() {
            return Err(UtilsError::Parse(ParseError::MissingField(
                "error type".to_string(),
            )));
        }

        if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            return Err(UtilsError::Parse(ParseError::InvalidFormat(format!(
                "Invalid error type: {}",
                raw
            ))));
        }

        Ok(code.to_string())
    }
}

// Convenience function
pub fn parse_error_type(raw: &str) -> Result<String> {
    ErrorTypeParser.parse(raw)
}
