//! Validation Support
//!
//! Create/update payloads implement [`Validatable`]. Handlers call
//! `payload.validate()?` before touching the database; failures become a
//! `422 Unprocessable Entity` listing every offending field.
//!
//! ```rust,ignore
//! impl Validatable for EquipmentCreate {
//!     fn validate(&self) -> Result<(), ValidationErrors> {
//!         let mut errors = ValidationErrors::new();
//!         errors.check(validators::validate_length("title", &self.title, Some(3), Some(120)));
//!         errors.check(validators::validate_range("price_per_day_cents", self.price_per_day_cents, Some(1), None));
//!         errors.result()
//!     }
//! }
//! ```

use serde::Serialize;
use std::fmt;

/// Validation error with field name and message
#[derive(Debug, Clone, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Collection of validation errors
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Record the error of a single validator, if any
    pub fn check(&mut self, result: Result<(), ValidationError>) {
        if let Err(error) = result {
            self.errors.push(error);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Convert to Result
    ///
    /// # Errors
    /// Returns `self` when at least one error was recorded.
    pub fn result(self) -> Result<(), Self> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed with {} error(s):", self.errors.len())?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Trait for request payloads that can be validated
pub trait Validatable {
    /// Validate the instance, reporting every failing field.
    ///
    /// # Errors
    /// Returns the collected [`ValidationErrors`] when any check fails.
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Helper validators for common patterns
pub mod validators {
    use super::ValidationError;
    use std::fmt;

    /// Validate string length (in characters) is within range
    ///
    /// # Errors
    /// Returns a [`ValidationError`] naming `field` when out of range.
    pub fn validate_length(
        field: &str,
        value: &str,
        min: Option<usize>,
        max: Option<usize>,
    ) -> Result<(), ValidationError> {
        let len = value.chars().count();

        if let Some(min_len) = min
            && len < min_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at least {min_len} characters"),
            ));
        }

        if let Some(max_len) = max
            && len > max_len
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at most {max_len} characters"),
            ));
        }

        Ok(())
    }

    /// Validate number is within range
    ///
    /// # Errors
    /// Returns a [`ValidationError`] naming `field` when out of range.
    pub fn validate_range<T: PartialOrd + fmt::Display>(
        field: &str,
        value: T,
        min: Option<T>,
        max: Option<T>,
    ) -> Result<(), ValidationError> {
        if let Some(min_val) = min
            && value < min_val
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at least {min_val}"),
            ));
        }

        if let Some(max_val) = max
            && value > max_val
        {
            return Err(ValidationError::new(
                field,
                format!("Must be at most {max_val}"),
            ));
        }

        Ok(())
    }

    /// Basic email validation
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when the address is malformed or too long.
    pub fn validate_email(field: &str, value: &str) -> Result<(), ValidationError> {
        let Some((local, domain)) = value.split_once('@') else {
            return Err(ValidationError::new(field, "Invalid email format"));
        };
        if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
        {
            return Err(ValidationError::new(field, "Invalid email format"));
        }

        if value.len() > 255 {
            return Err(ValidationError::new(
                field,
                "Email must be at most 255 characters",
            ));
        }

        Ok(())
    }

    /// Validate value is not blank
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when `value` is empty or whitespace.
    pub fn validate_required(field: &str, value: &str) -> Result<(), ValidationError> {
        if value.trim().is_empty() {
            return Err(ValidationError::new(field, "This field is required"));
        }
        Ok(())
    }

    /// Validate an optional latitude/longitude pair
    ///
    /// # Errors
    /// Returns a [`ValidationError`] when only one coordinate is present or a
    /// coordinate is outside its valid range.
    pub fn validate_coordinates(
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<(), ValidationError> {
        match (latitude, longitude) {
            (None, None) => Ok(()),
            (Some(lat), Some(lng)) => {
                validate_range("latitude", lat, Some(-90.0), Some(90.0))?;
                validate_range("longitude", lng, Some(-180.0), Some(180.0))
            }
            _ => Err(ValidationError::new(
                "latitude",
                "Latitude and longitude must be provided together",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_collection() {
        let mut errors = ValidationErrors::new();
        assert!(errors.is_empty());

        errors.check(Ok(()));
        assert!(errors.is_empty());

        errors.check(Err(ValidationError::new("field1", "error1")));
        errors.add(ValidationError::new("field2", "error2"));
        assert_eq!(errors.len(), 2);
        assert!(errors.result().is_err());
    }

    #[test]
    fn test_validate_length_counts_characters() {
        use validators::validate_length;

        assert!(validate_length("title", "ab", Some(3), None).is_err());
        assert!(validate_length("title", "abcdef", None, Some(5)).is_err());
        assert!(validate_length("title", "abc", Some(3), Some(5)).is_ok());
        // Multi-byte characters count once
        assert!(validate_length("title", "ééé", Some(3), Some(3)).is_ok());
    }

    #[test]
    fn test_validate_range() {
        use validators::validate_range;

        assert!(validate_range("price", 0, Some(1), None).is_err());
        assert!(validate_range("days", 120, None, Some(90)).is_err());
        assert!(validate_range("price", 2500, Some(1), None).is_ok());
    }

    #[test]
    fn test_validate_email() {
        use validators::validate_email;

        assert!(validate_email("email", "invalid").is_err());
        assert!(validate_email("email", "@example.com").is_err());
        assert!(validate_email("email", "hiker@example").is_err());
        assert!(validate_email("email", "hiker@example.com").is_ok());
    }

    #[test]
    fn test_validate_required() {
        use validators::validate_required;

        assert!(validate_required("name", "").is_err());
        assert!(validate_required("name", "   ").is_err());
        assert!(validate_required("name", "Tent").is_ok());
    }

    #[test]
    fn test_validate_coordinates() {
        use validators::validate_coordinates;

        assert!(validate_coordinates(None, None).is_ok());
        assert!(validate_coordinates(Some(46.5), Some(7.9)).is_ok());
        assert!(validate_coordinates(Some(91.0), Some(7.9)).is_err());
        assert!(validate_coordinates(Some(46.5), Some(-181.0)).is_err());
        assert!(validate_coordinates(Some(46.5), None).is_err());
    }
}
