//! Validation of `AcrDeployment` specs.
//!
//! A spec that fails validation is a permanent error: no amount of retrying
//! will make it reconcile until the user corrects it.

use std::fmt;

use crate::resource::{AcrDeploymentSpec, ImageReference};

/// Minimum length of an Azure Container Registry name.
pub const REGISTRY_NAME_MIN_LEN: usize = 5;

/// Maximum length of an Azure Container Registry name.
pub const REGISTRY_NAME_MAX_LEN: usize = 50;

const TAG_MAX_LEN: usize = 128;

/// A single validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path that failed validation (e.g. `spec.registryIdentifier`).
    pub field: String,
    /// A human-readable description of the validation failure.
    pub message: String,
    /// The kind of validation that failed.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Creates a validation error for a required field that is missing.
    pub fn required(field: impl Into<String>) -> Self {
        let field = field.into();
        Self {
            message: format!("'{field}' is required but was not provided"),
            field,
            kind: ValidationErrorKind::Required,
        }
    }

    /// Creates a validation error for an invalid format.
    pub fn format(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind: ValidationErrorKind::Format,
        }
    }

    /// Creates a validation error for a value out of range.
    pub fn range(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            kind: ValidationErrorKind::Range,
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// The category of validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValidationErrorKind {
    /// A required field was not provided.
    Required,
    /// The value format is invalid.
    Format,
    /// The value length is outside the allowed range.
    Range,
}

/// All validation failures found in one value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<ValidationError>,
}

impl ValidationErrors {
    /// Creates an empty collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a validation error.
    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Returns true if there are no validation errors.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of validation errors.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.errors.len()
    }

    /// Returns an iterator over the validation errors.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.errors.iter()
    }

    fn into_result(self) -> Result<(), Self> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl FromIterator<ValidationError> for ValidationErrors {
    fn from_iter<T: IntoIterator<Item = ValidationError>>(iter: T) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

/// Types that can check their own constraints.
pub trait Validate {
    /// Validates this instance and returns every failure found.
    ///
    /// # Errors
    ///
    /// Returns `ValidationErrors` containing all validation failures.
    fn validate(&self) -> Result<(), ValidationErrors>;

    /// Returns true if this instance is valid.
    fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl Validate for AcrDeploymentSpec {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        validate_registry_identifier(&self.registry_identifier, &mut errors);

        if let Some(ref image) = self.image {
            validate_image(image, &mut errors);
        }

        if let Err(e) = self.workload_deployment() {
            errors.add(ValidationError::format("spec.workloadTemplate", e.to_string()));
        }

        errors.into_result()
    }
}

fn validate_registry_identifier(identifier: &str, errors: &mut ValidationErrors) {
    const FIELD: &str = "spec.registryIdentifier";

    if identifier.is_empty() {
        errors.add(ValidationError::required(FIELD));
        return;
    }
    if !identifier.chars().all(|c| c.is_ascii_alphanumeric()) {
        errors.add(ValidationError::format(
            FIELD,
            format!("'{identifier}' may only contain letters and digits"),
        ));
    }
    if !(REGISTRY_NAME_MIN_LEN..=REGISTRY_NAME_MAX_LEN).contains(&identifier.len()) {
        errors.add(ValidationError::range(
            FIELD,
            format!(
                "length must be between {REGISTRY_NAME_MIN_LEN} and {REGISTRY_NAME_MAX_LEN} characters"
            ),
        ));
    }
}

fn validate_image(image: &ImageReference, errors: &mut ValidationErrors) {
    if image.repository.is_empty() {
        errors.add(ValidationError::required("spec.image.repository"));
    } else if !image
        .repository
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-' | '/'))
        || image.repository.starts_with('/')
        || image.repository.ends_with('/')
    {
        errors.add(ValidationError::format(
            "spec.image.repository",
            format!("'{}' is not a valid repository path", image.repository),
        ));
    }

    if let Some(ref tag) = image.tag {
        let well_formed = !tag.starts_with(['.', '-'])
            && tag
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
        if tag.is_empty() || tag.len() > TAG_MAX_LEN {
            errors.add(ValidationError::range(
                "spec.image.tag",
                format!("length must be between 1 and {TAG_MAX_LEN} characters"),
            ));
        } else if !well_formed {
            errors.add(ValidationError::format(
                "spec.image.tag",
                format!("'{tag}' is not a valid tag"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_valid_spec() {
        let spec = AcrDeploymentSpec::new("myregistry")
            .with_image(ImageReference::new("storefront/web").with_tag("v1.4.2"));
        assert!(spec.is_valid());
    }

    #[test]
    fn test_empty_identifier_is_required() {
        let errors = AcrDeploymentSpec::new("").validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        let error = errors.iter().next().unwrap();
        assert_eq!(error.field, "spec.registryIdentifier");
        assert_eq!(error.kind, ValidationErrorKind::Required);
    }

    #[test]
    fn test_identifier_rejects_dots_and_dashes() {
        for bad in ["my.registry", "my-registry", "evil.com/x", "reg istry"] {
            let errors = AcrDeploymentSpec::new(bad).validate().unwrap_err();
            assert!(
                errors.iter().any(|e| e.kind == ValidationErrorKind::Format),
                "expected format error for {bad}"
            );
        }
    }

    #[test]
    fn test_identifier_length_bounds() {
        assert!(!AcrDeploymentSpec::new("abcd").is_valid());
        assert!(AcrDeploymentSpec::new("abcde").is_valid());
        assert!(AcrDeploymentSpec::new("a".repeat(REGISTRY_NAME_MAX_LEN)).is_valid());
        assert!(!AcrDeploymentSpec::new("a".repeat(REGISTRY_NAME_MAX_LEN + 1)).is_valid());
    }

    #[test]
    fn test_image_validation() {
        let upper = AcrDeploymentSpec::new("myregistry").with_image(ImageReference::new("Web"));
        assert!(!upper.is_valid());

        let bad_tag = AcrDeploymentSpec::new("myregistry")
            .with_image(ImageReference::new("web").with_tag("-dev"));
        assert!(!bad_tag.is_valid());

        let empty_tag = AcrDeploymentSpec::new("myregistry")
            .with_image(ImageReference::new("web").with_tag(""));
        let errors = empty_tag.validate().unwrap_err();
        assert_eq!(errors.iter().next().unwrap().kind, ValidationErrorKind::Range);
    }

    #[test]
    fn test_workload_template_validation() {
        let spec = AcrDeploymentSpec::new("myregistry")
            .with_workload_template(json!({ "metadata": { "name": 7 } }));
        let errors = spec.validate().unwrap_err();
        assert_eq!(errors.iter().next().unwrap().field, "spec.workloadTemplate");
    }

    #[test]
    fn test_errors_collect_every_failure() {
        let spec = AcrDeploymentSpec::new("a.b")
            .with_image(ImageReference::new(""));
        let errors = spec.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        let display = errors.to_string();
        assert!(display.contains("spec.registryIdentifier"));
        assert!(display.contains("spec.image.repository"));
    }
}
