//! Validation of submitted input references.
//!
//! Input references are opaque keys naming previously staged images
//! (e.g. files visible to the pipeline upstreams). They are validated
//! for shape only; whether the referenced object exists is the
//! pipeline's problem.

use crate::error::CoreError;

/// Maximum number of input references per submission.
pub const MAX_INPUT_REFS: usize = 64;

/// Maximum length of a single input reference.
const MAX_REF_LEN: usize = 255;

/// Validate a submission's input references.
///
/// Rules:
/// - At least one reference, at most `MAX_INPUT_REFS`.
/// - Each reference must be non-empty and at most `MAX_REF_LEN` characters.
/// - References are relative keys: no leading `/`, no `..` segments.
/// - Only alphanumeric, space, hyphen, underscore, dot, or slash characters.
pub fn validate_input_refs(refs: &[String]) -> Result<(), CoreError> {
    if refs.is_empty() {
        return Err(CoreError::InvalidInput(
            "At least one input reference is required".to_string(),
        ));
    }
    if refs.len() > MAX_INPUT_REFS {
        return Err(CoreError::InvalidInput(format!(
            "A submission may have at most {MAX_INPUT_REFS} input references"
        )));
    }

    for (i, input_ref) in refs.iter().enumerate() {
        if input_ref.is_empty() {
            return Err(CoreError::InvalidInput(format!(
                "Input reference at index {i} must not be empty"
            )));
        }
        if input_ref.len() > MAX_REF_LEN {
            return Err(CoreError::InvalidInput(format!(
                "Input reference at index {i} exceeds {MAX_REF_LEN} characters"
            )));
        }
        if input_ref.starts_with('/') {
            return Err(CoreError::InvalidInput(format!(
                "Input reference at index {i} must be a relative key"
            )));
        }
        if input_ref.split('/').any(|segment| segment == "..") {
            return Err(CoreError::InvalidInput(format!(
                "Input reference at index {i} must not contain '..' segments"
            )));
        }
        if !input_ref
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.' | '/'))
        {
            return Err(CoreError::InvalidInput(format!(
                "Input reference at index {i} contains unsupported characters"
            )));
        }
    }

    Ok(())
}
