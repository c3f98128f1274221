use retouch_core::{
    Dimensions, OperationRequest, PipelineError, PipelineLimits, SelectedFile, ValidationFailure,
};

use crate::image::{probe_dimensions, verify_decodes};

/// Pre-upload file and form checker
///
/// Rules run in a fixed order and the first one that fails is the one reported:
/// presence, content type, byte size, pixel dimensions, then the operation's required
/// fields. Nothing here modifies the file.
#[derive(Debug, Clone)]
pub struct FileConstraintChecker {
    max_file_size: usize,
    max_width: u32,
    max_height: u32,
    allowed_content_types: Vec<String>,
}

/// Lowercased MIME essence with parameters stripped.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_lowercase()
}

impl FileConstraintChecker {
    pub fn new(
        max_file_size: usize,
        max_width: u32,
        max_height: u32,
        allowed_content_types: Vec<String>,
    ) -> Self {
        Self {
            max_file_size,
            max_width,
            max_height,
            allowed_content_types: allowed_content_types
                .iter()
                .map(String::as_str)
                .map(essence)
                .collect(),
        }
    }

    pub fn from_limits(limits: &PipelineLimits) -> Self {
        Self::new(
            limits.max_file_size_bytes,
            limits.max_width,
            limits.max_height,
            limits.allowed_content_types.clone(),
        )
    }

    pub fn validate_presence<'a>(
        &self,
        file: Option<&'a SelectedFile>,
    ) -> Result<&'a SelectedFile, ValidationFailure> {
        file.ok_or(ValidationFailure::NoFile)
    }

    /// Validate content type (case insensitive, parameters ignored)
    pub fn validate_content_type(&self, content_type: &str) -> Result<(), ValidationFailure> {
        let normalized = essence(content_type);

        if !self
            .allowed_content_types
            .iter()
            .any(|ct| ct == &normalized)
        {
            return Err(ValidationFailure::DisallowedType {
                content_type: content_type.to_string(),
                allowed: self.allowed_content_types.clone(),
            });
        }

        Ok(())
    }

    /// Validate file size. The limit itself is allowed.
    pub fn validate_file_size(&self, size: usize) -> Result<(), ValidationFailure> {
        if size > self.max_file_size {
            return Err(ValidationFailure::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        Ok(())
    }

    pub fn validate_dimensions(&self, dims: Dimensions) -> Result<(), ValidationFailure> {
        if !dims.fits_within(self.max_width, self.max_height) {
            return Err(ValidationFailure::DimensionsTooLarge {
                width: dims.width,
                height: dims.height,
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }

        Ok(())
    }

    /// Every required field must be present and non-blank, and every supplied
    /// declared field must parse as its kind.
    pub fn validate_fields(&self, request: &OperationRequest) -> Result<(), ValidationFailure> {
        for spec in request.operation.required_fields() {
            let present = request
                .value(spec.name)
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false);
            if !present {
                return Err(ValidationFailure::MissingField {
                    field: spec.name.to_string(),
                });
            }
        }

        for spec in request.operation.fields() {
            let Some(raw) = request.value(spec.name).filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            spec.check(raw)
                .map_err(|reason| ValidationFailure::InvalidField {
                    field: spec.name.to_string(),
                    reason,
                })?;
        }

        Ok(())
    }

    /// Run all rules and return the probed dimensions of the accepted file.
    ///
    /// Dimensions come from the image header, so an oversized image is rejected before
    /// any pixel data is decoded. A file whose bytes cannot be decoded fails with
    /// [`PipelineError::Decode`], not a validation failure.
    pub async fn check(
        &self,
        file: Option<&SelectedFile>,
        request: &OperationRequest,
    ) -> Result<Dimensions, PipelineError> {
        let file = self.validate_presence(file)?;
        self.validate_content_type(file.content_type())?;
        self.validate_file_size(file.size())?;

        let dims = probe_dimensions(file)?;
        self.validate_dimensions(dims)?;
        verify_decodes(file).await?;
        self.validate_fields(request)?;

        tracing::debug!(
            file = %file.name(),
            size = file.size(),
            dimensions = %dims,
            operation = %request.operation,
            "File passed pre-upload checks"
        );

        Ok(dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use retouch_core::OperationKey;
    use std::io::Cursor;

    fn test_checker() -> FileConstraintChecker {
        FileConstraintChecker::new(
            1024 * 1024, // 1MB
            200,
            100,
            vec!["image/jpeg".to_string(), "image/png".to_string()],
        )
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([1, 2, 3]));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    /// Gradient PNG cut in half: the header is intact, the pixel data is not.
    fn truncated_png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x ^ y) % 256) as u8])
        });
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer.truncate(buffer.len() / 2);
        buffer
    }

    fn gray() -> OperationRequest {
        OperationRequest::new(OperationKey::Cgray)
    }

    #[test]
    fn test_validate_file_size_ok() {
        let checker = test_checker();
        assert!(checker.validate_file_size(512 * 1024).is_ok());
        assert!(checker.validate_file_size(1024 * 1024).is_ok());
    }

    #[test]
    fn test_validate_file_size_too_large() {
        let checker = test_checker();
        assert_eq!(
            checker.validate_file_size(1024 * 1024 + 1),
            Err(ValidationFailure::FileTooLarge {
                size: 1024 * 1024 + 1,
                max: 1024 * 1024
            })
        );
    }

    #[test]
    fn test_validate_content_type_ok() {
        let checker = test_checker();
        assert!(checker.validate_content_type("image/jpeg").is_ok());
        assert!(checker.validate_content_type("IMAGE/PNG").is_ok()); // case insensitive
        assert!(checker
            .validate_content_type("image/png; charset=binary")
            .is_ok());
    }

    #[test]
    fn test_allowed_types_are_normalized() {
        let checker = FileConstraintChecker::new(10, 10, 10, vec![" Image/PNG; q=1".to_string()]);
        assert!(checker.validate_content_type("image/png").is_ok());
    }

    #[test]
    fn test_validate_content_type_invalid() {
        let checker = test_checker();
        assert!(matches!(
            checker.validate_content_type("image/gif"),
            Err(ValidationFailure::DisallowedType { .. })
        ));
        assert!(checker.validate_content_type("text/plain").is_err());
    }

    #[test]
    fn test_validate_dimensions_boundaries() {
        let checker = test_checker();
        assert!(checker.validate_dimensions(Dimensions::new(200, 100)).is_ok());
        assert!(checker.validate_dimensions(Dimensions::new(201, 100)).is_err());
        assert!(checker.validate_dimensions(Dimensions::new(200, 101)).is_err());
    }

    #[test]
    fn test_validate_fields_missing() {
        let checker = test_checker();
        let request = OperationRequest::new(OperationKey::Resize).with_field("width", "100");
        assert_eq!(
            checker.validate_fields(&request),
            Err(ValidationFailure::MissingField {
                field: "height".to_string()
            })
        );

        let blank = OperationRequest::new(OperationKey::Rotate).with_field("angle", "   ");
        assert!(matches!(
            checker.validate_fields(&blank),
            Err(ValidationFailure::MissingField { .. })
        ));
    }

    #[test]
    fn test_validate_fields_invalid_value() {
        let checker = test_checker();
        let request = OperationRequest::new(OperationKey::Flip).with_field("flipDirection", "sideways");
        assert!(matches!(
            checker.validate_fields(&request),
            Err(ValidationFailure::InvalidField { field, .. }) if field == "flipDirection"
        ));
    }

    #[test]
    fn test_validate_fields_none_required() {
        assert!(test_checker().validate_fields(&gray()).is_ok());
    }

    #[tokio::test]
    async fn test_check_ok_returns_dimensions() {
        let file = SelectedFile::new("ok.png", "image/png", png(50, 50));
        let dims = test_checker().check(Some(&file), &gray()).await.unwrap();
        assert_eq!(dims, Dimensions::new(50, 50));
    }

    #[tokio::test]
    async fn test_check_no_file() {
        let result = test_checker().check(None, &gray()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Validation(ValidationFailure::NoFile))
        ));
    }

    #[tokio::test]
    async fn test_check_type_reported_before_size() {
        let checker = FileConstraintChecker::new(10, 200, 100, vec!["image/png".to_string()]);
        let file = SelectedFile::new("notes.txt", "text/plain", vec![b'a'; 100]);
        let result = checker.check(Some(&file), &gray()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Validation(ValidationFailure::DisallowedType { .. }))
        ));
    }

    #[tokio::test]
    async fn test_check_size_reported_before_fields() {
        let checker = FileConstraintChecker::new(10, 200, 100, vec!["image/png".to_string()]);
        let file = SelectedFile::new("big.png", "image/png", png(10, 10));
        let request = OperationRequest::new(OperationKey::Rotate);
        let result = checker.check(Some(&file), &request).await;
        assert!(matches!(
            result,
            Err(PipelineError::Validation(ValidationFailure::FileTooLarge { .. }))
        ));
    }

    #[tokio::test]
    async fn test_check_dimensions_too_large() {
        let file = SelectedFile::new("wide.png", "image/png", png(201, 10));
        let result = test_checker().check(Some(&file), &gray()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Validation(ValidationFailure::DimensionsTooLarge {
                width: 201,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_check_missing_field_last() {
        let file = SelectedFile::new("ok.png", "image/png", png(20, 20));
        let request = OperationRequest::new(OperationKey::Crop)
            .with_field("x", "0")
            .with_field("y", "0")
            .with_field("width", "10");
        let result = test_checker().check(Some(&file), &request).await;
        assert!(matches!(
            result,
            Err(PipelineError::Validation(ValidationFailure::MissingField { field })) if field == "height"
        ));
    }

    #[tokio::test]
    async fn test_check_empty_file_is_decode_failure() {
        let file = SelectedFile::new("empty.png", "image/png", Vec::new());
        let result = test_checker().check(Some(&file), &gray()).await;
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }

    #[tokio::test]
    async fn test_check_dimensions_read_from_header_before_decode() {
        // Undecodable body, but the header alone is enough to reject the size.
        let file = SelectedFile::new("huge.png", "image/png", truncated_png(500, 10));
        let result = test_checker().check(Some(&file), &gray()).await;
        assert!(matches!(
            result,
            Err(PipelineError::Validation(ValidationFailure::DimensionsTooLarge {
                width: 500,
                height: 10,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_check_truncated_body_within_limits_is_decode_failure() {
        let file = SelectedFile::new("cut.png", "image/png", truncated_png(150, 80));
        let result = test_checker().check(Some(&file), &gray()).await;
        assert!(matches!(result, Err(PipelineError::Decode(_))));
    }
}
