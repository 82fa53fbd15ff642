//! AWS error translation
//!
//! Maps EC2/STS error codes onto the shared `CloudError` taxonomy so the
//! reconciler never sees provider-specific strings.

use aws_sdk_ec2::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use whitegate_cloud::CloudError;

/// Translate an SDK error into the shared taxonomy.
///
/// Duplicate and not-found permission codes get their own variants; the
/// caller decides whether those are errors at all (authorize treats a
/// duplicate as success).
pub fn translate_sdk_error<E, R>(err: SdkError<E, R>) -> CloudError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    if matches!(err, SdkError::TimeoutError(_)) {
        return CloudError::Timeout(DisplayErrorContext(&err).to_string());
    }

    let code = err.code().map(str::to_string).unwrap_or_default();
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    match code.as_str() {
        "InvalidPermission.Duplicate" => CloudError::DuplicateRule(message),
        "InvalidPermission.NotFound" => CloudError::RuleNotFound(message),
        "InvalidGroup.NotFound" | "InvalidGroupId.Malformed" => {
            CloudError::ResourceNotFound(message)
        }
        "AuthFailure" | "InvalidClientTokenId" | "SignatureDoesNotMatch" | "RequestExpired"
        | "ExpiredToken" => CloudError::AuthenticationFailed(message),
        "UnauthorizedOperation" | "AccessDenied" => CloudError::AuthorizationDenied(message),
        "RequestTimeout" => CloudError::Timeout(message),
        "" => CloudError::ApiError(message),
        _ => CloudError::ApiError(format!("{code}: {message}")),
    }
}
