use thiserror::Error;

/// Framing error and warning codes.
///
/// Each code stringifies to a stable identifier so log lines and tests can
/// match on it. Whether a code is delivered through
/// [`handle_error`](crate::Visitor::handle_error) or
/// [`handle_warning`](crate::Visitor::handle_warning) depends on where the
/// framer encountered it; see the per-variant notes.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    #[error("BALSA_NO_ERROR")]
    BalsaNoError,

    #[error("NO_STATUS_LINE_IN_RESPONSE")]
    NoStatusLineInResponse,
    #[error("NO_REQUEST_LINE_IN_REQUEST")]
    NoRequestLineInRequest,
    #[error("FAILED_TO_FIND_WS_AFTER_RESPONSE_VERSION")]
    FailedToFindWsAfterResponseVersion,
    /// Warning: the request line held only a method token.
    #[error("FAILED_TO_FIND_WS_AFTER_REQUEST_METHOD")]
    FailedToFindWsAfterRequestMethod,
    /// Warning: the status line held no reason phrase.
    #[error("FAILED_TO_FIND_WS_AFTER_RESPONSE_STATUSCODE")]
    FailedToFindWsAfterResponseStatuscode,
    /// Warning: the request line held no version token (HTTP/0.9).
    #[error("FAILED_TO_FIND_WS_AFTER_REQUEST_REQUEST_URI")]
    FailedToFindWsAfterRequestRequestUri,
    #[error("FAILED_TO_FIND_NL_AFTER_RESPONSE_REASON_PHRASE")]
    FailedToFindNlAfterResponseReasonPhrase,
    #[error("FAILED_TO_FIND_NL_AFTER_REQUEST_HTTP_VERSION")]
    FailedToFindNlAfterRequestHttpVersion,
    #[error("FAILED_CONVERTING_STATUS_CODE_TO_INT")]
    FailedConvertingStatusCodeToInt,

    #[error("HEADERS_TOO_LONG")]
    HeadersTooLong,
    #[error("UNPARSABLE_CONTENT_LENGTH")]
    UnparsableContentLength,
    #[error("MAYBE_BODY_BUT_NO_CONTENT_LENGTH")]
    MaybeBodyButNoContentLength,
    #[error("REQUIRED_BODY_BUT_NO_CONTENT_LENGTH")]
    RequiredBodyButNoContentLength,
    /// Warning: a header line without a colon is recorded name-only.
    #[error("HEADER_MISSING_COLON")]
    HeaderMissingColon,

    #[error("INVALID_CHUNK_LENGTH")]
    InvalidChunkLength,
    #[error("CHUNK_LENGTH_OVERFLOW")]
    ChunkLengthOverflow,

    #[error("CALLED_BYTES_SPLICED_WHEN_UNSAFE_TO_DO_SO")]
    CalledBytesSplicedWhenUnsafeToDoSo,
    #[error("CALLED_BYTES_SPLICED_AND_EXCEEDED_SAFE_SPLICE_AMOUNT")]
    CalledBytesSplicedAndExceededSafeSpliceAmount,

    #[error("MULTIPLE_CONTENT_LENGTH_KEYS")]
    MultipleContentLengthKeys,
    #[error("MULTIPLE_TRANSFER_ENCODING_KEYS")]
    MultipleTransferEncodingKeys,
    #[error("UNKNOWN_TRANSFER_ENCODING")]
    UnknownTransferEncoding,

    #[error("INVALID_HEADER_FORMAT")]
    InvalidHeaderFormat,
    /// Warning under [`InvalidCharsLevel::Warn`](crate::InvalidCharsLevel),
    /// fatal under `Fatal`.
    #[error("INVALID_HEADER_CHARACTER")]
    InvalidHeaderCharacter,
    #[error("INVALID_HEADER_NAME_CHARACTER")]
    InvalidHeaderNameCharacter,
    #[error("INVALID_TRAILER_FORMAT")]
    InvalidTrailerFormat,
    #[error("INVALID_TRAILER_NAME_CHARACTER")]
    InvalidTrailerNameCharacter,
    #[error("TRAILER_TOO_LONG")]
    TrailerTooLong,
    /// Warning: trailers tolerate colon-less lines.
    #[error("TRAILER_MISSING_COLON")]
    TrailerMissingColon,

    #[error("INTERNAL_LOGIC_ERROR")]
    InternalLogicError,
}

impl Default for ErrorCode {
    fn default() -> Self {
        ErrorCode::BalsaNoError
    }
}
