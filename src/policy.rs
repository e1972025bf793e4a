/// How strictly header values (and the first line) are checked for control
/// octets.
///
/// Valid value octets are HTAB, CR, LF and `0x20..`; everything else in
/// `0x00..0x1F` plus DEL violates the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidCharsLevel {
    /// No scan at all, no bookkeeping.
    #[default]
    Off,
    /// Warn once per header block and count each offending octet.
    Warn,
    /// Fail the message on the first offending octet.
    Fatal,
}

impl InvalidCharsLevel {
    pub fn is_off(self) -> bool {
        self == InvalidCharsLevel::Off
    }
}

/// Knobs for the lenient/strict trade-offs real traffic forces on a framer.
#[derive(Debug, Clone, Copy)]
pub struct HttpValidationPolicy {
    /// Ignore transfer-encoding values other than `chunked`/`identity`
    /// instead of failing with `UNKNOWN_TRANSFER_ENCODING`.
    pub accept_unknown_te: bool,
    /// Fail a request whose method requires a body (POST/PUT) when neither
    /// Content-Length nor chunked transfer-encoding is present. When false
    /// such requests frame as zero-length.
    pub require_content_length: bool,
    /// Accept obs-fold continuation lines in the header block. Trailers
    /// never accept them.
    pub allow_obs_fold_in_header: bool,
}

impl Default for HttpValidationPolicy {
    fn default() -> Self {
        Self {
            accept_unknown_te: false,
            require_content_length: true,
            allow_obs_fold_in_header: true,
        }
    }
}
