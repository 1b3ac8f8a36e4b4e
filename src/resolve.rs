//! Turn command-line encoding arguments into an [`EncodingDescriptor`]

use log::debug;

use crate::codepage::{NO_CODEPAGE, resolve_codepage};
use crate::{ConfigError, EncodingDescriptor, EncodingName};

/// Resolve a symbolic name plus optional codepage or language code.
///
/// Rules are applied in order:
///
/// 1. `name` must be `UTF8`, `UNICODE`, `UNICODE_BE` or `ANSI` (any case);
///    `None` means auto-detect.
/// 2. `explicit_codepage` requires `ANSI`.
/// 3. `language_code` requires `ANSI` and must be in the language table.
/// 4. The resulting codepage must have an installed codec.
///
/// Giving both a codepage and a language code is rejected. No I/O happens
/// here.
pub fn resolve_encoding(
    name: Option<&str>,
    explicit_codepage: Option<u32>,
    language_code: Option<&str>,
) -> Result<EncodingDescriptor, ConfigError> {
    let name = match name {
        Some(token) => token.parse::<EncodingName>()?,
        None => EncodingName::Default,
    };

    if explicit_codepage.is_some() && name != EncodingName::Ansi {
        return Err(ConfigError::CodepageRequiresAnsi { name });
    }
    if language_code.is_some() && name != EncodingName::Ansi {
        return Err(ConfigError::LanguageCodeRequiresAnsi { name });
    }

    let codepage = match (explicit_codepage, language_code) {
        (Some(_), Some(_)) => return Err(ConfigError::ConflictingCodepage),
        (Some(codepage), None) => u16::try_from(codepage)
            .map_err(|_| ConfigError::UnsupportedCodepage { codepage })?,
        (None, Some(code)) => {
            let codepage = resolve_codepage(code);
            if codepage == NO_CODEPAGE {
                return Err(ConfigError::UnknownLanguageCode {
                    code: code.trim().to_string(),
                });
            }
            debug!("Language {} maps to codepage {}", code.trim(), codepage);
            codepage
        }
        (None, None) => return Ok(EncodingDescriptor::from_name(name)),
    };

    EncodingDescriptor::ansi_codepage(codepage)
}
