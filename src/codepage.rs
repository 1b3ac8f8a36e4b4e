//! Codepage lookup tables
//!
//! Two immutable tables live here: the 3-letter language codes accepted by
//! `-inputlan`/`-outputlan`, and the numeric codepages that have an
//! installed codec.

use encoding_rs::{
    BIG5, EUC_JP, EUC_KR, Encoding as Codec, GB18030, GBK, IBM866, ISO_2022_JP, ISO_8859_2,
    ISO_8859_3, ISO_8859_4, ISO_8859_5, ISO_8859_6, ISO_8859_7, ISO_8859_8, ISO_8859_13,
    ISO_8859_15, KOI8_R, KOI8_U, MACINTOSH, SHIFT_JIS, WINDOWS_874, WINDOWS_1250, WINDOWS_1251,
    WINDOWS_1252, WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256, WINDOWS_1257,
    WINDOWS_1258, X_MAC_CYRILLIC,
};

/// Returned by [`resolve_codepage`] for an unrecognized language code
pub const NO_CODEPAGE: u16 = 0;

/// Language code to codepage mapping, grouped by locale family
pub static LANGUAGE_CODEPAGES: &[(&str, u16)] = &[
    // Thai
    ("THA", 874),
    // CJK
    ("JPN", 932),
    ("CHA", 936),
    ("KOR", 949),
    ("CHT", 950),
    // Central European
    ("CRO", 1250),
    ("CZL", 1250),
    ("HUN", 1250),
    ("POL", 1250),
    ("ROM", 1250),
    ("SKL", 1250),
    ("SLO", 1250),
    // Cyrillic
    ("BUL", 1251),
    ("KAZ", 1251),
    ("RUS", 1251),
    // Western European
    ("ANZ", 1252),
    ("BRS", 1252),
    ("DAN", 1252),
    ("NED", 1252),
    ("FIN", 1252),
    ("FRA", 1252),
    ("GER", 1252),
    ("ITA", 1252),
    ("NOR", 1252),
    ("POR", 1252),
    ("ESP", 1252),
    ("SWE", 1252),
    ("ENG", 1252),
    ("AME", 1252),
    // Greek, Turkish, Arabic
    ("GRE", 1253),
    ("TUR", 1254),
    ("ARB", 1256),
    // Baltic
    ("EST", 1257),
    ("LAT", 1257),
    ("LIT", 1257),
];

/// Every codepage [`codec_for_codepage`] knows about
pub const INSTALLED_CODEPAGES: &[u16] = &[
    866, 874, 932, 936, 949, 950, 1250, 1251, 1252, 1253, 1254, 1255, 1256, 1257, 1258, 10000,
    10007, 20866, 20932, 21866, 28592, 28593, 28594, 28595, 28596, 28597, 28598, 28603, 28605,
    50220, 51932, 54936,
];

/// Map a 3-letter language code to its codepage.
///
/// The code is trimmed and matched case-insensitively. Unknown codes yield
/// [`NO_CODEPAGE`], which callers must check for.
pub fn resolve_codepage(language_code: &str) -> u16 {
    let code = language_code.trim();
    LANGUAGE_CODEPAGES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map_or(NO_CODEPAGE, |&(_, codepage)| codepage)
}

/// Codec implementing a numeric (Windows) codepage, if one is installed
pub fn codec_for_codepage(codepage: u16) -> Option<&'static Codec> {
    let codec = match codepage {
        866 => IBM866,
        874 => WINDOWS_874,
        932 => SHIFT_JIS,
        936 => GBK,
        949 => EUC_KR,
        950 => BIG5,
        1250 => WINDOWS_1250,
        1251 => WINDOWS_1251,
        1252 => WINDOWS_1252,
        1253 => WINDOWS_1253,
        1254 => WINDOWS_1254,
        1255 => WINDOWS_1255,
        1256 => WINDOWS_1256,
        1257 => WINDOWS_1257,
        1258 => WINDOWS_1258,
        10000 => MACINTOSH,
        10007 => X_MAC_CYRILLIC,
        20866 => KOI8_R,
        21866 => KOI8_U,
        20932 | 51932 => EUC_JP,
        28592 => ISO_8859_2,
        28593 => ISO_8859_3,
        28594 => ISO_8859_4,
        28595 => ISO_8859_5,
        28596 => ISO_8859_6,
        28597 => ISO_8859_7,
        28598 => ISO_8859_8,
        28603 => ISO_8859_13,
        28605 => ISO_8859_15,
        50220 => ISO_2022_JP,
        54936 => GB18030,
        _ => return None,
    };
    Some(codec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_groups() {
        assert_eq!(resolve_codepage("THA"), 874);
        assert_eq!(resolve_codepage("JPN"), 932);
        assert_eq!(resolve_codepage("CHA"), 936);
        assert_eq!(resolve_codepage("KOR"), 949);
        assert_eq!(resolve_codepage("CHT"), 950);
        assert_eq!(resolve_codepage("POL"), 1250);
        assert_eq!(resolve_codepage("RUS"), 1251);
        assert_eq!(resolve_codepage("ENG"), 1252);
        assert_eq!(resolve_codepage("AME"), 1252);
        assert_eq!(resolve_codepage("GRE"), 1253);
        assert_eq!(resolve_codepage("TUR"), 1254);
        assert_eq!(resolve_codepage("ARB"), 1256);
        assert_eq!(resolve_codepage("LIT"), 1257);
    }

    #[test]
    fn test_case_and_whitespace() {
        assert_eq!(resolve_codepage("eng"), 1252);
        assert_eq!(resolve_codepage("  Ger \t"), 1252);
        assert_eq!(resolve_codepage("kAz"), 1251);
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(resolve_codepage("XXX"), NO_CODEPAGE);
        assert_eq!(resolve_codepage(""), NO_CODEPAGE);
        assert_eq!(resolve_codepage("ENGL"), NO_CODEPAGE);
    }

    #[test]
    fn test_table_is_well_formed() {
        for (i, &(code, codepage)) in LANGUAGE_CODEPAGES.iter().enumerate() {
            assert_eq!(code.len(), 3, "{code}");
            assert!(code.chars().all(|c| c.is_ascii_uppercase()), "{code}");
            assert_ne!(codepage, NO_CODEPAGE);
            assert!(
                LANGUAGE_CODEPAGES[..i].iter().all(|&(other, _)| other != code),
                "duplicate code {code}"
            );
            assert_eq!(resolve_codepage(code), codepage);
        }
    }

    #[test]
    fn test_every_language_codepage_is_installed() {
        for &(code, codepage) in LANGUAGE_CODEPAGES {
            assert!(
                codec_for_codepage(codepage).is_some(),
                "{code} maps to uninstalled codepage {codepage}"
            );
        }
    }

    #[test]
    fn test_installed_list_matches_lookup() {
        for &codepage in INSTALLED_CODEPAGES {
            assert!(codec_for_codepage(codepage).is_some(), "{codepage}");
        }
        assert!(codec_for_codepage(NO_CODEPAGE).is_none());
        assert!(codec_for_codepage(65001).is_none());
        assert!(codec_for_codepage(1200).is_none());
        assert!(codec_for_codepage(37).is_none());
    }

    #[test]
    fn test_codec_identity() {
        assert_eq!(codec_for_codepage(1252), Some(WINDOWS_1252));
        assert_eq!(codec_for_codepage(932), Some(SHIFT_JIS));
        assert_eq!(codec_for_codepage(20932), codec_for_codepage(51932));
    }
}
