use dicom_core::VR;

/// Maximum number of characters allowed in a single Short String (SH) value.
pub(crate) const SH_MAX_LENGTH: usize = 16;

/// Maximum length (in characters) of a single value of the given VR, if the standard bounds it
/// and the value has to be repaired when too long.
pub(crate) fn max_length(vr: VR) -> Option<usize> {
    match vr {
        VR::SH => Some(SH_MAX_LENGTH),
        _ => None,
    }
}

pub(crate) fn truncate_to(n: usize, s: &str) -> String {
    s.chars().take(n).collect()
}

/// Strip the padding DICOM allows at the end of string values.
pub(crate) fn trim_padding(s: &str) -> &str {
    s.trim_end_matches([' ', '\0'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_length_sh() {
        assert_eq!(max_length(VR::SH), Some(16));
    }

    #[test]
    fn test_max_length_unbounded() {
        assert_eq!(max_length(VR::LO), None);
        assert_eq!(max_length(VR::UI), None);
        assert_eq!(max_length(VR::SQ), None);
    }

    #[test]
    fn test_truncate_to_empty_string() {
        let truncated = truncate_to(5, "");
        assert!(truncated.is_empty());
    }

    #[test]
    fn test_truncate_to() {
        let truncated = truncate_to(3, "12345");
        assert_eq!(truncated, "123");
    }

    #[test]
    fn test_truncate_to_counts_characters() {
        let truncated = truncate_to(2, "äöü");
        assert_eq!(truncated, "äö");
    }

    #[test]
    fn test_trim_padding() {
        assert_eq!(trim_padding("1.2.3\0"), "1.2.3");
        assert_eq!(trim_padding("ABC "), "ABC");
        assert_eq!(trim_padding(" ABC"), " ABC");
    }
}
