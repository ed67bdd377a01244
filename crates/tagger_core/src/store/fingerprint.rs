//! Name fingerprints used as record addresses.
//!
//! The digest is part of the storage format: changing it orphans every
//! existing record. MD5 is kept for address compatibility only; no
//! cryptographic property is relied upon.

/// Width of a fingerprint in hex characters.
pub const FINGERPRINT_LEN: usize = 32;

/// Returns the lowercase 32-hex MD5 digest of the UTF-8 name bytes.
pub fn digest(name: &str) -> String {
    format!("{:x}", md5::compute(name.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::{digest, FINGERPRINT_LEN};

    #[test]
    fn digest_matches_known_md5_vectors() {
        assert_eq!(digest(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digest("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn digest_is_fixed_width_and_deterministic() {
        let first = digest("/home/user/music/sound.mp3");
        assert_eq!(first.len(), FINGERPRINT_LEN);
        assert_eq!(first, digest("/home/user/music/sound.mp3"));
        assert_ne!(first, digest("/home/user/music/sound.mp4"));
    }

    #[test]
    fn digest_covers_non_ascii_names() {
        let value = digest("musique/été");
        assert_eq!(value.len(), FINGERPRINT_LEN);
        assert!(value.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
