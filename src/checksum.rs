use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};

/// Checksum algorithms written as siblings of deployed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumType {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl ChecksumType {
    pub const ALL: [ChecksumType; 4] = [Self::Md5, Self::Sha1, Self::Sha256, Self::Sha512];

    /// File suffix including the leading dot.
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Md5 => ".md5",
            Self::Sha1 => ".sha1",
            Self::Sha256 => ".sha256",
            Self::Sha512 => ".sha512",
        }
    }

    /// Lowercase hex digest of `data`.
    #[must_use]
    pub fn compute(self, data: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data)),
            Self::Sha1 => hex::encode(Sha1::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
        }
    }
}

/// Returns true if the file name carries a checksum suffix.
#[must_use]
pub fn is_checksum_file(name: &str) -> bool {
    ChecksumType::ALL
        .iter()
        .any(|checksum| name.ends_with(checksum.suffix()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        assert_eq!(
            ChecksumType::Md5.compute(b"abc"),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(
            ChecksumType::Sha1.compute(b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            ChecksumType::Sha256.compute(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(ChecksumType::Sha512.compute(b"abc").len(), 128);
    }

    #[test]
    fn test_is_checksum_file() {
        assert!(is_checksum_file("lib-1.0.jar.sha1"));
        assert!(is_checksum_file("maven-metadata.xml.sha512"));
        assert!(!is_checksum_file("lib-1.0.jar"));
    }
}
