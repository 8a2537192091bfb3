//! On-disk constants and the fixed-size header.

use bytes::{Buf, BufMut};

use crate::error::DataFileError;

pub const MAGIC: [u8; 4] = *b"UAPD";
pub const FORMAT_MAJOR: u16 = 3;
pub const FORMAT_MINOR: u16 = 2;

pub const HEADER_LEN: usize = 28;
pub const CHECKSUM_LEN: usize = 32;

/// Marks an absent optional string reference.
pub const NO_STRING: u32 = u32::MAX;

/// Upper bound accepted for `max_user_agent_length`.
pub const MAX_USER_AGENT_LENGTH_LIMIT: u32 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub major: u16,
    pub minor: u16,
    pub flags: u32,
    /// Seconds since the Unix epoch.
    pub published: u64,
    pub max_user_agent_length: u32,
    pub default_profile: u32,
}

impl Header {
    /// Reads and checks magic and version. `buf` must hold `HEADER_LEN` bytes.
    pub(crate) fn decode(mut buf: &[u8]) -> Result<Self, DataFileError> {
        if buf.len() < HEADER_LEN {
            return Err(DataFileError::corrupt("truncated header"));
        }
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(DataFileError::corrupt(format!(
                "bad magic {}",
                hex::encode(magic)
            )));
        }

        let major = buf.get_u16_le();
        let minor = buf.get_u16_le();
        if major != FORMAT_MAJOR || minor > FORMAT_MINOR {
            return Err(DataFileError::IncompatibleVersion { major, minor });
        }

        let header = Header {
            major,
            minor,
            flags: buf.get_u32_le(),
            published: buf.get_u64_le(),
            max_user_agent_length: buf.get_u32_le(),
            default_profile: buf.get_u32_le(),
        };
        if header.max_user_agent_length == 0
            || header.max_user_agent_length > MAX_USER_AGENT_LENGTH_LIMIT
        {
            return Err(DataFileError::corrupt(format!(
                "max user agent length {} out of range",
                header.max_user_agent_length
            )));
        }
        Ok(header)
    }

    pub(crate) fn encode(&self, out: &mut impl BufMut) {
        out.put_slice(&MAGIC);
        out.put_u16_le(self.major);
        out.put_u16_le(self.minor);
        out.put_u32_le(self.flags);
        out.put_u64_le(self.published);
        out.put_u32_le(self.max_user_agent_length);
        out.put_u32_le(self.default_profile);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> Header {
        Header {
            major: FORMAT_MAJOR,
            minor: FORMAT_MINOR,
            flags: 0,
            published: 1_700_000_000,
            max_user_agent_length: 512,
            default_profile: 0,
        }
    }

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        header().encode(&mut buf);
        assert_eq!(buf.len(), HEADER_LEN);
        assert_eq!(&buf[..4], b"UAPD");
        assert_eq!(Header::decode(&buf).unwrap(), header());
    }

    #[test]
    fn test_older_minor_accepted_newer_rejected() {
        let mut older = Vec::new();
        Header { minor: 0, ..header() }.encode(&mut older);
        assert!(Header::decode(&older).is_ok());

        let mut newer = Vec::new();
        Header { minor: FORMAT_MINOR + 1, ..header() }.encode(&mut newer);
        assert!(matches!(
            Header::decode(&newer),
            Err(DataFileError::IncompatibleVersion { minor, .. }) if minor == FORMAT_MINOR + 1
        ));
    }

    #[test]
    fn test_zero_user_agent_length_is_corrupt() {
        let mut buf = Vec::new();
        Header { max_user_agent_length: 0, ..header() }.encode(&mut buf);
        assert!(matches!(Header::decode(&buf), Err(DataFileError::Corrupt(_))));
    }
}
