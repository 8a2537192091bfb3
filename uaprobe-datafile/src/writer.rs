//! Encoder for data files.
//!
//! Used by tests and benches to build fixtures, and by tooling that compiles
//! signature sets into the binary format.

use std::collections::HashMap;
use std::path::Path;

use bytes::{BufMut, Bytes, BytesMut};
use tracing::debug;

use uaprobe_core::PropertyType;

use crate::format::{Header, CHECKSUM_LEN, FORMAT_MAJOR, FORMAT_MINOR, HEADER_LEN, NO_STRING};

/// Schema position of a property added to a [`DataFileBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PropertyHandle(pub usize);

/// Position of a profile added to a [`DataFileBuilder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProfileHandle(pub usize);

struct PropertyEntry {
    name: String,
    property_type: PropertyType,
    description: Option<String>,
}

struct ProfileEntry {
    profile_id: u32,
    values: Vec<(usize, String)>,
}

struct SignatureEntry {
    profile: usize,
    rank: u32,
    pattern: String,
}

/// Builds a data file in memory.
///
/// Values are written as given; the builder does not check them against
/// property types, so it can also produce files the loader rejects.
pub struct DataFileBuilder {
    header: Header,
    name: String,
    properties: Vec<PropertyEntry>,
    profiles: Vec<ProfileEntry>,
    signatures: Vec<SignatureEntry>,
}

impl DataFileBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            header: Header {
                major: FORMAT_MAJOR,
                minor: FORMAT_MINOR,
                flags: 0,
                published: 0,
                max_user_agent_length: 512,
                default_profile: 0,
            },
            name: name.into(),
            properties: Vec::new(),
            profiles: Vec::new(),
            signatures: Vec::new(),
        }
    }

    pub fn version(&mut self, major: u16, minor: u16) -> &mut Self {
        self.header.major = major;
        self.header.minor = minor;
        self
    }

    pub fn flags(&mut self, flags: u32) -> &mut Self {
        self.header.flags = flags;
        self
    }

    /// Publication time in seconds since the Unix epoch.
    pub fn published(&mut self, secs: u64) -> &mut Self {
        self.header.published = secs;
        self
    }

    pub fn max_user_agent_length(&mut self, len: u32) -> &mut Self {
        self.header.max_user_agent_length = len;
        self
    }

    pub fn property(&mut self, name: impl Into<String>, property_type: PropertyType) -> PropertyHandle {
        self.properties.push(PropertyEntry {
            name: name.into(),
            property_type,
            description: None,
        });
        PropertyHandle(self.properties.len() - 1)
    }

    pub fn property_with_description(
        &mut self,
        name: impl Into<String>,
        property_type: PropertyType,
        description: impl Into<String>,
    ) -> PropertyHandle {
        let handle = self.property(name, property_type);
        self.properties[handle.0].description = Some(description.into());
        handle
    }

    /// Adds a profile. List properties take one entry per item, in order.
    pub fn profile(&mut self, profile_id: u32, values: &[(PropertyHandle, &str)]) -> ProfileHandle {
        self.profiles.push(ProfileEntry {
            profile_id,
            values: values
                .iter()
                .map(|(property, value)| (property.0, (*value).to_owned()))
                .collect(),
        });
        ProfileHandle(self.profiles.len() - 1)
    }

    pub fn default_profile(&mut self, profile: ProfileHandle) -> &mut Self {
        self.header.default_profile = profile.0 as u32;
        self
    }

    /// Adds a signature ranked after every signature added so far.
    pub fn signature(&mut self, profile: ProfileHandle, pattern: impl Into<String>) -> u32 {
        let rank = self.signatures.len() as u32;
        self.signature_with_rank(profile, rank, pattern)
    }

    pub fn signature_with_rank(
        &mut self,
        profile: ProfileHandle,
        rank: u32,
        pattern: impl Into<String>,
    ) -> u32 {
        self.signatures.push(SignatureEntry {
            profile: profile.0,
            rank,
            pattern: pattern.into(),
        });
        (self.signatures.len() - 1) as u32
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    /// Encodes the data set, checksum trailer included.
    pub fn encode(&self) -> Bytes {
        let mut strings = StringPool::default();
        let name = strings.intern(&self.name);
        let properties: Vec<(u32, u8, u32)> = self
            .properties
            .iter()
            .map(|p| {
                let description = p
                    .description
                    .as_deref()
                    .map_or(NO_STRING, |d| strings.intern(d));
                (strings.intern(&p.name), p.property_type as u8, description)
            })
            .collect();
        let profiles: Vec<(u32, Vec<(u32, u32)>)> = self
            .profiles
            .iter()
            .map(|profile| {
                let mut values: Vec<(u32, u32)> = profile
                    .values
                    .iter()
                    .map(|(property, value)| (*property as u32, strings.intern(value)))
                    .collect();
                // stable: list items keep their order
                values.sort_by_key(|(property, _)| *property);
                (profile.profile_id, values)
            })
            .collect();
        let signatures: Vec<(u32, u32, u32)> = self
            .signatures
            .iter()
            .map(|s| (s.profile as u32, s.rank, strings.intern(&s.pattern)))
            .collect();

        let mut out = BytesMut::with_capacity(
            HEADER_LEN + strings.heap.len() + strings.spans.len() * 8 + CHECKSUM_LEN,
        );
        self.header.encode(&mut out);

        out.put_u32_le(strings.spans.len() as u32);
        for (offset, len) in &strings.spans {
            out.put_u32_le(*offset);
            out.put_u32_le(*len);
        }
        out.put_u32_le(strings.heap.len() as u32);
        out.put_slice(strings.heap.as_bytes());

        out.put_u32_le(name);

        out.put_u32_le(properties.len() as u32);
        for (name, tag, description) in properties {
            out.put_u32_le(name);
            out.put_u8(tag);
            out.put_u32_le(description);
        }

        out.put_u32_le(profiles.len() as u32);
        for (profile_id, values) in profiles {
            out.put_u32_le(profile_id);
            out.put_u16_le(values.len() as u16);
            for (property, value) in values {
                out.put_u32_le(property);
                out.put_u32_le(value);
            }
        }

        out.put_u32_le(signatures.len() as u32);
        for (profile, rank, pattern) in signatures {
            out.put_u32_le(profile);
            out.put_u32_le(rank);
            out.put_u32_le(pattern);
        }

        let checksum = blake3::hash(&out);
        out.put_slice(checksum.as_bytes());
        debug!(bytes = out.len(), signatures = self.signatures.len(), "Data file encoded");
        out.freeze()
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        std::fs::write(path, self.encode())
    }
}

#[derive(Default)]
struct StringPool {
    ids: HashMap<String, u32>,
    spans: Vec<(u32, u32)>,
    heap: String,
}

impl StringPool {
    fn intern(&mut self, text: &str) -> u32 {
        if let Some(&id) = self.ids.get(text) {
            return id;
        }
        let id = self.spans.len() as u32;
        self.spans.push((self.heap.len() as u32, text.len() as u32));
        self.heap.push_str(text);
        self.ids.insert(text.to_owned(), id);
        id
    }
}
