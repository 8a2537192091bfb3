//! Single-pass decoder for the binary data file.
//!
//! The checksum is verified before any section is parsed. Each section is
//! then read once, in file order; signatures are tokenized into the index
//! builder as they are decoded.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Buf;
use tracing::{debug, warn};

use uaprobe_core::{PropertyType, Value};
use uaprobe_detection::{IndexBuilder, IndexOptions, SignatureIndex};

use crate::dataset::{DataFile, LoadOptions, Profile, Property, Signature};
use crate::error::DataFileError;
use crate::format::{Header, CHECKSUM_LEN, HEADER_LEN, NO_STRING};
use crate::strings::{StringId, StringTable};

pub(crate) fn decode(raw: &[u8], options: LoadOptions) -> Result<DataFile, DataFileError> {
    if raw.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(DataFileError::corrupt(format!(
            "file is {} bytes, shorter than header and checksum",
            raw.len()
        )));
    }
    let header = Header::decode(&raw[..HEADER_LEN])?;

    let (body, trailer) = raw.split_at(raw.len() - CHECKSUM_LEN);
    let computed = blake3::hash(body);
    if computed.as_bytes()[..] != trailer[..] {
        warn!(
            expected = %hex::encode(trailer),
            computed = %computed.to_hex(),
            "Data file checksum mismatch"
        );
        return Err(DataFileError::corrupt("checksum mismatch"));
    }
    let mut checksum = [0u8; CHECKSUM_LEN];
    checksum.copy_from_slice(trailer);

    let mut sections = Sections {
        buf: &body[HEADER_LEN..],
    };
    let strings = read_strings(&mut sections)?;
    let mut interner = Interner::new(strings.len());

    let name_id = sections.u32("dataset name")?;
    let name = interner.get(name_id, strings.resolve(name_id, "dataset name")?);

    let properties = read_properties(&mut sections, &strings, &mut interner)?;
    let mut property_lookup = HashMap::with_capacity(properties.len());
    for (i, property) in properties.iter().enumerate() {
        if property_lookup.insert(property.name.clone(), i).is_some() {
            return Err(DataFileError::corrupt(format!(
                "duplicate property '{}'",
                property.name
            )));
        }
    }

    let profiles = read_profiles(&mut sections, &strings, &properties, &mut interner)?;
    if header.default_profile as usize >= profiles.len() {
        return Err(DataFileError::corrupt(format!(
            "default profile {} out of range ({} profiles)",
            header.default_profile,
            profiles.len()
        )));
    }

    let index_options = IndexOptions {
        max_user_agent_length: header.max_user_agent_length as usize,
        nearest_min_token_len: options.nearest_min_token_len,
    };
    let (signatures, index) =
        read_signatures(&mut sections, &strings, profiles.len(), index_options)?;

    if sections.remaining() != 0 {
        return Err(DataFileError::corrupt(format!(
            "{} unexpected bytes after signatures",
            sections.remaining()
        )));
    }

    debug!(
        strings = strings.len(),
        heap_bytes = strings.heap_len(),
        "Data file sections decoded"
    );

    Ok(DataFile {
        header,
        name,
        strings,
        properties,
        property_lookup,
        profiles,
        signatures,
        index,
        checksum,
        load_duration: Duration::ZERO,
    })
}

/// Bounds-checked little-endian reads over the section bytes.
struct Sections<'a> {
    buf: &'a [u8],
}

impl<'a> Sections<'a> {
    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn need(&self, n: usize, what: &str) -> Result<(), DataFileError> {
        if self.buf.remaining() < n {
            return Err(DataFileError::corrupt(format!(
                "truncated {what}: need {n} bytes, {} left",
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    fn u8(&mut self, what: &str) -> Result<u8, DataFileError> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self, what: &str) -> Result<u16, DataFileError> {
        self.need(2, what)?;
        Ok(self.buf.get_u16_le())
    }

    fn u32(&mut self, what: &str) -> Result<u32, DataFileError> {
        self.need(4, what)?;
        Ok(self.buf.get_u32_le())
    }

    fn take(&mut self, n: usize, what: &str) -> Result<&'a [u8], DataFileError> {
        self.need(n, what)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Reads a record count and checks that the records can fit, so a corrupt
    /// count cannot trigger a huge allocation.
    fn count(&mut self, record_len: usize, what: &str) -> Result<usize, DataFileError> {
        let count = self.u32(what)? as usize;
        let bytes = count
            .checked_mul(record_len)
            .ok_or_else(|| DataFileError::corrupt(format!("{what} count overflows")))?;
        self.need(bytes, what)?;
        Ok(count)
    }
}

/// Shares one `Arc<str>` per string id across profiles.
struct Interner {
    cache: Vec<Option<Arc<str>>>,
}

impl Interner {
    fn new(len: usize) -> Self {
        Self {
            cache: vec![None; len],
        }
    }

    /// `id` must already have been resolved against the string table.
    fn get(&mut self, id: StringId, text: &str) -> Arc<str> {
        self.cache[id as usize]
            .get_or_insert_with(|| Arc::from(text))
            .clone()
    }
}

fn read_strings(sections: &mut Sections<'_>) -> Result<StringTable, DataFileError> {
    let count = sections.count(8, "string table")?;
    let mut spans = Vec::with_capacity(count);
    for _ in 0..count {
        let offset = sections.u32("string offset")?;
        let len = sections.u32("string length")?;
        spans.push((offset, len));
    }
    let heap_len = sections.u32("string heap length")? as usize;
    let heap = sections.take(heap_len, "string heap")?;
    let heap = std::str::from_utf8(heap)
        .map_err(|e| DataFileError::corrupt(format!("string heap is not UTF-8: {e}")))?;
    StringTable::new(heap.into(), spans)
}

fn read_properties(
    sections: &mut Sections<'_>,
    strings: &StringTable,
    interner: &mut Interner,
) -> Result<Vec<Property>, DataFileError> {
    let count = sections.count(9, "properties")?;
    let mut properties = Vec::with_capacity(count);
    for i in 0..count {
        let name_id = sections.u32("property name")?;
        let tag = sections.u8("property type")?;
        let description_id = sections.u32("property description")?;

        let name = strings.resolve(name_id, "property name")?;
        if name.is_empty() {
            return Err(DataFileError::corrupt(format!("property {i} has no name")));
        }
        let description = match description_id {
            NO_STRING => None,
            id => Some(interner.get(id, strings.resolve(id, "property description")?)),
        };
        properties.push(Property {
            name: interner.get(name_id, name),
            property_type: PropertyType::try_from(tag)?,
            description,
        });
    }
    Ok(properties)
}

fn read_profiles(
    sections: &mut Sections<'_>,
    strings: &StringTable,
    properties: &[Property],
    interner: &mut Interner,
) -> Result<Vec<Profile>, DataFileError> {
    let count = sections.count(6, "profiles")?;
    if count == 0 {
        return Err(DataFileError::corrupt("data file has no profiles"));
    }
    let mut profiles = Vec::with_capacity(count);
    for _ in 0..count {
        let profile_id = sections.u32("profile id")?;
        let entries = sections.u16("profile value count")? as usize;
        sections.need(entries * 8, "profile values")?;

        let mut values: Vec<(u32, Value)> = Vec::with_capacity(entries);
        let mut list: Option<(u32, Vec<Arc<str>>)> = None;
        let mut last: Option<u32> = None;

        for _ in 0..entries {
            let property = sections.u32("profile property")?;
            let value_id = sections.u32("profile value")?;
            let declared = properties
                .get(property as usize)
                .ok_or_else(|| {
                    DataFileError::corrupt(format!(
                        "profile {profile_id} references missing property {property}"
                    ))
                })?
                .property_type;

            if let Some(prev) = last {
                if property < prev {
                    return Err(DataFileError::corrupt(format!(
                        "profile {profile_id} values are not sorted by property"
                    )));
                }
                if property == prev && declared != PropertyType::List {
                    return Err(DataFileError::corrupt(format!(
                        "profile {profile_id} repeats scalar property {property}"
                    )));
                }
            }
            last = Some(property);

            let raw = strings.resolve(value_id, "profile value")?;
            match declared {
                PropertyType::List => {
                    let item = interner.get(value_id, raw);
                    let continues = matches!(&list, Some((p, _)) if *p == property);
                    if continues {
                        if let Some((_, items)) = list.as_mut() {
                            items.push(item);
                        }
                    } else {
                        flush_list(&mut values, list.take());
                        list = Some((property, vec![item]));
                    }
                }
                PropertyType::String => {
                    flush_list(&mut values, list.take());
                    values.push((property, Value::String(interner.get(value_id, raw))));
                }
                scalar => {
                    flush_list(&mut values, list.take());
                    let value = scalar.parse(raw).map_err(|e| {
                        DataFileError::corrupt(format!("profile {profile_id}: {e}"))
                    })?;
                    values.push((property, value));
                }
            }
        }
        flush_list(&mut values, list.take());
        profiles.push(Profile::new(profile_id, values));
    }
    Ok(profiles)
}

fn flush_list(values: &mut Vec<(u32, Value)>, list: Option<(u32, Vec<Arc<str>>)>) {
    if let Some((property, items)) = list {
        values.push((property, Value::List(items.into())));
    }
}

fn read_signatures(
    sections: &mut Sections<'_>,
    strings: &StringTable,
    profile_count: usize,
    options: IndexOptions,
) -> Result<(Vec<Signature>, SignatureIndex), DataFileError> {
    let count = sections.count(12, "signatures")?;
    let mut signatures = Vec::with_capacity(count);
    let mut builder = IndexBuilder::new(options, count);
    for i in 0..count {
        let profile = sections.u32("signature profile")?;
        let rank = sections.u32("signature rank")?;
        let pattern = sections.u32("signature pattern")?;
        if profile as usize >= profile_count {
            return Err(DataFileError::corrupt(format!(
                "signature {i} references missing profile {profile}"
            )));
        }
        builder.push_signature(strings.resolve(pattern, "signature pattern")?)?;
        signatures.push(Signature {
            profile,
            rank,
            pattern,
        });
    }
    Ok((signatures, builder.build()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{DataFileBuilder, ProfileHandle};
    use bytes::Bytes;

    fn sample() -> DataFileBuilder {
        let mut builder = DataFileBuilder::new("sample");
        let is_mobile = builder.property("IsMobile", PropertyType::Bool);
        let width = builder.property("ScreenPixelsWidth", PropertyType::Integer);
        let langs = builder.property("Languages", PropertyType::List);
        let unknown = builder.profile(0, &[(is_mobile, "False")]);
        let phone = builder.profile(
            17,
            &[
                (langs, "en"),
                (width, "1080"),
                (is_mobile, "True"),
                (langs, "fr"),
            ],
        );
        builder.default_profile(unknown);
        builder.signature(phone, "Mozilla/5.0 (Linux; Android 10; K) Mobile");
        builder
    }

    fn load(bytes: &[u8]) -> Result<DataFile, DataFileError> {
        decode(bytes, LoadOptions::default())
    }

    #[test]
    fn test_decode_sample() {
        let data = load(&sample().encode()).unwrap();
        assert_eq!(data.name(), "sample");
        assert_eq!(data.properties().len(), 3);
        assert_eq!(data.signatures().len(), 1);
        assert_eq!(data.default_profile().profile_id, 0);

        let phone = data.signature_profile(0).unwrap();
        assert_eq!(phone.profile_id, 17);
        let is_mobile = data.property_index("IsMobile").unwrap();
        assert_eq!(phone.value(is_mobile), Some(&Value::Bool(true)));
        let width = data.property_index("ScreenPixelsWidth").unwrap();
        assert_eq!(phone.value(width).and_then(Value::as_i64), Some(1080));
        let langs = data.property_index("Languages").unwrap();
        let items: Vec<&str> = phone
            .value(langs)
            .and_then(Value::as_list)
            .unwrap()
            .iter()
            .map(|s| s.as_ref())
            .collect();
        assert_eq!(items, vec!["en", "fr"]);
        assert_eq!(data.index().signature_count(), 1);
    }

    #[test]
    fn test_checksum_mismatch_is_corrupt() {
        let mut bytes = sample().encode().to_vec();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0xFF;
        let err = load(&bytes).unwrap_err();
        assert!(matches!(err, DataFileError::Corrupt(msg) if msg.contains("checksum")));
    }

    #[test]
    fn test_bad_magic_is_corrupt() {
        let mut bytes = sample().encode().to_vec();
        bytes[0] = b'X';
        assert!(matches!(load(&bytes), Err(DataFileError::Corrupt(msg)) if msg.contains("magic")));
    }

    #[test]
    fn test_truncated_file_is_corrupt() {
        let bytes = sample().encode();
        assert!(matches!(load(&bytes[..20]), Err(DataFileError::Corrupt(_))));
        assert!(matches!(load(&[]), Err(DataFileError::Corrupt(_))));
    }

    #[test]
    fn test_other_major_version_is_incompatible() {
        let mut builder = sample();
        builder.version(4, 0);
        assert!(matches!(
            load(&builder.encode()),
            Err(DataFileError::IncompatibleVersion { major: 4, minor: 0 })
        ));
    }

    #[test]
    fn test_value_of_wrong_type_is_corrupt() {
        let mut builder = DataFileBuilder::new("bad");
        let width = builder.property("ScreenPixelsWidth", PropertyType::Integer);
        builder.profile(3, &[(width, "wide")]);
        let err = load(&builder.encode()).unwrap_err();
        assert!(matches!(err, DataFileError::Corrupt(msg) if msg.contains("profile 3")));
    }

    #[test]
    fn test_dangling_profile_reference_is_corrupt() {
        let mut builder = sample();
        builder.signature(ProfileHandle(42), "Orphan/1.0");
        assert!(matches!(
            load(&builder.encode()),
            Err(DataFileError::Corrupt(msg)) if msg.contains("missing profile 42")
        ));
    }

    #[test]
    fn test_default_profile_out_of_range() {
        let mut builder = sample();
        builder.default_profile(ProfileHandle(9));
        assert!(matches!(load(&builder.encode()), Err(DataFileError::Corrupt(_))));
    }

    #[test]
    fn test_duplicate_property_is_corrupt() {
        let mut builder = sample();
        builder.property("IsMobile", PropertyType::Bool);
        assert!(matches!(
            load(&builder.encode()),
            Err(DataFileError::Corrupt(msg)) if msg.contains("duplicate")
        ));
    }

    #[test]
    fn test_no_profiles_is_corrupt() {
        let builder = DataFileBuilder::new("empty");
        assert!(matches!(load(&builder.encode()), Err(DataFileError::Corrupt(_))));
    }

    #[test]
    fn test_from_bytes_keeps_checksum() {
        let bytes: Bytes = sample().encode();
        let trailer = hex::encode(&bytes[bytes.len() - CHECKSUM_LEN..]);
        let data = DataFile::from_bytes(bytes, LoadOptions::default()).unwrap();
        assert_eq!(data.checksum_hex(), trailer);
    }
}
