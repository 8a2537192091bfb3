//! Contiguous string heap shared by every section of a data file.

use crate::error::DataFileError;

pub type StringId = u32;

/// All strings of a data file in one allocation, addressed by id.
///
/// Spans are validated against the heap at load time, so `get` only has to
/// check the id.
#[derive(Debug, Default)]
pub struct StringTable {
    heap: Box<str>,
    spans: Vec<(u32, u32)>,
}

impl StringTable {
    pub(crate) fn new(heap: Box<str>, spans: Vec<(u32, u32)>) -> Result<Self, DataFileError> {
        for (id, &(offset, len)) in spans.iter().enumerate() {
            let start = offset as usize;
            let end = start
                .checked_add(len as usize)
                .filter(|&end| end <= heap.len())
                .ok_or_else(|| {
                    DataFileError::corrupt(format!("string {id} exceeds the string heap"))
                })?;
            if !heap.is_char_boundary(start) || !heap.is_char_boundary(end) {
                return Err(DataFileError::corrupt(format!(
                    "string {id} splits a UTF-8 sequence"
                )));
            }
        }
        Ok(Self { heap, spans })
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Size of the heap in bytes.
    pub fn heap_len(&self) -> usize {
        self.heap.len()
    }

    pub fn get(&self, id: StringId) -> Option<&str> {
        let &(offset, len) = self.spans.get(id as usize)?;
        Some(&self.heap[offset as usize..(offset + len) as usize])
    }

    /// Like `get`, reporting a dangling id as corruption of `what`.
    pub(crate) fn resolve(&self, id: StringId, what: &str) -> Result<&str, DataFileError> {
        self.get(id)
            .ok_or_else(|| DataFileError::corrupt(format!("{what} references missing string {id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_and_resolve() {
        let table = StringTable::new("IsMobileTrue".into(), vec![(0, 8), (8, 4)]).unwrap();
        assert_eq!(table.get(0), Some("IsMobile"));
        assert_eq!(table.get(1), Some("True"));
        assert_eq!(table.get(2), None);
        assert!(matches!(
            table.resolve(7, "property"),
            Err(DataFileError::Corrupt(msg)) if msg.contains("property")
        ));
    }

    #[test]
    fn test_span_out_of_heap() {
        assert!(StringTable::new("abc".into(), vec![(2, 5)]).is_err());
        assert!(StringTable::new("abc".into(), vec![(u32::MAX, 2)]).is_err());
    }

    #[test]
    fn test_span_splitting_utf8() {
        // 'é' is two bytes
        assert!(StringTable::new("é".into(), vec![(0, 1)]).is_err());
        assert!(StringTable::new("é".into(), vec![(0, 2)]).is_ok());
    }
}
