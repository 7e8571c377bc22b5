//! SETTINGS frame entries
//!
//! A SETTINGS frame carries (id, flags, value) triples, sorted by id
//! with at most one entry per id. Entries are stored with canonical
//! ids; the SPDY/2 wire quirk — the 24-bit id serialized with its
//! bytes reversed, a leftover of a little-endian encoder in early
//! clients — is applied only at the wire boundary, so lookups always
//! use the canonical id regardless of version.

use super::fields::{Value, Values};
use super::{Error, Result, FLAG_NONE, FLAG_SETTINGS_PERSISTED, FLAG_SETTINGS_PERSIST_VALUE};
use std::fmt;

/// Defined setting ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SettingId {
    UploadBandwidth = 1,
    DownloadBandwidth = 2,
    RoundTripTime = 3,
    MaxConcurrentStreams = 4,
    CurrentCwnd = 5,
    DownloadRetransRate = 6,
    InitialWindowSize = 7,
    ClientCertificateVectorSize = 8,
}

impl SettingId {
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn from_u32(id: u32) -> Option<SettingId> {
        match id {
            1 => Some(SettingId::UploadBandwidth),
            2 => Some(SettingId::DownloadBandwidth),
            3 => Some(SettingId::RoundTripTime),
            4 => Some(SettingId::MaxConcurrentStreams),
            5 => Some(SettingId::CurrentCwnd),
            6 => Some(SettingId::DownloadRetransRate),
            7 => Some(SettingId::InitialWindowSize),
            8 => Some(SettingId::ClientCertificateVectorSize),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SettingId::UploadBandwidth => "UPLOAD_BANDWIDTH",
            SettingId::DownloadBandwidth => "DOWNLOAD_BANDWIDTH",
            SettingId::RoundTripTime => "ROUND_TRIP_TIME",
            SettingId::MaxConcurrentStreams => "MAX_CONCURRENT_STREAMS",
            SettingId::CurrentCwnd => "CURRENT_CWND",
            SettingId::DownloadRetransRate => "DOWNLOAD_RETRANS_RATE",
            SettingId::InitialWindowSize => "INITIAL_WINDOW_SIZE",
            SettingId::ClientCertificateVectorSize => "CLIENT_CERTIFICATE_VECTOR_SIZE",
        }
    }
}

impl fmt::Display for SettingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.as_u32())
    }
}

/// Reverse the three bytes of a 24-bit setting id.
///
/// This is the SPDY/2 on-wire form; the mapping is its own inverse.
pub fn rotate_setting_id_v2(id: u32) -> u32 {
    ((id & 0xFF) << 16) | (id & 0xFF00) | ((id >> 16) & 0xFF)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SettingEntry {
    id: u32,
    flags: u8,
    value: u32,
}

/// Ordered container of setting entries, keyed by canonical id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingEntries {
    entries: Vec<SettingEntry>,
}

impl SettingEntries {
    pub fn new() -> SettingEntries {
        SettingEntries::default()
    }

    fn search(&self, id: u32) -> std::result::Result<usize, usize> {
        self.entries.binary_search_by(|e| e.id.cmp(&id))
    }

    /// Set an entry. A frame must not carry two values for one id, so
    /// setting an existing id replaces its flags and value.
    pub fn set(&mut self, id: u32, flags: u8, value: u32) -> Result<()> {
        if SettingId::from_u32(id).is_none() {
            return Err(Error::InvalidSettingId(id));
        }
        if flags != FLAG_NONE
            && flags != FLAG_SETTINGS_PERSIST_VALUE
            && flags != FLAG_SETTINGS_PERSISTED
        {
            return Err(Error::InvalidSettingFlags(flags));
        }
        match self.search(id) {
            Ok(i) => {
                self.entries[i].flags = flags;
                self.entries[i].value = value;
            }
            Err(i) => self.entries.insert(i, SettingEntry { id, flags, value }),
        }
        Ok(())
    }

    /// Look up an entry by canonical id.
    pub fn get(&self, id: u32) -> Option<(u8, u32)> {
        let i = self.search(id).ok()?;
        Some((self.entries[i].flags, self.entries[i].value))
    }

    /// All canonical ids, ascending.
    pub fn ids(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Field values for the codec; v2 rotates ids into the quirky
    /// wire form. Entries stay in canonical-id order either way.
    pub(crate) fn to_values(&self, rotate_v2: bool) -> Vec<Vec<Value>> {
        self.entries
            .iter()
            .map(|e| {
                let id = if rotate_v2 {
                    rotate_setting_id_v2(e.id)
                } else {
                    e.id
                };
                vec![
                    Value::Uint(id),
                    Value::Uint(u32::from(e.flags)),
                    Value::Uint(e.value),
                ]
            })
            .collect()
    }

    /// Rebuild from decoded wire entries, undoing the v2 rotation.
    /// Wire values are accepted as-is; range checking belongs to the
    /// constructors, not the decode path.
    pub(crate) fn from_values(
        items: Vec<Vec<Value>>,
        rotate_v2: bool,
        record: &'static str,
    ) -> Result<SettingEntries> {
        let mut entries = SettingEntries::new();
        for item in items {
            let mut values = Values::new(item);
            let raw = values.uint(record)?;
            let id = if rotate_v2 {
                rotate_setting_id_v2(raw)
            } else {
                raw
            };
            let flags = values.uint(record)? as u8;
            let value = values.uint(record)?;
            match entries.search(id) {
                Ok(i) => {
                    entries.entries[i].flags = flags;
                    entries.entries[i].value = value;
                }
                Err(i) => entries.entries.insert(i, SettingEntry { id, flags, value }),
            }
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_known_values() {
        // Canonical 4 goes to the wire as bytes 04 00 00.
        assert_eq!(rotate_setting_id_v2(4), 0x04_00_00);
        assert_eq!(rotate_setting_id_v2(0x04_00_00), 4);
        assert_eq!(rotate_setting_id_v2(7), 0x07_00_00);
        assert_eq!(rotate_setting_id_v2(0x0102_03), 0x0302_01);
    }

    #[test]
    fn test_rotation_is_involution() {
        for id in [1u32, 2, 7, 8, 0x123456, 0xFFFFFF] {
            assert_eq!(rotate_setting_id_v2(rotate_setting_id_v2(id)), id);
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut entries = SettingEntries::new();
        entries.set(4, FLAG_NONE, 100).unwrap();
        entries.set(7, FLAG_SETTINGS_PERSIST_VALUE, 65536).unwrap();
        assert_eq!(entries.get(4), Some((FLAG_NONE, 100)));
        assert_eq!(entries.get(7), Some((FLAG_SETTINGS_PERSIST_VALUE, 65536)));
        assert_eq!(entries.get(2), None);
    }

    #[test]
    fn test_set_replaces_existing_id() {
        let mut entries = SettingEntries::new();
        entries.set(4, FLAG_NONE, 100).unwrap();
        entries.set(4, FLAG_SETTINGS_PERSISTED, 200).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get(4), Some((FLAG_SETTINGS_PERSISTED, 200)));
    }

    #[test]
    fn test_ids_sorted_canonically() {
        let mut entries = SettingEntries::new();
        for id in [7u32, 1, 4, 8, 2] {
            entries.set(id, FLAG_NONE, id * 10).unwrap();
        }
        assert_eq!(entries.ids(), vec![1, 2, 4, 7, 8]);
    }

    #[test]
    fn test_invalid_id_and_flags() {
        let mut entries = SettingEntries::new();
        assert!(matches!(
            entries.set(0, FLAG_NONE, 1),
            Err(Error::InvalidSettingId(0))
        ));
        assert!(matches!(
            entries.set(9, FLAG_NONE, 1),
            Err(Error::InvalidSettingId(9))
        ));
        assert!(matches!(
            entries.set(4, 0x7F, 1),
            Err(Error::InvalidSettingFlags(0x7F))
        ));
    }

    #[test]
    fn test_wire_order_uses_corrected_key_space() {
        let mut entries = SettingEntries::new();
        entries.set(7, FLAG_NONE, 1).unwrap();
        entries.set(4, FLAG_NONE, 2).unwrap();
        let wire = entries.to_values(true);
        // Ascending canonical ids even though the serialized (rotated)
        // ids would sort the other way around in places.
        assert_eq!(wire[0][0], Value::Uint(rotate_setting_id_v2(4)));
        assert_eq!(wire[1][0], Value::Uint(rotate_setting_id_v2(7)));

        let back = SettingEntries::from_values(wire, true, "test").unwrap();
        assert_eq!(back.get(4), Some((FLAG_NONE, 2)));
        assert_eq!(back.get(7), Some((FLAG_NONE, 1)));
    }
}
