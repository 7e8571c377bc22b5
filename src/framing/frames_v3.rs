//! Version 3 control frames
//!
//! The layouts track version 2 with three differences: 32-bit header
//! block length prefixes, a wider 3-bit priority plus a credential
//! slot byte on SYN_STREAM, and a status code on GOAWAY. WINDOW_UPDATE
//! exists only here.

use super::fields::{Field, Record, Schema, Value, Values};
use super::frames_v2::SETTING_ENTRY_V2;
use super::header_block::HeaderBlock;
use super::settings::SettingEntries;
use super::{
    Error, GoAwayStatus, Result, StatusCode, FLAG_FIN, FLAG_NONE, FLAG_SETTINGS_CLEAR_SETTINGS,
    FLAG_UNIDIRECTIONAL, MAX_DELTA_WINDOW_SIZE, MAX_PRIORITY_V3, MAX_STREAM_ID,
    MIN_DELTA_WINDOW_SIZE,
};

/// Header block entry: 32-bit length prefixes under version 3.
pub static NAME_VALUE_V3: Schema = Schema {
    name: "name_value_v3",
    fields: &[Field::string("name", 32), Field::string("value", 32)],
};

static SYN_STREAM_V3: Schema = Schema {
    name: "syn_stream_v3",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x1", 1),
        Field::uint("stream_id", 31),
        Field::uint("x2", 1),
        Field::uint("associated_to", 31),
        Field::uint("priority", 3),
        Field::uint("unused", 5),
        Field::uint("slot", 8),
        Field::zlib_array("headers", 32, &NAME_VALUE_V3),
    ],
};

/// SYN_STREAM, version 3.
#[derive(Debug, Clone)]
pub struct SynStreamV3 {
    pub flags: u8,
    pub stream_id: u32,
    pub associated_to: u32,
    pub priority: u8,
    /// Credential vector slot; always zero here (CREDENTIAL frames
    /// are not supported).
    pub slot: u8,
    pub headers: HeaderBlock,
}

impl SynStreamV3 {
    pub fn new(stream_id: u32, flags: u8) -> Result<SynStreamV3> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        if flags != FLAG_NONE && flags != FLAG_FIN && flags != FLAG_UNIDIRECTIONAL {
            return Err(Error::InvalidFlags);
        }
        Ok(SynStreamV3 {
            flags,
            stream_id,
            associated_to: 0,
            priority: 0,
            slot: 0,
            headers: HeaderBlock::new(),
        })
    }

    pub fn set_associated_to(&mut self, stream_id: u32) -> Result<()> {
        if stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        self.associated_to = stream_id;
        Ok(())
    }

    pub fn set_priority(&mut self, priority: u8) -> Result<()> {
        if priority > MAX_PRIORITY_V3 {
            return Err(Error::InvalidPriority);
        }
        self.priority = priority;
        Ok(())
    }
}

impl Record for SynStreamV3 {
    fn schema() -> &'static Schema {
        &SYN_STREAM_V3
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(u32::from(self.flags)),
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(self.stream_id),
            Value::Uint(0),
            Value::Uint(self.associated_to),
            Value::Uint(u32::from(self.priority)),
            Value::Uint(0),
            Value::Uint(u32::from(self.slot)),
            Value::Array(self.headers.to_values()),
        ]
    }

    fn from_values(mut values: Values) -> Result<SynStreamV3> {
        const R: &str = "syn_stream_v3";
        let flags = values.uint(R)? as u8;
        values.skip(R)?; // length
        values.skip(R)?; // x1
        let stream_id = values.uint(R)?;
        values.skip(R)?; // x2
        let associated_to = values.uint(R)?;
        let priority = values.uint(R)? as u8;
        values.skip(R)?; // unused
        let slot = values.uint(R)? as u8;
        let headers = HeaderBlock::from_values(values.array(R)?, R)?;
        Ok(SynStreamV3 {
            flags,
            stream_id,
            associated_to,
            priority,
            slot,
            headers,
        })
    }
}

static SYN_REPLY_V3: Schema = Schema {
    name: "syn_reply_v3",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x", 1),
        Field::uint("stream_id", 31),
        Field::zlib_array("headers", 32, &NAME_VALUE_V3),
    ],
};

/// SYN_REPLY, version 3.
#[derive(Debug, Clone)]
pub struct SynReplyV3 {
    pub flags: u8,
    pub stream_id: u32,
    pub headers: HeaderBlock,
}

impl SynReplyV3 {
    pub fn new(stream_id: u32) -> Result<SynReplyV3> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        Ok(SynReplyV3 {
            flags: FLAG_NONE,
            stream_id,
            headers: HeaderBlock::new(),
        })
    }

    pub fn set_flags(&mut self, flags: u8) -> Result<()> {
        if flags != FLAG_NONE && flags != FLAG_FIN {
            return Err(Error::InvalidFlags);
        }
        self.flags = flags;
        Ok(())
    }
}

impl Record for SynReplyV3 {
    fn schema() -> &'static Schema {
        &SYN_REPLY_V3
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(u32::from(self.flags)),
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(self.stream_id),
            Value::Array(self.headers.to_values()),
        ]
    }

    fn from_values(mut values: Values) -> Result<SynReplyV3> {
        const R: &str = "syn_reply_v3";
        let flags = values.uint(R)? as u8;
        values.skip(R)?;
        values.skip(R)?;
        let stream_id = values.uint(R)?;
        let headers = HeaderBlock::from_values(values.array(R)?, R)?;
        Ok(SynReplyV3 {
            flags,
            stream_id,
            headers,
        })
    }
}

static RST_STREAM_V3: Schema = Schema {
    name: "rst_stream_v3",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x", 1),
        Field::uint("stream_id", 31),
        Field::uint("status_code", 32),
    ],
};

/// RST_STREAM, version 3.
#[derive(Debug, Clone, Copy)]
pub struct RstStreamV3 {
    pub stream_id: u32,
    pub status_code: u32,
}

impl RstStreamV3 {
    pub fn new(stream_id: u32, status: StatusCode) -> Result<RstStreamV3> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        Ok(RstStreamV3 {
            stream_id,
            status_code: status.as_u32(),
        })
    }
}

impl Record for RstStreamV3 {
    fn schema() -> &'static Schema {
        &RST_STREAM_V3
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(self.stream_id),
            Value::Uint(self.status_code),
        ]
    }

    fn from_values(mut values: Values) -> Result<RstStreamV3> {
        const R: &str = "rst_stream_v3";
        values.skip(R)?;
        values.skip(R)?;
        values.skip(R)?;
        let stream_id = values.uint(R)?;
        let status_code = values.uint(R)?;
        Ok(RstStreamV3 {
            stream_id,
            status_code,
        })
    }
}

static SETTINGS_V3: Schema = Schema {
    name: "settings_v3",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::array("entries", 32, &SETTING_ENTRY_V2),
    ],
};

/// SETTINGS, version 3: same layout as version 2 but ids are not
/// byte-reversed on the wire.
#[derive(Debug, Clone)]
pub struct SettingsV3 {
    pub flags: u8,
    pub entries: SettingEntries,
}

impl SettingsV3 {
    pub fn new(flags: u8) -> Result<SettingsV3> {
        if flags != FLAG_NONE && flags != FLAG_SETTINGS_CLEAR_SETTINGS {
            return Err(Error::InvalidFlags);
        }
        Ok(SettingsV3 {
            flags,
            entries: SettingEntries::new(),
        })
    }
}

impl Record for SettingsV3 {
    fn schema() -> &'static Schema {
        &SETTINGS_V3
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(u32::from(self.flags)),
            Value::Uint(0),
            Value::Array(self.entries.to_values(false)),
        ]
    }

    fn from_values(mut values: Values) -> Result<SettingsV3> {
        const R: &str = "settings_v3";
        let flags = values.uint(R)? as u8;
        values.skip(R)?;
        let entries = SettingEntries::from_values(values.array(R)?, false, R)?;
        Ok(SettingsV3 { flags, entries })
    }
}

static GOAWAY_V3: Schema = Schema {
    name: "goaway_v3",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x", 1),
        Field::uint("last_good_stream_id", 31),
        Field::uint("status_code", 32),
    ],
};

/// GOAWAY, version 3.
#[derive(Debug, Clone, Copy)]
pub struct GoAwayV3 {
    pub last_good_stream_id: u32,
    pub status_code: u32,
}

impl GoAwayV3 {
    pub fn new(last_good_stream_id: u32) -> GoAwayV3 {
        GoAwayV3 {
            last_good_stream_id,
            status_code: GoAwayStatus::Ok.as_u32(),
        }
    }

    pub fn set_status(&mut self, status: GoAwayStatus) {
        self.status_code = status.as_u32();
    }
}

impl Record for GoAwayV3 {
    fn schema() -> &'static Schema {
        &GOAWAY_V3
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(self.last_good_stream_id),
            Value::Uint(self.status_code),
        ]
    }

    fn from_values(mut values: Values) -> Result<GoAwayV3> {
        const R: &str = "goaway_v3";
        values.skip(R)?;
        values.skip(R)?;
        values.skip(R)?;
        let last_good_stream_id = values.uint(R)?;
        let status_code = values.uint(R)?;
        Ok(GoAwayV3 {
            last_good_stream_id,
            status_code,
        })
    }
}

static HEADERS_V3: Schema = Schema {
    name: "headers_v3",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x", 1),
        Field::uint("stream_id", 31),
        Field::zlib_array("headers", 32, &NAME_VALUE_V3),
    ],
};

/// HEADERS, version 3.
#[derive(Debug, Clone)]
pub struct HeadersV3 {
    pub flags: u8,
    pub stream_id: u32,
    pub headers: HeaderBlock,
}

impl HeadersV3 {
    pub fn new(stream_id: u32, flags: u8) -> Result<HeadersV3> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        if flags != FLAG_NONE && flags != FLAG_FIN {
            return Err(Error::InvalidFlags);
        }
        Ok(HeadersV3 {
            flags,
            stream_id,
            headers: HeaderBlock::new(),
        })
    }

    pub fn set_flags(&mut self, flags: u8) -> Result<()> {
        if flags != FLAG_NONE && flags != FLAG_FIN {
            return Err(Error::InvalidFlags);
        }
        self.flags = flags;
        Ok(())
    }
}

impl Record for HeadersV3 {
    fn schema() -> &'static Schema {
        &HEADERS_V3
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(u32::from(self.flags)),
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(self.stream_id),
            Value::Array(self.headers.to_values()),
        ]
    }

    fn from_values(mut values: Values) -> Result<HeadersV3> {
        const R: &str = "headers_v3";
        let flags = values.uint(R)? as u8;
        values.skip(R)?;
        values.skip(R)?;
        let stream_id = values.uint(R)?;
        let headers = HeaderBlock::from_values(values.array(R)?, R)?;
        Ok(HeadersV3 {
            flags,
            stream_id,
            headers,
        })
    }
}

static WINDOW_UPDATE_V3: Schema = Schema {
    name: "window_update_v3",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x1", 1),
        Field::uint("stream_id", 31),
        Field::uint("x2", 1),
        Field::uint("delta_window_size", 31),
    ],
};

/// WINDOW_UPDATE, version 3 only.
#[derive(Debug, Clone, Copy)]
pub struct WindowUpdateV3 {
    pub stream_id: u32,
    pub delta_window_size: u32,
}

impl WindowUpdateV3 {
    pub fn new(stream_id: u32, delta_window_size: u32) -> Result<WindowUpdateV3> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        if !(MIN_DELTA_WINDOW_SIZE..=MAX_DELTA_WINDOW_SIZE).contains(&delta_window_size) {
            return Err(Error::InvalidDeltaWindowSize(delta_window_size));
        }
        Ok(WindowUpdateV3 {
            stream_id,
            delta_window_size,
        })
    }
}

impl Record for WindowUpdateV3 {
    fn schema() -> &'static Schema {
        &WINDOW_UPDATE_V3
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(self.stream_id),
            Value::Uint(0),
            Value::Uint(self.delta_window_size),
        ]
    }

    fn from_values(mut values: Values) -> Result<WindowUpdateV3> {
        const R: &str = "window_update_v3";
        values.skip(R)?;
        values.skip(R)?;
        values.skip(R)?;
        let stream_id = values.uint(R)?;
        values.skip(R)?;
        let delta_window_size = values.uint(R)?;
        Ok(WindowUpdateV3 {
            stream_id,
            delta_window_size,
        })
    }
}
