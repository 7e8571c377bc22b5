//! Version 2 control frames
//!
//! One record per control frame type, each with its wire schema.
//! Constructors validate value ranges; the decode path accepts raw
//! wire values so that semantic validation stays in the connection
//! engine. The value supplied for each `length` field is a
//! placeholder: the codec computes the real value while encoding.

use super::fields::{Field, Record, Schema, Value, Values};
use super::header_block::HeaderBlock;
use super::settings::SettingEntries;
use super::{
    Error, Result, StatusCode, FLAG_FIN, FLAG_NONE, FLAG_SETTINGS_CLEAR_SETTINGS,
    FLAG_UNIDIRECTIONAL, MAX_PRIORITY_V2, MAX_STREAM_ID,
};

/// Header block entry: 16-bit length prefixes under version 2.
pub static NAME_VALUE_V2: Schema = Schema {
    name: "name_value_v2",
    fields: &[Field::string("name", 16), Field::string("value", 16)],
};

/// Setting entry: 24-bit id (byte-reversed on the wire), flags, value.
pub static SETTING_ENTRY_V2: Schema = Schema {
    name: "setting_entry_v2",
    fields: &[
        Field::uint("id", 24),
        Field::uint("flags", 8),
        Field::uint("value", 32),
    ],
};

static SYN_STREAM_V2: Schema = Schema {
    name: "syn_stream_v2",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x1", 1),
        Field::uint("stream_id", 31),
        Field::uint("x2", 1),
        Field::uint("associated_to", 31),
        Field::uint("priority", 2),
        Field::uint("unused", 14),
        Field::zlib_array("headers", 16, &NAME_VALUE_V2),
    ],
};

/// SYN_STREAM, version 2.
#[derive(Debug, Clone)]
pub struct SynStreamV2 {
    pub flags: u8,
    pub stream_id: u32,
    pub associated_to: u32,
    pub priority: u8,
    pub headers: HeaderBlock,
}

impl SynStreamV2 {
    pub fn new(stream_id: u32, flags: u8) -> Result<SynStreamV2> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        if flags != FLAG_NONE && flags != FLAG_FIN && flags != FLAG_UNIDIRECTIONAL {
            return Err(Error::InvalidFlags);
        }
        Ok(SynStreamV2 {
            flags,
            stream_id,
            associated_to: 0,
            priority: 0,
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
        if priority > MAX_PRIORITY_V2 {
            return Err(Error::InvalidPriority);
        }
        self.priority = priority;
        Ok(())
    }
}

impl Record for SynStreamV2 {
    fn schema() -> &'static Schema {
        &SYN_STREAM_V2
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
            Value::Array(self.headers.to_values()),
        ]
    }

    fn from_values(mut values: Values) -> Result<SynStreamV2> {
        const R: &str = "syn_stream_v2";
        let flags = values.uint(R)? as u8;
        values.skip(R)?; // length
        values.skip(R)?; // x1
        let stream_id = values.uint(R)?;
        values.skip(R)?; // x2
        let associated_to = values.uint(R)?;
        let priority = values.uint(R)? as u8;
        values.skip(R)?; // unused
        let headers = HeaderBlock::from_values(values.array(R)?, R)?;
        Ok(SynStreamV2 {
            flags,
            stream_id,
            associated_to,
            priority,
            headers,
        })
    }
}

static SYN_REPLY_V2: Schema = Schema {
    name: "syn_reply_v2",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x", 1),
        Field::uint("stream_id", 31),
        Field::uint("unused", 16),
        Field::zlib_array("headers", 16, &NAME_VALUE_V2),
    ],
};

/// SYN_REPLY, version 2.
#[derive(Debug, Clone)]
pub struct SynReplyV2 {
    pub flags: u8,
    pub stream_id: u32,
    pub headers: HeaderBlock,
}

impl SynReplyV2 {
    pub fn new(stream_id: u32) -> Result<SynReplyV2> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        Ok(SynReplyV2 {
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

impl Record for SynReplyV2 {
    fn schema() -> &'static Schema {
        &SYN_REPLY_V2
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(u32::from(self.flags)),
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(self.stream_id),
            Value::Uint(0),
            Value::Array(self.headers.to_values()),
        ]
    }

    fn from_values(mut values: Values) -> Result<SynReplyV2> {
        const R: &str = "syn_reply_v2";
        let flags = values.uint(R)? as u8;
        values.skip(R)?;
        values.skip(R)?;
        let stream_id = values.uint(R)?;
        values.skip(R)?;
        let headers = HeaderBlock::from_values(values.array(R)?, R)?;
        Ok(SynReplyV2 {
            flags,
            stream_id,
            headers,
        })
    }
}

static RST_STREAM_V2: Schema = Schema {
    name: "rst_stream_v2",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x", 1),
        Field::uint("stream_id", 31),
        Field::uint("status_code", 32),
    ],
};

/// RST_STREAM, version 2.
#[derive(Debug, Clone, Copy)]
pub struct RstStreamV2 {
    pub stream_id: u32,
    pub status_code: u32,
}

impl RstStreamV2 {
    pub fn new(stream_id: u32, status: StatusCode) -> Result<RstStreamV2> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        // Version 2 predates the codes above FLOW_CONTROL_ERROR.
        if status.as_u32() > StatusCode::FlowControlError.as_u32() {
            return Err(Error::InvalidStatusCode);
        }
        Ok(RstStreamV2 {
            stream_id,
            status_code: status.as_u32(),
        })
    }
}

impl Record for RstStreamV2 {
    fn schema() -> &'static Schema {
        &RST_STREAM_V2
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

    fn from_values(mut values: Values) -> Result<RstStreamV2> {
        const R: &str = "rst_stream_v2";
        values.skip(R)?;
        values.skip(R)?;
        values.skip(R)?;
        let stream_id = values.uint(R)?;
        let status_code = values.uint(R)?;
        Ok(RstStreamV2 {
            stream_id,
            status_code,
        })
    }
}

static SETTINGS_V2: Schema = Schema {
    name: "settings_v2",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::array("entries", 32, &SETTING_ENTRY_V2),
    ],
};

/// SETTINGS, version 2.
#[derive(Debug, Clone)]
pub struct SettingsV2 {
    pub flags: u8,
    pub entries: SettingEntries,
}

impl SettingsV2 {
    pub fn new(flags: u8) -> Result<SettingsV2> {
        if flags != FLAG_NONE && flags != FLAG_SETTINGS_CLEAR_SETTINGS {
            return Err(Error::InvalidFlags);
        }
        Ok(SettingsV2 {
            flags,
            entries: SettingEntries::new(),
        })
    }
}

impl Record for SettingsV2 {
    fn schema() -> &'static Schema {
        &SETTINGS_V2
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(u32::from(self.flags)),
            Value::Uint(0),
            Value::Array(self.entries.to_values(true)),
        ]
    }

    fn from_values(mut values: Values) -> Result<SettingsV2> {
        const R: &str = "settings_v2";
        let flags = values.uint(R)? as u8;
        values.skip(R)?;
        let entries = SettingEntries::from_values(values.array(R)?, true, R)?;
        Ok(SettingsV2 { flags, entries })
    }
}

static NOOP_V2: Schema = Schema {
    name: "noop_v2",
    fields: &[Field::uint("flags", 8), Field::uint_limit("length", 24)],
};

/// NOOP, version 2 only.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopV2;

impl Record for NoopV2 {
    fn schema() -> &'static Schema {
        &NOOP_V2
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Uint(0), Value::Uint(0)]
    }

    fn from_values(mut values: Values) -> Result<NoopV2> {
        const R: &str = "noop_v2";
        values.skip(R)?;
        values.skip(R)?;
        Ok(NoopV2)
    }
}

static PING_V2: Schema = Schema {
    name: "ping_v2",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("id", 32),
    ],
};

/// PING; the same layout serves versions 2 and 3.
#[derive(Debug, Clone, Copy)]
pub struct PingV2 {
    pub id: u32,
}

impl PingV2 {
    pub fn new(id: u32) -> PingV2 {
        PingV2 { id }
    }
}

impl Record for PingV2 {
    fn schema() -> &'static Schema {
        &PING_V2
    }

    fn to_values(&self) -> Vec<Value> {
        vec![Value::Uint(0), Value::Uint(0), Value::Uint(self.id)]
    }

    fn from_values(mut values: Values) -> Result<PingV2> {
        const R: &str = "ping_v2";
        values.skip(R)?;
        values.skip(R)?;
        let id = values.uint(R)?;
        Ok(PingV2 { id })
    }
}

static GOAWAY_V2: Schema = Schema {
    name: "goaway_v2",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x", 1),
        Field::uint("last_good_stream_id", 31),
    ],
};

/// GOAWAY, version 2.
#[derive(Debug, Clone, Copy)]
pub struct GoAwayV2 {
    pub last_good_stream_id: u32,
}

impl GoAwayV2 {
    pub fn new(last_good_stream_id: u32) -> GoAwayV2 {
        GoAwayV2 {
            last_good_stream_id,
        }
    }
}

impl Record for GoAwayV2 {
    fn schema() -> &'static Schema {
        &GOAWAY_V2
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(self.last_good_stream_id),
        ]
    }

    fn from_values(mut values: Values) -> Result<GoAwayV2> {
        const R: &str = "goaway_v2";
        values.skip(R)?;
        values.skip(R)?;
        values.skip(R)?;
        let last_good_stream_id = values.uint(R)?;
        Ok(GoAwayV2 {
            last_good_stream_id,
        })
    }
}

static HEADERS_V2: Schema = Schema {
    name: "headers_v2",
    fields: &[
        Field::uint("flags", 8),
        Field::uint_limit("length", 24),
        Field::uint("x", 1),
        Field::uint("stream_id", 31),
        Field::uint("unused", 16),
        Field::zlib_array("headers", 16, &NAME_VALUE_V2),
    ],
};

/// HEADERS, version 2.
#[derive(Debug, Clone)]
pub struct HeadersV2 {
    pub flags: u8,
    pub stream_id: u32,
    pub headers: HeaderBlock,
}

impl HeadersV2 {
    pub fn new(stream_id: u32, flags: u8) -> Result<HeadersV2> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        if flags != FLAG_NONE && flags != FLAG_FIN {
            return Err(Error::InvalidFlags);
        }
        Ok(HeadersV2 {
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

impl Record for HeadersV2 {
    fn schema() -> &'static Schema {
        &HEADERS_V2
    }

    fn to_values(&self) -> Vec<Value> {
        vec![
            Value::Uint(u32::from(self.flags)),
            Value::Uint(0),
            Value::Uint(0),
            Value::Uint(self.stream_id),
            Value::Uint(0),
            Value::Array(self.headers.to_values()),
        ]
    }

    fn from_values(mut values: Values) -> Result<HeadersV2> {
        const R: &str = "headers_v2";
        let flags = values.uint(R)? as u8;
        values.skip(R)?;
        values.skip(R)?;
        let stream_id = values.uint(R)?;
        values.skip(R)?;
        let headers = HeaderBlock::from_values(values.array(R)?, R)?;
        Ok(HeadersV2 {
            flags,
            stream_id,
            headers,
        })
    }
}
