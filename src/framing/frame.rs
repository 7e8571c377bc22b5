//! Frame reading, writing and dispatch
//!
//! A frame is either a control frame — tagged by (version, type) and
//! dispatched through the table in [`ControlFrame::read`] — or a data
//! frame. Control frames start with a set high bit, a 15-bit version
//! and a 16-bit type; data frames start with a clear bit and a 31-bit
//! stream id. Both end with 8 flag bits and a 24-bit payload length.

use super::fields::{Decoder, Encoder, Record, Values};
use super::frames_v2::{
    GoAwayV2, HeadersV2, NoopV2, PingV2, RstStreamV2, SettingsV2, SynReplyV2, SynStreamV2,
};
use super::frames_v3::{
    GoAwayV3, HeadersV3, RstStreamV3, SettingsV3, SynReplyV3, SynStreamV3, WindowUpdateV3,
};
use super::header_block::HeaderBlock;
use super::{Error, FrameType, Result, StatusCode, Version, MAX_STREAM_ID};
use bytes::Bytes;
use std::io::{Read, Write};

/// A version 2 control frame.
#[derive(Debug, Clone)]
pub enum ControlV2 {
    SynStream(SynStreamV2),
    SynReply(SynReplyV2),
    RstStream(RstStreamV2),
    Settings(SettingsV2),
    Noop(NoopV2),
    Ping(PingV2),
    GoAway(GoAwayV2),
    Headers(HeadersV2),
}

/// A version 3 control frame.
#[derive(Debug, Clone)]
pub enum ControlV3 {
    SynStream(SynStreamV3),
    SynReply(SynReplyV3),
    RstStream(RstStreamV3),
    Settings(SettingsV3),
    Ping(PingV2),
    GoAway(GoAwayV3),
    Headers(HeadersV3),
    WindowUpdate(WindowUpdateV3),
}

/// Any control frame; the version is the outer tag, the type the inner.
#[derive(Debug, Clone)]
pub enum ControlFrame {
    V2(ControlV2),
    V3(ControlV3),
}

impl ControlFrame {
    pub fn version(&self) -> Version {
        match self {
            ControlFrame::V2(_) => Version::V2,
            ControlFrame::V3(_) => Version::V3,
        }
    }

    pub fn frame_type(&self) -> FrameType {
        match self {
            ControlFrame::V2(f) => match f {
                ControlV2::SynStream(_) => FrameType::SynStream,
                ControlV2::SynReply(_) => FrameType::SynReply,
                ControlV2::RstStream(_) => FrameType::RstStream,
                ControlV2::Settings(_) => FrameType::Settings,
                ControlV2::Noop(_) => FrameType::Noop,
                ControlV2::Ping(_) => FrameType::Ping,
                ControlV2::GoAway(_) => FrameType::Goaway,
                ControlV2::Headers(_) => FrameType::Headers,
            },
            ControlFrame::V3(f) => match f {
                ControlV3::SynStream(_) => FrameType::SynStream,
                ControlV3::SynReply(_) => FrameType::SynReply,
                ControlV3::RstStream(_) => FrameType::RstStream,
                ControlV3::Settings(_) => FrameType::Settings,
                ControlV3::Ping(_) => FrameType::Ping,
                ControlV3::GoAway(_) => FrameType::Goaway,
                ControlV3::Headers(_) => FrameType::Headers,
                ControlV3::WindowUpdate(_) => FrameType::WindowUpdate,
            },
        }
    }

    pub fn flags(&self) -> u8 {
        match self {
            ControlFrame::V2(f) => match f {
                ControlV2::SynStream(f) => f.flags,
                ControlV2::SynReply(f) => f.flags,
                ControlV2::Settings(f) => f.flags,
                ControlV2::Headers(f) => f.flags,
                _ => 0,
            },
            ControlFrame::V3(f) => match f {
                ControlV3::SynStream(f) => f.flags,
                ControlV3::SynReply(f) => f.flags,
                ControlV3::Settings(f) => f.flags,
                ControlV3::Headers(f) => f.flags,
                _ => 0,
            },
        }
    }

    /// The stream this frame addresses, for frames that address one.
    pub fn stream_id(&self) -> Option<u32> {
        match self {
            ControlFrame::V2(f) => match f {
                ControlV2::SynStream(f) => Some(f.stream_id),
                ControlV2::SynReply(f) => Some(f.stream_id),
                ControlV2::RstStream(f) => Some(f.stream_id),
                ControlV2::Headers(f) => Some(f.stream_id),
                _ => None,
            },
            ControlFrame::V3(f) => match f {
                ControlV3::SynStream(f) => Some(f.stream_id),
                ControlV3::SynReply(f) => Some(f.stream_id),
                ControlV3::RstStream(f) => Some(f.stream_id),
                ControlV3::Headers(f) => Some(f.stream_id),
                ControlV3::WindowUpdate(f) => Some(f.stream_id),
                _ => None,
            },
        }
    }

    pub fn headers(&self) -> Option<&HeaderBlock> {
        match self {
            ControlFrame::V2(f) => match f {
                ControlV2::SynStream(f) => Some(&f.headers),
                ControlV2::SynReply(f) => Some(&f.headers),
                ControlV2::Headers(f) => Some(&f.headers),
                _ => None,
            },
            ControlFrame::V3(f) => match f {
                ControlV3::SynStream(f) => Some(&f.headers),
                ControlV3::SynReply(f) => Some(&f.headers),
                ControlV3::Headers(f) => Some(&f.headers),
                _ => None,
            },
        }
    }

    pub fn headers_mut(&mut self) -> Option<&mut HeaderBlock> {
        match self {
            ControlFrame::V2(f) => match f {
                ControlV2::SynStream(f) => Some(&mut f.headers),
                ControlV2::SynReply(f) => Some(&mut f.headers),
                ControlV2::Headers(f) => Some(&mut f.headers),
                _ => None,
            },
            ControlFrame::V3(f) => match f {
                ControlV3::SynStream(f) => Some(&mut f.headers),
                ControlV3::SynReply(f) => Some(&mut f.headers),
                ControlV3::Headers(f) => Some(&mut f.headers),
                _ => None,
            },
        }
    }

    /// Whether flags can be altered after construction. SYN_REPLY and
    /// HEADERS support it; SYN_STREAM notably does not, which is what
    /// keeps a bodyless push from carrying FIN.
    pub fn can_set_flags(&self) -> bool {
        matches!(
            self,
            ControlFrame::V2(ControlV2::SynReply(_))
                | ControlFrame::V2(ControlV2::Headers(_))
                | ControlFrame::V3(ControlV3::SynReply(_))
                | ControlFrame::V3(ControlV3::Headers(_))
        )
    }

    pub fn set_flags(&mut self, flags: u8) -> Result<()> {
        match self {
            ControlFrame::V2(ControlV2::SynReply(f)) => f.set_flags(flags),
            ControlFrame::V2(ControlV2::Headers(f)) => f.set_flags(flags),
            ControlFrame::V3(ControlV3::SynReply(f)) => f.set_flags(flags),
            ControlFrame::V3(ControlV3::Headers(f)) => f.set_flags(flags),
            _ => Err(Error::InvalidFlags),
        }
    }

    pub fn status_code(&self) -> Option<u32> {
        match self {
            ControlFrame::V2(ControlV2::RstStream(f)) => Some(f.status_code),
            ControlFrame::V3(ControlV3::RstStream(f)) => Some(f.status_code),
            ControlFrame::V3(ControlV3::GoAway(f)) => Some(f.status_code),
            _ => None,
        }
    }

    // Version-dispatching constructors.

    pub fn syn_stream(version: Version, stream_id: u32, flags: u8) -> Result<ControlFrame> {
        Ok(match version {
            Version::V2 => ControlFrame::V2(ControlV2::SynStream(SynStreamV2::new(
                stream_id, flags,
            )?)),
            Version::V3 => ControlFrame::V3(ControlV3::SynStream(SynStreamV3::new(
                stream_id, flags,
            )?)),
        })
    }

    pub fn syn_reply(version: Version, stream_id: u32) -> Result<ControlFrame> {
        Ok(match version {
            Version::V2 => ControlFrame::V2(ControlV2::SynReply(SynReplyV2::new(stream_id)?)),
            Version::V3 => ControlFrame::V3(ControlV3::SynReply(SynReplyV3::new(stream_id)?)),
        })
    }

    pub fn rst_stream(version: Version, stream_id: u32, status: StatusCode) -> Result<ControlFrame> {
        Ok(match version {
            Version::V2 => ControlFrame::V2(ControlV2::RstStream(RstStreamV2::new(
                stream_id, status,
            )?)),
            Version::V3 => ControlFrame::V3(ControlV3::RstStream(RstStreamV3::new(
                stream_id, status,
            )?)),
        })
    }

    pub fn goaway(version: Version, last_good_stream_id: u32) -> ControlFrame {
        match version {
            Version::V2 => ControlFrame::V2(ControlV2::GoAway(GoAwayV2::new(last_good_stream_id))),
            Version::V3 => ControlFrame::V3(ControlV3::GoAway(GoAwayV3::new(last_good_stream_id))),
        }
    }

    pub fn ping(version: Version, id: u32) -> ControlFrame {
        match version {
            Version::V2 => ControlFrame::V2(ControlV2::Ping(PingV2::new(id))),
            Version::V3 => ControlFrame::V3(ControlV3::Ping(PingV2::new(id))),
        }
    }

    pub fn window_update(stream_id: u32, delta: u32) -> Result<ControlFrame> {
        Ok(ControlFrame::V3(ControlV3::WindowUpdate(
            WindowUpdateV3::new(stream_id, delta)?,
        )))
    }

    /// Read the remainder of a control frame; the control bit has
    /// already been consumed.
    fn read<R: Read>(decoder: &mut Decoder<R>) -> Result<ControlFrame> {
        let version =
            Version::from_u16(decoder.read_bits(15)? as u16).ok_or(Error::UnsupportedVersion)?;
        let frame_type =
            FrameType::from_u16(decoder.read_bits(16)? as u16).ok_or(Error::InvalidControlFrameType)?;
        match (version, frame_type) {
            (Version::V2, FrameType::SynStream) => {
                decode_into(decoder, ControlV2::SynStream).map(ControlFrame::V2)
            }
            (Version::V2, FrameType::SynReply) => {
                decode_into(decoder, ControlV2::SynReply).map(ControlFrame::V2)
            }
            (Version::V2, FrameType::RstStream) => {
                decode_into(decoder, ControlV2::RstStream).map(ControlFrame::V2)
            }
            (Version::V2, FrameType::Settings) => {
                decode_into(decoder, ControlV2::Settings).map(ControlFrame::V2)
            }
            (Version::V2, FrameType::Noop) => {
                decode_into(decoder, ControlV2::Noop).map(ControlFrame::V2)
            }
            (Version::V2, FrameType::Ping) => {
                decode_into(decoder, ControlV2::Ping).map(ControlFrame::V2)
            }
            (Version::V2, FrameType::Goaway) => {
                decode_into(decoder, ControlV2::GoAway).map(ControlFrame::V2)
            }
            (Version::V2, FrameType::Headers) => {
                decode_into(decoder, ControlV2::Headers).map(ControlFrame::V2)
            }
            (Version::V3, FrameType::SynStream) => {
                decode_into(decoder, ControlV3::SynStream).map(ControlFrame::V3)
            }
            (Version::V3, FrameType::SynReply) => {
                decode_into(decoder, ControlV3::SynReply).map(ControlFrame::V3)
            }
            (Version::V3, FrameType::RstStream) => {
                decode_into(decoder, ControlV3::RstStream).map(ControlFrame::V3)
            }
            (Version::V3, FrameType::Settings) => {
                decode_into(decoder, ControlV3::Settings).map(ControlFrame::V3)
            }
            (Version::V3, FrameType::Ping) => {
                decode_into(decoder, ControlV3::Ping).map(ControlFrame::V3)
            }
            (Version::V3, FrameType::Goaway) => {
                decode_into(decoder, ControlV3::GoAway).map(ControlFrame::V3)
            }
            (Version::V3, FrameType::Headers) => {
                decode_into(decoder, ControlV3::Headers).map(ControlFrame::V3)
            }
            (Version::V3, FrameType::WindowUpdate) => {
                decode_into(decoder, ControlV3::WindowUpdate).map(ControlFrame::V3)
            }
            _ => Err(Error::InvalidControlFrameType),
        }
    }

    fn write<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_bits(1, 1)?;
        encoder.write_bits(15, u32::from(self.version().as_u16()))?;
        encoder.write_bits(16, u32::from(self.frame_type().as_u16()))?;
        match self {
            ControlFrame::V2(f) => match f {
                ControlV2::SynStream(f) => encode_record(encoder, f),
                ControlV2::SynReply(f) => encode_record(encoder, f),
                ControlV2::RstStream(f) => encode_record(encoder, f),
                ControlV2::Settings(f) => encode_record(encoder, f),
                ControlV2::Noop(f) => encode_record(encoder, f),
                ControlV2::Ping(f) => encode_record(encoder, f),
                ControlV2::GoAway(f) => encode_record(encoder, f),
                ControlV2::Headers(f) => encode_record(encoder, f),
            },
            ControlFrame::V3(f) => match f {
                ControlV3::SynStream(f) => encode_record(encoder, f),
                ControlV3::SynReply(f) => encode_record(encoder, f),
                ControlV3::RstStream(f) => encode_record(encoder, f),
                ControlV3::Settings(f) => encode_record(encoder, f),
                ControlV3::Ping(f) => encode_record(encoder, f),
                ControlV3::GoAway(f) => encode_record(encoder, f),
                ControlV3::Headers(f) => encode_record(encoder, f),
                ControlV3::WindowUpdate(f) => encode_record(encoder, f),
            },
        }
    }
}

fn decode_into<R: Read, T: Record, C>(decoder: &mut Decoder<R>, wrap: impl FnOnce(T) -> C) -> Result<C> {
    let values = decoder.decode(T::schema())?;
    T::from_values(Values::new(values)).map(wrap)
}

fn encode_record<W: Write, T: Record>(encoder: &mut Encoder<W>, record: &T) -> Result<()> {
    encoder.encode(T::schema(), &record.to_values())
}

/// A data frame with its payload read eagerly.
#[derive(Debug, Clone)]
pub struct DataFrame {
    pub stream_id: u32,
    pub flags: u8,
    pub payload: Bytes,
}

impl DataFrame {
    pub fn new(stream_id: u32, payload: Bytes) -> Result<DataFrame> {
        if stream_id == 0 || stream_id > MAX_STREAM_ID {
            return Err(Error::InvalidStreamId);
        }
        Ok(DataFrame {
            stream_id,
            flags: 0,
            payload,
        })
    }

    pub fn set_flags(&mut self, flags: u8) -> Result<()> {
        if flags != super::FLAG_NONE && flags != super::FLAG_FIN {
            return Err(Error::InvalidFlags);
        }
        self.flags = flags;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Read the remainder of a data frame; the control bit has already
    /// been consumed.
    fn read<R: Read>(decoder: &mut Decoder<R>) -> Result<DataFrame> {
        let stream_id = decoder.read_bits(31)?;
        let flags = decoder.read_bits(8)? as u8;
        let length = decoder.read_bits(24)?;
        let mut payload = vec![0u8; length as usize];
        decoder.read_exact(&mut payload).map_err(|e| match e {
            // Fewer payload bytes than the header declared.
            Error::Io(io) if io.kind() == std::io::ErrorKind::UnexpectedEof => {
                Error::ShortDataFrame
            }
            other => other,
        })?;
        Ok(DataFrame {
            stream_id,
            flags,
            payload: Bytes::from(payload),
        })
    }

    fn write<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        encoder.write_bits(1, 0)?;
        encoder.write_bits(31, self.stream_id)?;
        encoder.write_bits(8, u32::from(self.flags))?;
        encoder.write_bits(24, self.payload.len() as u32)?;
        encoder.write_all(&self.payload)
    }
}

/// Any frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Control(ControlFrame),
    Data(DataFrame),
}

impl Frame {
    pub fn is_control(&self) -> bool {
        matches!(self, Frame::Control(_))
    }

    /// The stream this frame addresses, if it addresses one.
    pub fn stream_id(&self) -> Option<u32> {
        match self {
            Frame::Control(f) => f.stream_id(),
            Frame::Data(f) => Some(f.stream_id),
        }
    }

    /// Decode the next frame off the connection.
    pub fn read<R: Read>(decoder: &mut Decoder<R>) -> Result<Frame> {
        if decoder.read_bits(1)? == 1 {
            ControlFrame::read(decoder).map(Frame::Control)
        } else {
            DataFrame::read(decoder).map(Frame::Data)
        }
    }

    /// Encode this frame onto the connection.
    pub fn write<W: Write>(&self, encoder: &mut Encoder<W>) -> Result<()> {
        match self {
            Frame::Control(f) => f.write(encoder),
            Frame::Data(f) => f.write(encoder),
        }
    }
}
