//! Header compression dictionaries
//!
//! Header blocks are zlib-compressed with a preset dictionary so that
//! the very first block on a connection already compresses well. The
//! dictionary differs between protocol versions: SPDY/2 uses a plain
//! ASCII word list (with the trailing NUL that shipping clients send),
//! SPDY/3 a list of length-prefixed entries followed by a raw tail.

use super::Version;

/// SPDY/2 header compression dictionary.
pub const DICTIONARY_V2: &[u8] = b"optionsgetheadpostputdeletetrace\
acceptaccept-charsetaccept-encodingaccept-language\
authorizationexpectfromhost\
if-modified-sinceif-matchif-none-matchif-rangeif-unmodifiedsince\
max-forwardsproxy-authorizationrangerefererteuser-agent\
100101200201202203204205206\
300301302303304305306307\
400401402403404405406407408409410411412413414415416417\
500501502503504505\
accept-rangesageetaglocationproxy-authenticatepublicretry-after\
servervarywarningwww-authenticateallowcontent-basecontent-encodingcache-control\
connectiondatetrailertransfer-encodingupgradeviawarning\
content-languagecontent-lengthcontent-locationcontent-md5content-rangecontent-typeetagexpireslast-modifiedset-cookie\
MondayTuesdayWednesdayThursdayFridaySaturdaySunday\
JanFebMarAprMayJunJulAugSepOctNovDec\
chunkedtext/htmlimage/pngimage/jpgimage/gifapplication/xmlapplication/xhtmltext/plain\
publicmax-age\
charset=iso-8859-1utf-8gzipdeflateHTTP/1.1statusversionurl\0";

/// SPDY/3 header compression dictionary.
pub const DICTIONARY_V3: &[u8] = b"\
\x00\x00\x00\x07options\
\x00\x00\x00\x04head\
\x00\x00\x00\x04post\
\x00\x00\x00\x03put\
\x00\x00\x00\x06delete\
\x00\x00\x00\x05trace\
\x00\x00\x00\x06accept\
\x00\x00\x00\x0eaccept-charset\
\x00\x00\x00\x0faccept-encoding\
\x00\x00\x00\x0faccept-language\
\x00\x00\x00\x0daccept-ranges\
\x00\x00\x00\x03age\
\x00\x00\x00\x05allow\
\x00\x00\x00\x0dauthorization\
\x00\x00\x00\x0dcache-control\
\x00\x00\x00\x0aconnection\
\x00\x00\x00\x0ccontent-base\
\x00\x00\x00\x10content-encoding\
\x00\x00\x00\x10content-language\
\x00\x00\x00\x0econtent-length\
\x00\x00\x00\x10content-location\
\x00\x00\x00\x0bcontent-md5\
\x00\x00\x00\x0dcontent-range\
\x00\x00\x00\x0ccontent-type\
\x00\x00\x00\x04date\
\x00\x00\x00\x04etag\
\x00\x00\x00\x06expect\
\x00\x00\x00\x07expires\
\x00\x00\x00\x04from\
\x00\x00\x00\x04host\
\x00\x00\x00\x08if-match\
\x00\x00\x00\x11if-modified-since\
\x00\x00\x00\x0dif-none-match\
\x00\x00\x00\x08if-range\
\x00\x00\x00\x13if-unmodified-since\
\x00\x00\x00\x0dlast-modified\
\x00\x00\x00\x08location\
\x00\x00\x00\x0cmax-forwards\
\x00\x00\x00\x06pragma\
\x00\x00\x00\x12proxy-authenticate\
\x00\x00\x00\x13proxy-authorization\
\x00\x00\x00\x05range\
\x00\x00\x00\x07referer\
\x00\x00\x00\x0bretry-after\
\x00\x00\x00\x06server\
\x00\x00\x00\x02te\
\x00\x00\x00\x07trailer\
\x00\x00\x00\x11transfer-encoding\
\x00\x00\x00\x07upgrade\
\x00\x00\x00\x0auser-agent\
\x00\x00\x00\x04vary\
\x00\x00\x00\x03via\
\x00\x00\x00\x07warning\
\x00\x00\x00\x10www-authenticate\
\x00\x00\x00\x06method\
\x00\x00\x00\x03get\
\x00\x00\x00\x06status\
\x00\x00\x00\x06200 OK\
\x00\x00\x00\x07version\
\x00\x00\x00\x08HTTP/1.1\
\x00\x00\x00\x03url\
\x00\x00\x00\x06public\
\x00\x00\x00\x0aset-cookie\
\x00\x00\x00\x0akeep-alive\
\x00\x00\x00\x06origin\
100101201202205206300302303304305306307402405406407408409410411412413414415416417502504505\
203 Non-Authoritative Information\
204 No Content\
301 Moved Permanently\
400 Bad Request\
401 Unauthorized\
403 Forbidden\
404 Not Found\
500 Internal Server Error\
501 Not Implemented\
503 Service Unavailable\
Jan Feb Mar Apr May Jun Jul Aug Sept Oct Nov Dec\
\x2000:00:00\
\x20Mon, Tue, Wed, Thu, Fri, Sat, Sun, GMT\
chunked,text/html,image/png,image/jpg,image/gif,\
application/xml,application/xhtml+xml,text/plain,text/javascript,\
publicprivatemax-age=gzip,deflate,sdch\
charset=utf-8charset=iso-8859-1,utf-,*,enq=0.";

/// Select the header compression dictionary for a protocol version.
pub fn select_dictionary(version: Version) -> &'static [u8] {
    match version {
        Version::V2 => DICTIONARY_V2,
        Version::V3 => DICTIONARY_V3,
    }
}
