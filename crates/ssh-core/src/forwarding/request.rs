use std::fmt;

use op_types::ssh::ONION_SUFFIX;

use crate::error::DecodeError;

/// Decoded payload of a `direct-tcpip` channel open (RFC 4254 §7.2).
///
/// ```text
/// string    host to connect
/// uint32    port to connect
/// string    originator IP address
/// uint32    originator port
/// ```
///
/// Built once per channel-open request and never modified.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ForwardDescriptor {
    pub address: String,
    pub remote_port: u32,
    pub originator_address: String,
    pub originator_port: u32,
}

impl ForwardDescriptor {
    pub fn new(address: impl Into<String>, remote_port: u32, originator_address: impl Into<String>, originator_port: u32) -> Self {
        Self {
            address: address.into(),
            remote_port,
            originator_address: originator_address.into(),
            originator_port,
        }
    }

    /// Parse the channel-open extra data. Bytes left over after the four fields are an error.
    pub fn decode(extra_data: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader { buf: extra_data };
        let address = reader.read_string("host to connect")?;
        let remote_port = reader.read_u32("port to connect")?;
        let originator_address = reader.read_string("originator address")?;
        let originator_port = reader.read_u32("originator port")?;
        if !reader.buf.is_empty() {
            return Err(DecodeError::TrailingBytes(reader.buf.len()));
        }
        Ok(Self {
            address,
            remote_port,
            originator_address,
            originator_port,
        })
    }

    /// Wire form of this descriptor, the inverse of [`ForwardDescriptor::decode`].
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.address.len() + self.originator_address.len());
        put_string(&mut out, &self.address);
        out.extend_from_slice(&self.remote_port.to_be_bytes());
        put_string(&mut out, &self.originator_address);
        out.extend_from_slice(&self.originator_port.to_be_bytes());
        out
    }

    /// Dial target in `host:port` form.
    pub fn destination(&self) -> String {
        format!("{}:{}", self.address, self.remote_port)
    }

    /// Only `.onion` hosts may be forwarded. The comparison is case-sensitive, as received.
    pub fn is_permitted_target(&self) -> bool {
        self.address.ends_with(ONION_SUFFIX)
    }

    pub fn originator(&self) -> String {
        format!("{}:{}", self.originator_address, self.originator_port)
    }
}

impl fmt::Display for ForwardDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.originator(), self.destination())
    }
}

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], DecodeError> {
        if self.buf.len() < needed {
            return Err(DecodeError::Truncated {
                field,
                needed,
                remaining: self.buf.len(),
            });
        }
        let (head, tail) = self.buf.split_at(needed);
        self.buf = tail;
        Ok(head)
    }

    fn read_u32(&mut self, field: &'static str) -> Result<u32, DecodeError> {
        let bytes = self.take(field, 4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let len = self.read_u32(field)? as usize;
        let bytes = self.take(field, len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { field })
    }
}

fn put_string(out: &mut Vec<u8>, value: &str) {
    out.extend_from_slice(&(value.len() as u32).to_be_bytes());
    out.extend_from_slice(value.as_bytes());
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
