use crate::{
    Error, HEADER_SIZE,
    address::{Address, ENTRY_LEN},
};

use bytes::{BufMut, Bytes, BytesMut};
use num_enum::{IntoPrimitive, TryFromPrimitive};

/// The only protocol version on the wire today.
pub const VERSION: u16 = 1;

/// Request/response discriminator carried in the first three body bytes.
pub const REQUEST: &str = "REQ";
pub const RESPONSE: &str = "RES";

/// A Reunion path can hold at most 99 hops, the two-digit count field.
pub const MAX_PATH_LEN: usize = 99;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u16)]
pub enum Kind {
    Register = 1,
    Advertise = 2,
    Join = 3,
    Message = 4,
    Reunion = 5,
}

/// A decoded wire packet.
///
/// `length` mirrors the header field and is advisory: the dispatcher
/// compares it against the real body length and drops mismatches. The
/// constructors always keep the two in sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub version: u16,
    pub kind: Kind,
    pub length: u32,
    pub source: Address,
    pub body: String,
}

/// The typed view of a packet body, produced by [`Packet::payload`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    RegisterRequest(Address),
    RegisterAck,
    AdvertiseRequest,
    AdvertiseResponse(Address),
    Join,
    Message(String),
    Hello(Vec<Address>),
    HelloBack(Vec<Address>),
}

impl Packet {
    fn new(kind: Kind, source: Address, body: String) -> Self {
        Self {
            version: VERSION,
            length: body.len() as u32,
            kind,
            source,
            body,
        }
    }

    /// `REQ + IP(15) + PORT(5)`, the client asking the root to register
    /// its listener address.
    pub fn register_request(source: Address, listener: Address) -> Self {
        let body = format!(
            "{REQUEST}{}{}",
            listener.encode_ip(),
            listener.encode_port()
        );

        Self::new(Kind::Register, source, body)
    }

    /// `RES + ACK`, the root confirming a registration.
    pub fn register_ack(source: Address) -> Self {
        Self::new(Kind::Register, source, format!("{RESPONSE}ACK"))
    }

    pub fn advertise_request(source: Address) -> Self {
        Self::new(Kind::Advertise, source, REQUEST.to_string())
    }

    /// `RES + IP(15) + PORT(5)`, the root pointing the requester at its
    /// assigned parent.
    pub fn advertise_response(source: Address, neighbour: Address) -> Self {
        let body = format!(
            "{RESPONSE}{}{}",
            neighbour.encode_ip(),
            neighbour.encode_port()
        );

        Self::new(Kind::Advertise, source, body)
    }

    pub fn join(source: Address) -> Self {
        Self::new(Kind::Join, source, "JOIN".to_string())
    }

    pub fn message(source: Address, text: &str) -> Self {
        Self::new(Kind::Message, source, text.to_string())
    }

    /// Reunion Hello: `REQ + N(2) + N x (IP(15) + PORT(5))`, origin first.
    pub fn hello(source: Address, path: &[Address]) -> Result<Self, Error> {
        Ok(Self::new(
            Kind::Reunion,
            source,
            Self::path_body(REQUEST, path)?,
        ))
    }

    /// Reunion Hello Back: same layout, path already reversed so that the
    /// recipient is `path[0]`.
    pub fn hello_back(source: Address, path: &[Address]) -> Result<Self, Error> {
        Ok(Self::new(
            Kind::Reunion,
            source,
            Self::path_body(RESPONSE, path)?,
        ))
    }

    fn path_body(prefix: &str, path: &[Address]) -> Result<String, Error> {
        if path.len() > MAX_PATH_LEN {
            return Err(Error::PathTooLong);
        }

        let mut body = format!("{prefix}{:02}", path.len());
        for hop in path {
            body.push_str(&hop.encode_ip());
            body.push_str(&hop.encode_port());
        }

        Ok(body)
    }

    /// Serializes the packet into its wire form.
    ///
    /// # Test
    ///
    /// ```
    /// use canopy_server_codec::{address::Address, packet::Packet};
    ///
    /// let source = Address::new([192, 168, 1, 1], 65000);
    /// let packet = Packet::message(source, "Hello World!");
    ///
    /// assert_eq!(
    ///     packet.encode().as_ref(),
    ///     b"\x00\x01\x00\x04\x00\x00\x00\x0c\
    ///       \x00\xc0\x00\xa8\x00\x01\x00\x01\
    ///       \x00\x00\xfd\xe8Hello World!"
    /// );
    /// ```
    pub fn encode(&self) -> Bytes {
        let mut bytes = BytesMut::with_capacity(HEADER_SIZE + self.body.len());

        bytes.put_u16(self.version);
        bytes.put_u16(self.kind.into());
        bytes.put_u32(self.length);

        for octet in self.source.octets {
            bytes.put_u16(octet as u16);
        }

        bytes.put_u32(self.source.port as u32);
        bytes.put(self.body.as_bytes());
        bytes.freeze()
    }

    /// Decodes a wire buffer. Anything shorter than the header, or with a
    /// non-ASCII body, is rejected; the header length field is *not*
    /// enforced here (see [`Packet::is_well_formed`]).
    ///
    /// # Test
    ///
    /// ```
    /// use canopy_server_codec::packet::{Kind, Packet};
    ///
    /// let buffer = b"\x00\x01\x00\x04\x00\x00\x00\x0c\
    ///                \x00\xc0\x00\xa8\x00\x01\x00\x01\
    ///                \x00\x00\xfd\xe8Hello World!";
    ///
    /// let packet = Packet::decode(buffer).unwrap();
    ///
    /// assert_eq!(packet.kind, Kind::Message);
    /// assert_eq!(packet.body, "Hello World!");
    /// assert_eq!(packet.source.to_string(), "192.168.001.001:65000");
    /// assert_eq!(packet.encode().as_ref(), buffer);
    /// assert!(Packet::decode(&buffer[..19]).is_err());
    /// ```
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::PacketTooShort);
        }

        let version = u16::from_be_bytes(bytes[0..2].try_into()?);
        let kind = Kind::try_from(u16::from_be_bytes(bytes[2..4].try_into()?))
            .map_err(|_| Error::UnknownKind)?;
        let length = u32::from_be_bytes(bytes[4..8].try_into()?);

        let mut octets = [0u8; 4];
        for (index, octet) in octets.iter_mut().enumerate() {
            let offset = 8 + index * 2;
            let wide = u16::from_be_bytes(bytes[offset..offset + 2].try_into()?);
            *octet = u8::try_from(wide).map_err(|_| Error::BadAddress)?;
        }

        let port = u32::from_be_bytes(bytes[16..20].try_into()?);
        let port = u16::try_from(port).map_err(|_| Error::BadAddress)?;

        let body = std::str::from_utf8(&bytes[HEADER_SIZE..])?;
        if !body.is_ascii() {
            return Err(Error::BodyNotAscii);
        }

        Ok(Self {
            version,
            kind,
            length,
            source: Address::new(octets, port),
            body: body.to_string(),
        })
    }

    /// Whether the advisory header length matches the body actually
    /// carried. Violators are dropped by the dispatcher.
    pub fn is_well_formed(&self) -> bool {
        self.length as usize == self.body.len()
    }

    /// Whether this is an Advertise response, the only packet processed
    /// while a client sits in Reunion-failure mode.
    pub fn is_advertise_response(&self) -> bool {
        self.kind == Kind::Advertise && self.body.starts_with(RESPONSE)
    }

    /// Parses the body into its typed layout for dispatch.
    pub fn payload(&self) -> Result<Payload, Error> {
        let rest = self.body.get(3..).unwrap_or_default();

        match self.kind {
            Kind::Register => match self.prefix() {
                Some(REQUEST) => Ok(Payload::RegisterRequest(Address::decode_entry(rest)?)),
                Some(RESPONSE) if rest == "ACK" => Ok(Payload::RegisterAck),
                _ => Err(Error::InvalidInput),
            },
            Kind::Advertise => match self.prefix() {
                Some(REQUEST) if rest.is_empty() => Ok(Payload::AdvertiseRequest),
                Some(RESPONSE) => Ok(Payload::AdvertiseResponse(Address::decode_entry(rest)?)),
                _ => Err(Error::InvalidInput),
            },
            Kind::Join => match self.body.as_str() {
                "JOIN" => Ok(Payload::Join),
                _ => Err(Error::InvalidInput),
            },
            Kind::Message => Ok(Payload::Message(self.body.clone())),
            Kind::Reunion => {
                let path = self.decode_path()?;
                match self.prefix() {
                    Some(REQUEST) => Ok(Payload::Hello(path)),
                    Some(RESPONSE) => Ok(Payload::HelloBack(path)),
                    _ => Err(Error::InvalidInput),
                }
            }
        }
    }

    fn prefix(&self) -> Option<&str> {
        self.body.get(..3)
    }

    fn decode_path(&self) -> Result<Vec<Address>, Error> {
        if self.body.len() < 5 {
            return Err(Error::InvalidInput);
        }

        let count: usize = self.body[3..5].parse().map_err(|_| Error::InvalidInput)?;
        if self.body.len() != 5 + count * ENTRY_LEN {
            return Err(Error::InvalidInput);
        }

        let mut path = Vec::with_capacity(count);
        for hop in 0..count {
            let offset = 5 + hop * ENTRY_LEN;
            path.push(Address::decode_entry(&self.body[offset..])?);
        }

        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Address {
        Address::new([127, 0, 0, 1], 31315)
    }

    fn root() -> Address {
        Address::new([127, 0, 0, 1], 5356)
    }

    #[test]
    fn register_bodies() {
        let request = Packet::register_request(client(), client());
        assert_eq!(request.body, "REQ127.000.000.00131315");
        assert_eq!(
            request.payload().unwrap(),
            Payload::RegisterRequest(client())
        );

        let ack = Packet::register_ack(root());
        assert_eq!(ack.body, "RESACK");
        assert_eq!(ack.payload().unwrap(), Payload::RegisterAck);
    }

    #[test]
    fn advertise_bodies() {
        let request = Packet::advertise_request(client());
        assert_eq!(request.body, "REQ");
        assert_eq!(request.payload().unwrap(), Payload::AdvertiseRequest);
        assert!(!request.is_advertise_response());

        let response = Packet::advertise_response(root(), root());
        assert_eq!(response.body, "RES127.000.000.00105356");
        assert_eq!(
            response.payload().unwrap(),
            Payload::AdvertiseResponse(root())
        );
        assert!(response.is_advertise_response());
    }

    #[test]
    fn reunion_round_trip() {
        let hello = Packet::hello(client(), &[client()]).unwrap();
        assert_eq!(hello.body, "REQ01127.000.000.00131315");

        let decoded = Packet::decode(&hello.encode()).unwrap();
        assert!(decoded.is_well_formed());
        assert_eq!(decoded.payload().unwrap(), Payload::Hello(vec![client()]));

        let back = Packet::hello_back(root(), &[root(), client()]).unwrap();
        assert_eq!(
            back.payload().unwrap(),
            Payload::HelloBack(vec![root(), client()])
        );
    }

    #[test]
    fn reunion_count_must_match_entries() {
        let mut hello = Packet::hello(client(), &[client()]).unwrap();
        hello.body.replace_range(3..5, "02");

        assert_eq!(hello.payload(), Err(Error::InvalidInput));
    }

    #[test]
    fn advisory_length_is_checked_separately() {
        let mut packet = Packet::message(client(), "hi");
        assert!(packet.is_well_formed());

        packet.length += 1;
        assert!(!packet.is_well_formed());
        assert!(packet.payload().is_ok());
    }

    #[test]
    fn decode_rejects_junk() {
        assert_eq!(Packet::decode(&[0u8; 8]), Err(Error::PacketTooShort));

        // Type 9 is not a known packet kind.
        let mut buffer = Packet::join(client()).encode().to_vec();
        buffer[3] = 9;
        assert_eq!(Packet::decode(&buffer), Err(Error::UnknownKind));
    }
}
