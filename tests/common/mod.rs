#![allow(dead_code)]

/// Smallest ClientHello accepted: two cipher suites, null compression, empty
/// extensions block. Random is 0x00..0x1f.
pub const MINIMAL_HELLO: &str = "160301002a010000260303000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f0000041301130201000000";

/// Browser-like ClientHello with GREASE in ciphers, extensions, groups, key
/// share and supported versions, SNI `example.com` and ALPN h2/http1.1.
pub const BROWSER_HELLO: &str = concat!(
    "1603010124010001200303000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
    "207777777777777777777777777777777777777777777777777777777777777777",
    "000e0a0a130113021303c02bc02fcca9",
    "0100",
    "00c9",
    "dada0000",
    "00000010000e00000b6578616d706c652e636f6d",
    "00170000",
    "ff01000100",
    "000a000a00082a2a001d00170018",
    "000b00020100",
    "00230000",
    "0010000e000c02683208687474702f312e31",
    "000500050100000000",
    "000d0012001004030804040105030805050108060601",
    "00120000",
    "0033002b00293a3a000100001d00204242424242424242424242424242424242424242424242424242424242424242",
    "002d00020101",
    "002b0007065a5a03040303",
    "001b0003020002",
    "001c00024001",
    "446900050003026832",
    "1a1a000100",
);

pub fn decode(hex_str: &str) -> Vec<u8> {
    hex::decode(hex_str).expect("fixture is valid hex")
}

pub fn minimal_hello() -> Vec<u8> {
    decode(MINIMAL_HELLO)
}

pub fn browser_hello() -> Vec<u8> {
    decode(BROWSER_HELLO)
}

/// Wrap an extensions block into a full ClientHello record with fixed
/// ciphers (0x1301, 0x1302) and null compression.
pub fn client_hello_with_extensions(extensions: &[u8]) -> Vec<u8> {
    let mut body = vec![0x03, 0x03];
    body.extend_from_slice(&[0u8; 32]);
    body.push(0x00);
    body.extend_from_slice(&[0x00, 0x04, 0x13, 0x01, 0x13, 0x02]);
    body.extend_from_slice(&[0x01, 0x00]);
    body.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
    body.extend_from_slice(extensions);

    let mut handshake = vec![0x01];
    handshake.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    handshake.extend_from_slice(&body);

    let mut record = vec![0x16, 0x03, 0x01];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

/// One extension: type, length, body.
pub fn extension(code: u16, body: &[u8]) -> Vec<u8> {
    let mut ext = code.to_be_bytes().to_vec();
    ext.extend_from_slice(&(body.len() as u16).to_be_bytes());
    ext.extend_from_slice(body);
    ext
}

pub const SERVER_IP: [u8; 4] = [192, 0, 2, 10];
pub const SERVER_PORT: u16 = 8443;

/// IPv4 packet carrying a TCP segment with `payload`.
pub fn ipv4_tcp_packet(source: [u8; 4], source_port: u16, dest_port: u16, payload: &[u8]) -> Vec<u8> {
    let segment = tcp_segment(source_port, dest_port, payload);
    let total_len = (20 + segment.len()) as u16;

    let mut packet = vec![0x45, 0x00];
    packet.extend_from_slice(&total_len.to_be_bytes());
    packet.extend_from_slice(&[0x00, 0x01, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00]);
    packet.extend_from_slice(&source);
    packet.extend_from_slice(&SERVER_IP);
    packet.extend_from_slice(&segment);
    packet
}

/// Ethernet frame around [`ipv4_tcp_packet`].
pub fn ethernet_ipv4_tcp(source: [u8; 4], source_port: u16, dest_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut frame = ethernet_header(0x0800);
    frame.extend_from_slice(&ipv4_tcp_packet(source, source_port, dest_port, payload));
    frame
}

/// Ethernet frame with an IPv6 packet carrying a TCP segment.
pub fn ethernet_ipv6_tcp(source: [u8; 16], source_port: u16, dest_port: u16, payload: &[u8]) -> Vec<u8> {
    let segment = tcp_segment(source_port, dest_port, payload);

    let mut frame = ethernet_header(0x86dd);
    frame.extend_from_slice(&[0x60, 0x00, 0x00, 0x00]);
    frame.extend_from_slice(&(segment.len() as u16).to_be_bytes());
    frame.extend_from_slice(&[0x06, 0x40]);
    frame.extend_from_slice(&source);
    let mut destination = [0u8; 16];
    destination[15] = 1;
    frame.extend_from_slice(&destination);
    frame.extend_from_slice(&segment);
    frame
}

/// Ethernet frame with an IPv4/UDP datagram.
pub fn ethernet_ipv4_udp(source: [u8; 4], source_port: u16, dest_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut datagram = source_port.to_be_bytes().to_vec();
    datagram.extend_from_slice(&dest_port.to_be_bytes());
    datagram.extend_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    datagram.extend_from_slice(&[0x00, 0x00]);
    datagram.extend_from_slice(payload);

    let mut frame = ethernet_header(0x0800);
    frame.extend_from_slice(&[0x45, 0x00]);
    frame.extend_from_slice(&((20 + datagram.len()) as u16).to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x01, 0x40, 0x00, 0x40, 0x11, 0x00, 0x00]);
    frame.extend_from_slice(&source);
    frame.extend_from_slice(&SERVER_IP);
    frame.extend_from_slice(&datagram);
    frame
}

fn ethernet_header(ethertype: u16) -> Vec<u8> {
    let mut header = vec![0x02, 0x00, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x00, 0x00, 0x00, 0x02];
    header.extend_from_slice(&ethertype.to_be_bytes());
    header
}

fn tcp_segment(source_port: u16, dest_port: u16, payload: &[u8]) -> Vec<u8> {
    let mut segment = source_port.to_be_bytes().to_vec();
    segment.extend_from_slice(&dest_port.to_be_bytes());
    segment.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0]);
    // Data offset 5 words, PSH|ACK
    segment.extend_from_slice(&[0x50, 0x18, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00]);
    segment.extend_from_slice(payload);
    segment
}
