/// Datalink layer parsing for live captures and pcap replays
///
/// The capture source decides the link type up front:
/// - Ethernet (live interfaces, most pcap files), with an optional 802.1Q tag
/// - Raw IP (tunnels, some pcap files)
/// - NULL/loopback datalink (4-byte address family header)
use pcap_file::DataLink;
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::ipv6::Ipv6Packet;
use pnet::packet::vlan::VlanPacket;
use tracing::debug;

const ETHERNET_HEADER_LEN: usize = 14;
const VLAN_HEADER_LEN: usize = 4;
const NULL_HEADER_LEN: usize = 4;

/// Represents the result of datalink parsing
#[derive(Debug)]
pub enum IpPacket<'a> {
    Ipv4(Ipv4Packet<'a>),
    Ipv6(Ipv6Packet<'a>),
    None,
}

/// Datalink format types supported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatalinkFormat {
    /// Standard Ethernet frame (14-byte header)
    Ethernet,
    /// Raw IP packet (no datalink header)
    RawIp,
    /// NULL/loopback datalink with a 4-byte header
    Null,
}

impl DatalinkFormat {
    /// Map a pcap link type to a supported format.
    #[must_use]
    pub fn from_pcap(datalink: DataLink) -> Option<Self> {
        match datalink {
            DataLink::ETHERNET => Some(DatalinkFormat::Ethernet),
            DataLink::RAW | DataLink::IPV4 | DataLink::IPV6 => Some(DatalinkFormat::RawIp),
            DataLink::NULL | DataLink::LOOP => Some(DatalinkFormat::Null),
            _ => None,
        }
    }
}

/// Extract the IP packet carried by `frame`.
///
/// Anything that is not IPv4 or IPv6 yields [`IpPacket::None`].
pub fn parse_packet(frame: &[u8], format: DatalinkFormat) -> IpPacket<'_> {
    match format {
        DatalinkFormat::Ethernet => parse_ethernet(frame),
        DatalinkFormat::RawIp => parse_raw_ip(frame),
        DatalinkFormat::Null => frame.get(NULL_HEADER_LEN..).map_or(IpPacket::None, parse_raw_ip),
    }
}

fn parse_ethernet(frame: &[u8]) -> IpPacket<'_> {
    let Some(ethernet) = EthernetPacket::new(frame) else {
        return IpPacket::None;
    };
    let payload = &frame[ETHERNET_HEADER_LEN..];

    match ethernet.get_ethertype() {
        EtherTypes::Ipv4 => Ipv4Packet::new(payload).map_or(IpPacket::None, IpPacket::Ipv4),
        EtherTypes::Ipv6 => Ipv6Packet::new(payload).map_or(IpPacket::None, IpPacket::Ipv6),
        EtherTypes::Vlan => {
            let Some(vlan) = VlanPacket::new(payload) else {
                return IpPacket::None;
            };
            let inner = &payload[VLAN_HEADER_LEN..];
            match vlan.get_ethertype() {
                EtherTypes::Ipv4 => Ipv4Packet::new(inner).map_or(IpPacket::None, IpPacket::Ipv4),
                EtherTypes::Ipv6 => Ipv6Packet::new(inner).map_or(IpPacket::None, IpPacket::Ipv6),
                other => {
                    debug!("Ignoring VLAN frame with ethertype {other}");
                    IpPacket::None
                }
            }
        }
        _ => IpPacket::None,
    }
}

fn parse_raw_ip(packet: &[u8]) -> IpPacket<'_> {
    // IP version lives in the first 4 bits
    match packet.first().map(|b| b >> 4) {
        Some(4) => Ipv4Packet::new(packet).map_or(IpPacket::None, IpPacket::Ipv4),
        Some(6) => Ipv6Packet::new(packet).map_or(IpPacket::None, IpPacket::Ipv6),
        _ => IpPacket::None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ipv4_header() -> Vec<u8> {
        vec![
            0x45, 0x00, 0x00, 0x14, 0x00, 0x00, 0x40, 0x00, 0x40, 0x06, 0x00, 0x00, 10, 0, 0, 1, 10,
            0, 0, 2,
        ]
    }

    #[test]
    fn test_ethernet_ipv4() {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&[0x08, 0x00]);
        frame.extend_from_slice(&ipv4_header());

        match parse_packet(&frame, DatalinkFormat::Ethernet) {
            IpPacket::Ipv4(ipv4) => assert_eq!(ipv4.get_source().octets(), [10, 0, 0, 1]),
            other => panic!("expected IPv4, got {other:?}"),
        }
    }

    #[test]
    fn test_ethernet_vlan_ipv4() {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&[0x81, 0x00, 0x00, 0x64, 0x08, 0x00]);
        frame.extend_from_slice(&ipv4_header());

        assert!(matches!(parse_packet(&frame, DatalinkFormat::Ethernet), IpPacket::Ipv4(_)));
    }

    #[test]
    fn test_ethernet_arp_is_ignored() {
        let mut frame = vec![0u8; 12];
        frame.extend_from_slice(&[0x08, 0x06]);
        frame.extend_from_slice(&[0u8; 28]);

        assert!(matches!(parse_packet(&frame, DatalinkFormat::Ethernet), IpPacket::None));
    }

    #[test]
    fn test_null_datalink_ipv4() {
        let mut frame = vec![0x02, 0x00, 0x00, 0x00];
        frame.extend_from_slice(&ipv4_header());

        assert!(matches!(parse_packet(&frame, DatalinkFormat::Null), IpPacket::Ipv4(_)));
    }

    #[test]
    fn test_short_frames() {
        assert!(matches!(parse_packet(&[], DatalinkFormat::Ethernet), IpPacket::None));
        assert!(matches!(parse_packet(&[0x45], DatalinkFormat::RawIp), IpPacket::None));
        assert!(matches!(parse_packet(&[0x1e, 0x00], DatalinkFormat::Null), IpPacket::None));
    }

    #[test]
    fn test_pcap_link_types() {
        assert_eq!(DatalinkFormat::from_pcap(DataLink::ETHERNET), Some(DatalinkFormat::Ethernet));
        assert_eq!(DatalinkFormat::from_pcap(DataLink::RAW), Some(DatalinkFormat::RawIp));
        assert_eq!(DatalinkFormat::from_pcap(DataLink::NULL), Some(DatalinkFormat::Null));
    }
}
