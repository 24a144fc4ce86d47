pub mod ethertype {
    pub const IPV4: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const IPV6: u16 = 0x86DD;
}

pub mod ip_proto {
    pub const ICMP: u8 = 1;
    pub const TCP: u8 = 6;
    pub const UDP: u8 = 17;
}

pub mod ipv4_option {
    pub const END_OF_LIST: u8 = 0;
    pub const NO_OPERATION: u8 = 1;
    pub const RECORD_ROUTE: u8 = 7;
    pub const TIMESTAMP: u8 = 68;
    pub const LOOSE_SOURCE_ROUTE: u8 = 131;
    pub const STRICT_SOURCE_ROUTE: u8 = 137;
}

pub mod tcp_option {
    pub const END_OF_LIST: u8 = 0;
    pub const NO_OPERATION: u8 = 1;
    pub const MAXIMUM_SEGMENT_SIZE: u8 = 2;
    pub const WINDOW_SCALE: u8 = 3;
    pub const TIMESTAMPS: u8 = 8;
}

/// EtherType decoded once from the Ethernet header and matched by the
/// pipeline to decide whether an IPv4 layer follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EtherType {
    Ipv4,
    Arp,
    Ipv6,
    Unsupported(u16),
}

impl EtherType {
    pub fn value(self) -> u16 {
        match self {
            Self::Ipv4 => ethertype::IPV4,
            Self::Arp => ethertype::ARP,
            Self::Ipv6 => ethertype::IPV6,
            Self::Unsupported(other) => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ipv4 => "IPv4",
            Self::Arp => "ARP",
            Self::Ipv6 => "IPv6",
            Self::Unsupported(_) => "Unsupported",
        }
    }
}

impl From<u16> for EtherType {
    fn from(value: u16) -> Self {
        match value {
            ethertype::IPV4 => Self::Ipv4,
            ethertype::ARP => Self::Arp,
            ethertype::IPV6 => Self::Ipv6,
            other => Self::Unsupported(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpProtocol {
    Icmp,
    Tcp,
    Udp,
    Unsupported(u8),
}

impl IpProtocol {
    pub fn value(self) -> u8 {
        match self {
            Self::Icmp => ip_proto::ICMP,
            Self::Tcp => ip_proto::TCP,
            Self::Udp => ip_proto::UDP,
            Self::Unsupported(other) => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Icmp => "ICMP",
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Unsupported(_) => "Unsupported",
        }
    }
}

impl From<u8> for IpProtocol {
    fn from(value: u8) -> Self {
        match value {
            ip_proto::ICMP => Self::Icmp,
            ip_proto::TCP => Self::Tcp,
            ip_proto::UDP => Self::Udp,
            other => Self::Unsupported(other),
        }
    }
}
