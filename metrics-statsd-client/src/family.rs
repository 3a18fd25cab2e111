use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, Ipv6Addr},
};

use hickory_resolver::proto::rr::RecordType;

/// Address family used to reach the StatsD server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IPv4, resolved through `A` records.
    #[default]
    Ipv4,

    /// IPv6, resolved through `AAAA` records.
    Ipv6,
}

impl AddressFamily {
    /// Selects the family from an "use IPv6" flag.
    pub const fn from_ipv6(ipv6: bool) -> Self {
        if ipv6 {
            AddressFamily::Ipv6
        } else {
            AddressFamily::Ipv4
        }
    }

    /// Returns the DNS record type queried for this family.
    pub const fn record_type(self) -> RecordType {
        match self {
            AddressFamily::Ipv4 => RecordType::A,
            AddressFamily::Ipv6 => RecordType::AAAA,
        }
    }

    /// Returns the unspecified address of this family, used when binding the local socket.
    pub const fn unspecified(self) -> IpAddr {
        match self {
            AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        }
    }

    /// Returns `true` if the given address belongs to this family.
    pub const fn contains(self, ip: &IpAddr) -> bool {
        match self {
            AddressFamily::Ipv4 => ip.is_ipv4(),
            AddressFamily::Ipv6 => ip.is_ipv6(),
        }
    }

    /// Attempts to parse `host` as a literal address of this family.
    ///
    /// A parse failure is not an error: it means the host is a name that has to be resolved.
    pub fn parse_literal(self, host: &str) -> Option<IpAddr> {
        match self {
            AddressFamily::Ipv4 => host.parse::<Ipv4Addr>().ok().map(IpAddr::V4),
            AddressFamily::Ipv6 => host.parse::<Ipv6Addr>().ok().map(IpAddr::V6),
        }
    }

    /// Returns a short identifier for the family, such as `ipv4`.
    pub const fn as_str(self) -> &'static str {
        match self {
            AddressFamily::Ipv4 => "ipv4",
            AddressFamily::Ipv6 => "ipv6",
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    use hickory_resolver::proto::rr::RecordType;

    use super::AddressFamily;

    #[test]
    fn record_types() {
        assert_eq!(AddressFamily::Ipv4.record_type(), RecordType::A);
        assert_eq!(AddressFamily::Ipv6.record_type(), RecordType::AAAA);
        assert_eq!(AddressFamily::from_ipv6(false), AddressFamily::Ipv4);
        assert_eq!(AddressFamily::from_ipv6(true), AddressFamily::Ipv6);
    }

    #[test]
    fn parse_literal() {
        // Cases are defined as: family, host, expected literal.
        let cases = [
            (AddressFamily::Ipv4, "127.0.0.1", Some(IpAddr::V4(Ipv4Addr::LOCALHOST))),
            (AddressFamily::Ipv4, "::1", None),
            (AddressFamily::Ipv4, "localhost", None),
            (AddressFamily::Ipv6, "::1", Some(IpAddr::V6(Ipv6Addr::LOCALHOST))),
            (AddressFamily::Ipv6, "127.0.0.1", None),
            (AddressFamily::Ipv6, "statsd.example.com", None),
        ];

        for (family, host, expected) in cases {
            assert_eq!(family.parse_literal(host), expected, "{family} / {host}");
        }
    }

    #[test]
    fn unspecified_matches_family() {
        for family in [AddressFamily::Ipv4, AddressFamily::Ipv6] {
            assert!(family.contains(&family.unspecified()));
            assert!(family.unspecified().is_unspecified());
        }
    }
}
