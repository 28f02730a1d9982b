//! # Port Catalog
//!
//! Static mapping of well-known TCP ports to service names. The default table
//! is built once per process and shared read-only by every probe.

use std::collections::BTreeMap;
use std::sync::OnceLock;

const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (7, "echo"),
    (9, "discard"),
    (13, "daytime"),
    (19, "chargen"),
    (20, "ftp-data"),
    (21, "ftp"),
    (22, "ssh"),
    (23, "telnet"),
    (25, "smtp"),
    (37, "time"),
    (43, "whois"),
    (49, "tacacs"),
    (53, "domain"),
    (67, "dhcps"),
    (69, "tftp"),
    (70, "gopher"),
    (79, "finger"),
    (80, "http"),
    (81, "http-alt"),
    (88, "kerberos"),
    (102, "iso-tsap"),
    (106, "pop3pw"),
    (110, "pop3"),
    (111, "rpcbind"),
    (113, "ident"),
    (119, "nntp"),
    (123, "ntp"),
    (135, "msrpc"),
    (137, "netbios-ns"),
    (139, "netbios-ssn"),
    (143, "imap"),
    (161, "snmp"),
    (162, "snmptrap"),
    (179, "bgp"),
    (194, "irc"),
    (389, "ldap"),
    (427, "svrloc"),
    (443, "https"),
    (444, "snpp"),
    (445, "microsoft-ds"),
    (464, "kpasswd"),
    (465, "smtps"),
    (500, "isakmp"),
    (512, "exec"),
    (513, "login"),
    (514, "shell"),
    (515, "printer"),
    (520, "rip"),
    (543, "klogin"),
    (544, "kshell"),
    (548, "afp"),
    (554, "rtsp"),
    (587, "submission"),
    (631, "ipp"),
    (636, "ldaps"),
    (646, "ldp"),
    (873, "rsync"),
    (990, "ftps"),
    (993, "imaps"),
    (995, "pop3s"),
    (1025, "nfs-or-iis"),
    (1080, "socks"),
    (1194, "openvpn"),
    (1433, "ms-sql-s"),
    (1521, "oracle"),
    (1723, "pptp"),
    (1883, "mqtt"),
    (1900, "upnp"),
    (2049, "nfs"),
    (2082, "cpanel"),
    (2083, "cpanel-ssl"),
    (2181, "zookeeper"),
    (2375, "docker"),
    (2376, "docker-s"),
    (3000, "ppp"),
    (3128, "squid-http"),
    (3268, "globalcatldap"),
    (3306, "mysql"),
    (3389, "ms-wbt-server"),
    (3690, "svn"),
    (4369, "epmd"),
    (5000, "upnp-alt"),
    (5060, "sip"),
    (5432, "postgresql"),
    (5672, "amqp"),
    (5900, "vnc"),
    (5985, "wsman"),
    (6379, "redis"),
    (6667, "irc-alt"),
    (8000, "http-alt2"),
    (8008, "http-proxy"),
    (8080, "http-proxy-alt"),
    (8443, "https-alt"),
    (8888, "sun-answerbook"),
    (9000, "cslistener"),
    (9090, "zeus-admin"),
    (9100, "jetdirect"),
    (9200, "elasticsearch"),
    (11211, "memcache"),
    (27017, "mongod"),
];

static WELL_KNOWN: OnceLock<PortCatalog> = OnceLock::new();

/// Immutable port → service name table.
///
/// Iteration is ascending by port number. Nothing relies on that order for
/// correctness; it only keeps reports stable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PortCatalog {
    entries: BTreeMap<u16, &'static str>,
}

impl PortCatalog {
    /// The built-in table, initialized on first use.
    pub fn well_known() -> &'static PortCatalog {
        WELL_KNOWN.get_or_init(|| WELL_KNOWN_PORTS.iter().copied().collect())
    }

    pub fn service_name(&self, port: u16) -> Option<&'static str> {
        self.entries.get(&port).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &'static str)> + '_ {
        self.entries.iter().map(|(port, name)| (*port, *name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(u16, &'static str)> for PortCatalog {
    fn from_iter<T: IntoIterator<Item = (u16, &'static str)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
