use axp_mem::PagePerm;
use axp_types::Asn;

/// One resident TLB entry, indexed by (VPN, ASN) with an optional "global"
/// flag matching on VPN alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlbEntry {
    pub vpn: u64,
    pub asn: Asn,
    pub ppn: u64,
    pub global: bool,
    pub perm: PagePerm,
}

impl TlbEntry {
    pub fn matches(&self, vpn: u64, asn: Asn) -> bool {
        self.vpn == vpn && (self.global || self.asn == asn)
    }
}
