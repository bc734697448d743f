use crate::common::data::RelayRequest;

/// The header this proxy stamps on its own traffic. It is stripped before
/// relaying, like the canonical hop-by-hop set.
pub const PROXY_IDENTIFYING_HEADER: &str = "x-httprelay-version";

const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    PROXY_IDENTIFYING_HEADER,
];

pub fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS.iter().any(|h| h.eq_ignore_ascii_case(name))
}

/// Returns a copy of the request with every hop-by-hop header removed. All
/// remaining headers keep their original order and spelling.
pub fn strip_hop_by_hop(request: &RelayRequest) -> RelayRequest {
    let headers = request
        .headers()
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name))
        .cloned()
        .collect();

    request.with_headers(headers)
}
