//! CDN classification by published provider IP ranges.

use std::net::IpAddr;

use ipnet::IpNet;
use once_cell::sync::Lazy;

/// Provider name → published ranges. Parsed once on first use.
static PROVIDER_RANGES: Lazy<Vec<(&'static str, Vec<IpNet>)>> = Lazy::new(|| {
    let table: &[(&str, &[&str])] = &[
        (
            "cloudflare",
            &[
                "104.16.0.0/13",
                "104.24.0.0/14",
                "108.162.192.0/18",
                "131.0.72.0/22",
                "141.101.64.0/18",
                "162.158.0.0/15",
                "172.64.0.0/13",
                "173.245.48.0/20",
                "188.114.96.0/20",
                "190.93.240.0/20",
                "197.234.240.0/22",
                "198.41.128.0/17",
            ],
        ),
        (
            "fastly",
            &[
                "23.235.32.0/20",
                "43.249.72.0/22",
                "103.244.50.0/24",
                "146.75.0.0/17",
                "151.101.0.0/16",
                "157.52.64.0/18",
                "199.232.0.0/16",
            ],
        ),
        (
            "cloudfront",
            &[
                "13.32.0.0/15",
                "13.224.0.0/14",
                "52.84.0.0/15",
                "54.230.0.0/16",
                "99.84.0.0/16",
                "204.246.164.0/22",
                "205.251.192.0/19",
            ],
        ),
        (
            "akamai",
            &[
                "2.16.0.0/13",
                "23.32.0.0/11",
                "23.192.0.0/11",
                "95.100.0.0/15",
                "104.64.0.0/10",
                "184.24.0.0/13",
            ],
        ),
        (
            "incapsula",
            &[
                "45.64.64.0/22",
                "103.28.248.0/22",
                "149.126.72.0/21",
                "185.11.124.0/22",
                "192.230.64.0/18",
                "198.143.32.0/19",
                "199.83.128.0/21",
            ],
        ),
    ];

    table
        .iter()
        .map(|(provider, ranges)| {
            let nets = ranges
                .iter()
                .filter_map(|range| range.parse::<IpNet>().ok())
                .collect();
            (*provider, nets)
        })
        .collect()
});

/// Returns the CDN provider owning `ip`, if any.
pub fn check(ip: &str) -> Option<&'static str> {
    let address: IpAddr = ip.parse().ok()?;
    PROVIDER_RANGES
        .iter()
        .find(|(_, ranges)| ranges.iter().any(|net| net.contains(&address)))
        .map(|(provider, _)| *provider)
}

/// Classifies a set of addresses; the first CDN hit wins.
pub fn classify<'a, I>(addresses: I) -> Option<&'static str>
where
    I: IntoIterator<Item = &'a String>,
{
    addresses.into_iter().find_map(|ip| check(ip))
}
