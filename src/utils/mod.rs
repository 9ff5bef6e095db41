use std::net::Ipv4Addr;

/// Cell values the LLD uses to mean "nothing planned here"
const PLACEHOLDERS: &[&str] = &["", "-", "NA", "N/A", "None", "null"];

/// Returns true if a cell value is one of the LLD placeholders for "unset"
pub fn is_placeholder(value: &str) -> bool {
    let trimmed = value.trim();
    PLACEHOLDERS.iter().any(|p| p.eq_ignore_ascii_case(trimmed))
}

/// Validate an IPv4 address (e.g., "192.168.1.1").
/// Returns true if the string is a valid dotted-decimal IPv4 address.
pub fn is_valid_ipv4(ip: &str) -> bool {
    let parts: Vec<&str> = ip.split('.').collect();
    if parts.len() != 4 {
        return false;
    }
    parts.iter().all(|p| p.parse::<u8>().is_ok())
}

/// Convert a device name to a config filename.
/// Anything outside `[A-Za-z0-9._-]` becomes `_`, e.g. "DC1/LEAF 01" -> "DC1_LEAF_01.txt"
pub fn device_config_filename(device_name: &str) -> String {
    let safe: String = device_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}.txt", safe)
}

/// Turn a spreadsheet header into a template-friendly key.
/// "Login Protocol" -> "login_protocol", "BMC-VLAN" -> "bmc_vlan"
pub fn snake_case_header(header: &str) -> String {
    let mut out = String::with_capacity(header.len());
    let mut last_underscore = true;
    for c in header.trim().chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            out.push('_');
            last_underscore = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}

/// Pull the hardware model out of an LLD device name.
/// Names look like "DC1-CE16808-LEAF-01" or "AZ2-S5731(G)-ACC-03".
pub fn model_from_device_name(name: &str) -> Option<String> {
    let re = regex_lite::Regex::new(r"-([A-Za-z]{1,2}\d{4,5})(?:\(G\))?-").ok()?;
    re.captures(name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// SNMP target host names are derived from the target address as
/// "host_name" followed by the address in 8 hex digits.
pub fn ipv4_to_host_name(ip: &str) -> Option<String> {
    let addr: Ipv4Addr = ip.trim().parse().ok()?;
    Some(format!("host_name{:08x}", u32::from(addr)))
}

/// Expand a VLAN list such as "10,12-14, 20" into sorted unique IDs.
/// Returns None if any segment is not a number or range.
pub fn parse_vlan_list(input: &str) -> Option<Vec<u16>> {
    let mut vlans = Vec::new();
    for segment in input.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        if let Some((start, end)) = segment.split_once('-') {
            let start: u16 = start.trim().parse().ok()?;
            let end: u16 = end.trim().parse().ok()?;
            if start > end {
                return None;
            }
            vlans.extend(start..=end);
        } else if let Some((start, end)) = segment.split_once(" to ") {
            let start: u16 = start.trim().parse().ok()?;
            let end: u16 = end.trim().parse().ok()?;
            if start > end {
                return None;
            }
            vlans.extend(start..=end);
        } else {
            // "10 20 30" is also accepted
            for part in segment.split_whitespace() {
                vlans.push(part.parse().ok()?);
            }
        }
    }
    vlans.sort_unstable();
    vlans.dedup();
    Some(vlans)
}

/// Format sorted VLAN IDs the way `vlan batch` expects them:
/// consecutive runs become "x to y", runs are space separated.
pub fn compact_vlan_ranges(vlans: &[u16]) -> String {
    let mut sorted = vlans.to_vec();
    sorted.sort_unstable();
    sorted.dedup();

    let mut parts: Vec<String> = Vec::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return String::new();
    };
    let (mut start, mut prev) = (first, first);
    for v in iter {
        if prev.checked_add(1) == Some(v) {
            prev = v;
            continue;
        }
        parts.push(format_run(start, prev));
        start = v;
        prev = v;
    }
    parts.push(format_run(start, prev));
    parts.join(" ")
}

fn format_run(start: u16, end: u16) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{} to {}", start, end)
    }
}

/// Name patterns that mark a device as an STP root candidate
pub fn is_stp_root_name(value: &str) -> bool {
    let lower = value.to_lowercase();
    ["cs", "spine", "core"].iter().any(|p| lower.contains(p))
}
