//! Structural validation for HSI writes.
//!
//! Range checks apply only to values that parse as integers; non-numeric
//! user ids are legal legacy identifiers and pass through.

use std::net::Ipv4Addr;

use super::types::HsiConfig;
use super::HsiError;
use crate::util::parse_ip_range;

pub const USER_ID_MIN: i64 = 1;
pub const USER_ID_MAX: i64 = 2000;
pub const VLAN_ID_MIN: i64 = 2;
pub const VLAN_ID_MAX: i64 = 4000;

/// Validate an incoming HSI config. The first failing check terminates
/// the request; checks run in the order fields appear on the wire.
pub fn validate_config(config: &HsiConfig) -> Result<(), HsiError> {
    let required: [(&str, &str); 7] = [
        (config.user_id.as_str(), "User ID"),
        (config.vlan_id.as_str(), "VLAN ID"),
        (config.account_name.as_str(), "Account Name"),
        (config.password.as_str(), "Password"),
        (config.dhcp_addr_pool.as_str(), "DHCP Address Pool"),
        (config.dhcp_subnet.as_str(), "DHCP Subnet"),
        (config.dhcp_gateway.as_str(), "DHCP Gateway"),
    ];
    for (value, name) in required {
        if value.is_empty() {
            return Err(HsiError::MissingField(name));
        }
    }

    if let Ok(user_id) = config.user_id.parse::<i64>() {
        if !(USER_ID_MIN..=USER_ID_MAX).contains(&user_id) {
            return Err(HsiError::UserIdOutOfRange);
        }
    }

    if let Ok(vlan_id) = config.vlan_id.parse::<i64>() {
        if !(VLAN_ID_MIN..=VLAN_ID_MAX).contains(&vlan_id) {
            return Err(HsiError::VlanIdOutOfRange);
        }
    }

    validate_dhcp(config)
}

fn validate_dhcp(config: &HsiConfig) -> Result<(), HsiError> {
    let (start, end) =
        parse_ip_range(&config.dhcp_addr_pool).map_err(|e| HsiError::InvalidPool(e.to_string()))?;

    for ip in [start, end] {
        if !ip.is_private() {
            return Err(HsiError::InvalidPool(format!(
                "{ip} is not a private IPv4 address"
            )));
        }
        let last_octet = ip.octets()[3];
        if last_octet == 0 || last_octet == 255 {
            return Err(HsiError::InvalidPool(format!(
                "{ip} is a network or broadcast address"
            )));
        }
    }
    if u32::from(start) > u32::from(end) {
        return Err(HsiError::InvalidPool(
            "pool start is after pool end".to_string(),
        ));
    }

    let subnet: Ipv4Addr = config
        .dhcp_subnet
        .parse()
        .map_err(|_| HsiError::InvalidSubnet(config.dhcp_subnet.clone()))?;
    let gateway: Ipv4Addr = config
        .dhcp_gateway
        .parse()
        .map_err(|_| HsiError::InvalidGateway(config.dhcp_gateway.clone()))?;

    let mask = u32::from(subnet);
    if u32::from(gateway) & mask != u32::from(start) & mask {
        return Err(HsiError::GatewayOffSubnet);
    }

    let gw = u32::from(gateway);
    if (u32::from(start)..=u32::from(end)).contains(&gw) {
        return Err(HsiError::GatewayInsidePool);
    }

    Ok(())
}
