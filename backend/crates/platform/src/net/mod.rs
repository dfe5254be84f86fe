//! Network address utilities
//!
//! - [`cidr`] - bit-exact CIDR membership for IPv4 and IPv6
//! - [`reserved`] - private and reserved range classification

pub mod cidr;
pub mod reserved;

pub use cidr::{CidrBlock, CidrParseError, is_ip_in_cidr, parse_cidr_list, parse_ip};
pub use reserved::is_private_or_reserved;
