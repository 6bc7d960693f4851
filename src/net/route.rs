//! 路由记录与 IP 头

use std::fmt;

use super::family::AddressFamily;
use super::id::DeviceId;

/// 解析出的下一跳路由
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route<F: AddressFamily> {
    pub destination: F::Addr,
    pub source: F::Addr,
    pub gateway: F::Addr,
    pub output_device: DeviceId,
}

impl<F: AddressFamily> fmt::Display for Route<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} via {} src {} dev {}",
            self.destination, self.gateway, self.source, self.output_device.0
        )
    }
}

/// 路由协议看到的 IP 头字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpHeader<F: AddressFamily> {
    pub source: F::Addr,
    pub destination: F::Addr,
    pub ttl: u8,
}

impl<F: AddressFamily> IpHeader<F> {
    pub fn new(source: F::Addr, destination: F::Addr, ttl: u8) -> Self {
        Self {
            source,
            destination,
            ttl,
        }
    }
}
