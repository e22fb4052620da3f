//! TLS记录头识别模块
//!
//! 只检查TLS记录层的5字节头部，用来确认交接偏移之后的数据确实是TLS。

/// TLS记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TlsRecordType {
    /// 改变密码规范
    ChangeCipherSpec = 0x14,
    /// 警报
    Alert = 0x15,
    /// 握手
    Handshake = 0x16,
    /// 应用数据
    ApplicationData = 0x17,
}

impl TlsRecordType {
    /// 从u8值创建TLS记录类型
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x14 => Some(TlsRecordType::ChangeCipherSpec),
            0x15 => Some(TlsRecordType::Alert),
            0x16 => Some(TlsRecordType::Handshake),
            0x17 => Some(TlsRecordType::ApplicationData),
            _ => None,
        }
    }
}

/// TLS记录头长度
pub const TLS_RECORD_HEADER_LEN: usize = 5;

/// 记录负载的最大长度（2^14 加上密文扩展）
pub const TLS_MAX_RECORD_PAYLOAD: usize = (1 << 14) + 2048;

/// TLS记录头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsRecordHeader {
    /// 记录类型
    pub record_type: TlsRecordType,
    /// 协议版本（主版本，次版本）
    pub version: (u8, u8),
    /// 负载长度
    pub length: u16,
}

impl TlsRecordHeader {
    /// 解析记录头，数据不足或不像TLS时返回 `None`
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < TLS_RECORD_HEADER_LEN {
            return None;
        }

        let record_type = TlsRecordType::from_u8(data[0])?;
        if data[1] != 0x03 || data[2] > 0x04 {
            return None;
        }

        let length = u16::from_be_bytes([data[3], data[4]]);
        if length == 0 || length as usize > TLS_MAX_RECORD_PAYLOAD {
            return None;
        }

        Some(Self {
            record_type,
            version: (data[1], data[2]),
            length,
        })
    }

    /// 记录总长度（含头部）
    pub fn record_len(&self) -> usize {
        TLS_RECORD_HEADER_LEN + self.length as usize
    }
}

/// 数据是否以TLS记录开头
pub fn looks_like_tls(data: &[u8]) -> bool {
    TlsRecordHeader::parse(data).is_some()
}
