//! Portable port options and their translation into the platform vocabulary.
//!
//! The translation is table driven. Values the table does not know are passed
//! through unchanged so that newer platforms can accept them without a change
//! here.

use serde::{Deserialize, Serialize};

/// Default bitrate used when nothing else is configured.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
    Mark,
    Space,
}

/// Options describing a connection, independent of any platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortableOptions {
    /// Baud rate (bits per second).
    pub baud_rate: u32,

    /// Number of data bits, normally 7 or 8.
    pub data_bits: u8,

    /// Number of stop bits, normally 1 or 2.
    pub stop_bits: u8,

    /// Parity checking mode.
    pub parity: Parity,

    /// RTS/CTS hardware flow control.
    pub rtscts: bool,
}

impl Default for PortableOptions {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            stop_bits: 1,
            parity: Parity::None,
            rtscts: false,
        }
    }
}

impl PortableOptions {
    pub fn with_baud_rate(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }
}

/// Control lines a caller may set on an open connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SetOptions {
    /// Break condition. Not carried by this binding.
    pub brk: bool,
    pub dtr: Option<bool>,
    pub rts: Option<bool>,
}

/// Data bits as the platform spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeDataBits {
    Seven,
    Eight,
    #[serde(untagged)]
    Unmapped(u8),
}

/// Stop bits as the platform spells them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeStopBits {
    One,
    Two,
    #[serde(untagged)]
    Unmapped(u8),
}

/// Parity as the platform spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NativeParity {
    No,
    Odd,
    Even,
    Mark,
    Space,
}

/// Connection options in the platform's vocabulary.
///
/// Derived one way from [`PortableOptions`]; nothing reads it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeOptions {
    /// Always true: reads stay held until the binding's listener is attached.
    pub paused: bool,
    pub persistent: bool,
    pub bitrate: u32,
    pub data_bits: NativeDataBits,
    /// The mapped parity. Some platform glue also sends the raw portable
    /// parity under this key alongside a mapped `parity` field; only the
    /// mapped value is carried here.
    pub parity_bit: NativeParity,
    pub stop_bits: NativeStopBits,
    pub cts_flow_control: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_timeout_ms: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_timeout_ms: Option<u32>,
}

impl From<&PortableOptions> for NativeOptions {
    fn from(options: &PortableOptions) -> Self {
        translate(options)
    }
}

/// Translate portable options into the platform's option vocabulary.
pub fn translate(options: &PortableOptions) -> NativeOptions {
    NativeOptions {
        paused: true,
        persistent: false,
        bitrate: options.baud_rate,
        data_bits: translate_data_bits(options.data_bits),
        parity_bit: translate_parity(options.parity),
        stop_bits: translate_stop_bits(options.stop_bits),
        cts_flow_control: options.rtscts,
        name: None,
        buffer_size: None,
        receive_timeout_ms: None,
        send_timeout_ms: None,
    }
}

fn translate_data_bits(bits: u8) -> NativeDataBits {
    match bits {
        7 => NativeDataBits::Seven,
        8 => NativeDataBits::Eight,
        other => NativeDataBits::Unmapped(other),
    }
}

fn translate_stop_bits(bits: u8) -> NativeStopBits {
    match bits {
        1 => NativeStopBits::One,
        2 => NativeStopBits::Two,
        other => NativeStopBits::Unmapped(other),
    }
}

fn translate_parity(parity: Parity) -> NativeParity {
    match parity {
        Parity::None => NativeParity::No,
        Parity::Odd => NativeParity::Odd,
        Parity::Even => NativeParity::Even,
        Parity::Mark => NativeParity::Mark,
        Parity::Space => NativeParity::Space,
    }
}
