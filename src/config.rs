//! Build-time configuration of the wire format and of the safety checks.

use crate::endian::Endianness;

/// Compile-time knobs for adapters.
///
/// A configuration is a zero-sized marker type; adapters carry it as a type
/// parameter so every knob resolves at compile time. The defaults match the
/// wire format's defaults: little-endian, all checks on, sessions available.
pub trait Config: 'static {
    /// Byte order of multi-byte fundamentals on the wire.
    const ENDIANNESS: Endianness = Endianness::Little;

    /// When reading, validate decoded data (size prefixes against their
    /// maximums, alignment padding bits, bool bytes, value ranges). When
    /// off, the reader assumes the stream is well formed.
    const CHECK_DATA_ERRORS: bool = true;

    /// Guard every adapter read with bounds checks. Turning this off trades
    /// the `DataOverflow` error for debug-assertions and trusts the program.
    const CHECK_ADAPTER_ERRORS: bool = true;

    /// Pay for session bookkeeping. With this off, `begin_session` panics.
    const SESSIONS: bool = true;
}

/// The stock configuration: little-endian wire, every check enabled.
pub struct DefaultConfig;

impl Config for DefaultConfig {}

/// Little-endian wire with data validation off; adapter bounds checks stay.
pub struct TrustedDataConfig;

impl Config for TrustedDataConfig {
    const CHECK_DATA_ERRORS: bool = false;
}

/// Big-endian wire, otherwise identical to `DefaultConfig`.
pub struct BigEndianConfig;

impl Config for BigEndianConfig {
    const ENDIANNESS: Endianness = Endianness::Big;
}
