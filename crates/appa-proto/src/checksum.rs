use crc::{Crc, CRC_32_ISO_HDLC};

/// zlib/Ethernet CRC-32, the same one the host tool computes.
pub const PRESET_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

pub fn crc32(bytes: &[u8]) -> u32 {
    PRESET_CRC.checksum(bytes)
}
