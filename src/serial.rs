//! Random certificate serial numbers, unique within one run.

use std::collections::HashSet;

use anyhow::{anyhow, Result};
use openssl::asn1::Asn1Integer;
use openssl::bn::{BigNum, MsbOption};

const SERIAL_BITS: i32 = 128;

#[derive(Debug, Default)]
pub struct SerialAllocator {
    issued: HashSet<Vec<u8>>,
}

impl SerialAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw a fresh random 128-bit serial that this allocator has not handed out yet.
    pub fn next_serial(&mut self) -> Result<Asn1Integer> {
        loop {
            let mut serial = BigNum::new()?;
            serial
                .rand(SERIAL_BITS, MsbOption::MAYBE_ZERO, false)
                .map_err(|e| anyhow!("Failed to generate serial number: {}", e))?;
            // Zero is not a valid serial
            if serial.num_bits() == 0 {
                continue;
            }
            if self.issued.insert(serial.to_vec()) {
                return serial
                    .to_asn1_integer()
                    .map_err(|e| anyhow!("Failed to encode serial number: {}", e));
            }
        }
    }
}
