//! Order-preserving encoding of composite keys into a single descriptor.
//!
//! A [`KeyCodec`] packs one descriptor per key column into a `u64`, first
//! column in the most significant bits. Each column's own encoding is order
//! preserving, so comparing descriptors compares key tuples.
//!
//! When the columns together need more than 64 bits, bits are allotted to
//! the smallest columns first, and each larger column keeps only the top
//! bits of its domain. Values generated through the codec then use a
//! subset of each column's domain, still in order.

use crate::data_type::{DataType, Value};

/// Bijective, order-preserving mapping between a descriptor and key values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyCodec {
    columns: Vec<DataType>,
    /// Bits allotted to each column, aligned with `columns`.
    bits: Vec<u32>,
    domain_bits: u32,
}

impl KeyCodec {
    /// Creates a codec for the given key column types, in key order.
    pub fn new(columns: Vec<DataType>) -> Self {
        let bits = allot_bits(&columns);
        let domain_bits = bits.iter().sum();
        Self {
            columns,
            bits,
            domain_bits,
        }
    }

    /// Number of bits in the descriptor domain (at most 64).
    pub fn domain_bits(&self) -> u32 {
        self.domain_bits
    }

    /// Number of key columns.
    pub fn arity(&self) -> usize {
        self.columns.len()
    }

    /// Bits allotted to each column.
    pub fn column_bits(&self) -> &[u32] {
        &self.bits
    }

    /// Maps a full-width random number into the descriptor domain.
    pub fn adjust(&self, raw: u64) -> u64 {
        match self.domain_bits {
            0 => 0,
            64 => raw,
            bits => raw >> (64 - bits),
        }
    }

    /// Adds two descriptors modulo the descriptor domain.
    pub fn wrapping_add(&self, descriptor: u64, offset: u64) -> u64 {
        self.adjust_low(descriptor.wrapping_add(offset))
    }

    /// Decodes a descriptor into one value per key column.
    pub fn inflate(&self, descriptor: u64) -> Vec<Value> {
        let mut shift = self.domain_bits;
        self.columns
            .iter()
            .zip(&self.bits)
            .map(|(data_type, &bits)| {
                shift -= bits;
                if bits == 0 {
                    return data_type.inflate(0);
                }
                let part = (descriptor >> shift) & low_mask(bits);
                data_type.inflate(part << (data_type.entropy_bits() - bits))
            })
            .collect()
    }

    /// Encodes key values back into a descriptor.
    ///
    /// Returns `None` if the arity or a type does not match, or if a value
    /// falls outside the part of its column's domain the codec generates.
    pub fn deflate(&self, values: &[Value]) -> Option<u64> {
        if values.len() != self.columns.len() {
            return None;
        }
        let mut descriptor = 0u64;
        for ((data_type, &bits), value) in self.columns.iter().zip(&self.bits).zip(values) {
            let dropped = data_type.entropy_bits() - bits;
            let column = data_type.deflate(value)?;
            if dropped > 0 && column & low_mask(dropped) != 0 {
                return None;
            }
            let part = if dropped >= 64 { 0 } else { column >> dropped };
            descriptor = if bits >= 64 {
                part
            } else {
                (descriptor << bits) | part
            };
        }
        Some(descriptor)
    }

    fn adjust_low(&self, value: u64) -> u64 {
        value & low_mask(self.domain_bits)
    }
}

fn low_mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Allots descriptor bits to columns, smallest entropy first.
///
/// Each column receives at most an even share of what is left, so a single
/// wide column cannot starve the narrow ones.
fn allot_bits(columns: &[DataType]) -> Vec<u32> {
    let total: u32 = columns.iter().map(DataType::entropy_bits).sum();
    if total <= 64 {
        return columns.iter().map(DataType::entropy_bits).collect();
    }

    let mut order: Vec<usize> = (0..columns.len()).collect();
    order.sort_by_key(|&i| columns[i].entropy_bits());

    let mut bits = vec![0; columns.len()];
    let mut remaining = 64u32;
    for (placed, &i) in order.iter().enumerate() {
        let left = (columns.len() - placed) as u32;
        let share = remaining / left;
        bits[i] = columns[i].entropy_bits().min(share);
        remaining -= bits[i];
    }
    bits
}
