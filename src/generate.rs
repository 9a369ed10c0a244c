//! Random key-value data sets for exercising the sorter

use crate::record::Record;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::{self, Write};
use std::ops::RangeInclusive;

/// Length range of generated values
pub const VALUE_LENGTH: RangeInclusive<usize> = 5..=15;

/// Draw one record with a uniform `u64` key and an alphanumeric value
pub fn random_record<R: Rng + ?Sized>(rng: &mut R) -> Record {
    let key = rng.gen::<u64>();
    let len = rng.gen_range(VALUE_LENGTH);
    let value: Vec<u8> = (0..len).map(|_| rng.sample(Alphanumeric)).collect();
    Record::new(key, value, 0)
}

/// Write `lines` random records in `<key>:<value>` form
pub fn write_dataset<W: Write, R: Rng + ?Sized>(
    writer: &mut W,
    rng: &mut R,
    lines: u64,
) -> io::Result<()> {
    for _ in 0..lines {
        random_record(rng).write_line(writer)?;
    }
    writer.flush()
}
