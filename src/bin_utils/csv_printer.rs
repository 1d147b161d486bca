use std::io::Write;

use anyhow::Context;
use csv::Writer;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::account::AccountNumber;

#[derive(Debug, Serialize)]
pub struct DayRow {
    pub day: u32,
    pub total: Decimal,
    pub reportable: u64,
}

#[derive(Debug, Serialize)]
pub struct BalanceRow {
    pub account: AccountNumber,
    pub balance: Decimal,
}

pub fn print_rows<W, T>(output: &mut W, rows: impl Iterator<Item = T>) -> anyhow::Result<()>
where
    W: Write,
    T: Serialize,
{
    let mut writer = Writer::from_writer(output);
    for row in rows {
        writer.serialize(row).context("Failed to write to CSV")?;
    }
    writer.flush().context("Failed to flush CSV writer")?;
    Ok(())
}
