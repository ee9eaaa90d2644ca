//! Transfer command implementations

use anyhow::Result;
use tally_core::{Database, NewTransfer, TransferLeg};

use super::{format_account, truncate};

fn format_legs(legs: &[TransferLeg]) -> String {
    legs.iter()
        .map(|leg| format!("{} {:.2}", format_account(&leg.payment), leg.amount))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn cmd_transfer_add(db: &Database, user: &str, transfer: &NewTransfer) -> Result<()> {
    let saved = db.save_transfer(user, transfer)?;

    println!("✅ Recorded transfer {}", saved.transfer_id);
    println!("   From: {}", format_legs(&transfer.from));
    println!("   To:   {}", format_legs(&transfer.to));
    println!("   {} entries written", saved.entry_ids.len());

    Ok(())
}

pub fn cmd_transfer_delete(db: &Database, user: &str, id: i64) -> Result<()> {
    if db.delete_transfer(user, id)? {
        println!("✅ Reversed transfer {}", id);
    } else {
        println!("Transfer {} not found.", id);
    }
    Ok(())
}

pub fn cmd_transfer_list(db: &Database, user: &str, limit: i64) -> Result<()> {
    let transfers = db.list_transfers(user, limit)?;

    if transfers.is_empty() {
        println!("No transfers found. Record one with:");
        println!("  tally transfer add --from bank:Chase=200 --to cash=200");
        return Ok(());
    }

    println!();
    println!("🔁 Recent Transfers");
    println!("   ─────────────────────────────────────────────────────────────");

    for transfer in transfers {
        println!(
            "   [{}] {} │ {:>10.2} │ {} → {} │ {}",
            transfer.id,
            transfer.date,
            transfer.total_amount,
            format_legs(&transfer.from),
            format_legs(&transfer.to),
            truncate(&transfer.description, 30)
        );
    }

    Ok(())
}
