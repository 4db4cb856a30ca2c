//! Period rotation and archives.

use choreboard_core::RotationOutcome;

use super::{block_on, open_db, open_session, print_json, CliResult};

pub fn run(household_id: &str) -> CliResult {
    let session = open_session()?;
    let outcome = block_on(session.rotate_period(household_id))??;
    if outcome == RotationOutcome::NoOp {
        eprintln!("nothing was completed this period; period advanced without an archive");
    }
    print_json(&outcome)
}

pub fn archives(household_id: &str) -> CliResult {
    let db = open_db()?;
    print_json(&db.archives(household_id)?)
}
