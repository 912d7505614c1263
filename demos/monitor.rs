//! Follow the conntrack event stream and print one line per event,
//! prefixed with what happened to the entry.
//!
//! Needs CAP_NET_ADMIN; run as root. Interrupt to stop.

use std::error::Error;

use nfct::{
    consts::nfnl::{NfGroup, NfSubsys},
    handle::{Handle, Verdict},
    proto::ProtoRegistry,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut handle = Handle::open(NfSubsys::Ctnetlink, NfGroup::all_conntrack())?;
    let registry = ProtoRegistry::global();
    handle.watch_flows(|flow, kind| {
        println!("{:>9} {}", kind.to_string(), flow.display(registry));
        Verdict::Continue
    })?;
    Ok(())
}
