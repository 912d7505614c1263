//! List every entry in the conntrack table, one line each.
//!
//! Needs CAP_NET_ADMIN; run as root.

use std::error::Error;

use nfct::{
    consts::nfnl::{NfGroup, NfSubsys},
    handle::{Handle, Verdict},
    proto::ProtoRegistry,
};

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut handle = Handle::open(NfSubsys::Ctnetlink, NfGroup::empty())?;
    let registry = ProtoRegistry::global();
    handle.dump_flows(|flow, _| {
        println!("{}", flow.display(registry));
        Verdict::Continue
    })?;
    Ok(())
}
