use cloudranger::{RangeRecord, Ranger, Result};
use std::net::IpAddr;

fn main() -> Result<()> {
    // Look up an address with the shared default Ranger
    let (result, found) = cloudranger::get_ip("3.5.140.101");
    println!("{found} {result:?}");

    // Build a Ranger once and reuse it for many lookups
    let ranger = Ranger::new();
    for address in ["34.35.1.2", "104.21.40.8", "2a01:7e03::1111", "127.0.0.1"] {
        let (result, found) = ranger.get_ip(address);
        if found {
            println!("{address}: {} {}", result.provider(), result.region());
        } else {
            println!("{address}: not found");
        }
    }

    // List every range containing an address, least specific first
    let ip_addr: IpAddr = "13.32.1.1".parse()?;
    for record in ranger.get_supernet_records(ip_addr) {
        println!("{:?}", record);
    }

    // Build a Ranger from your own ranges
    let custom = Ranger::from_records([
        RangeRecord::new("10.0.0.0/8".parse()?, "corp", "hq"),
        RangeRecord::new("10.20.0.0/16".parse()?, "corp", "branch-20"),
    ]);
    let (result, _) = custom.get_ip("10.20.1.1");
    println!("{}", result.region());

    // Summarize the providers in the embedded dataset
    for provider in ranger.providers() {
        println!("{provider}: {} regions", ranger.regions(&provider).len());
    }

    Ok(())
}
