use clap::Parser;
use lctune_cat::PacketParser;

// lctune-cat 2a110000ff00170f0a003412
// lctune-cat 0511160f071610060000000000000000cdab
// lctune-cat 09110000e8030000d0070000b80b0000a00f0000170e02007856

/// `cat`, but for crystal-free radio calibration packets.
#[derive(Parser, Debug)]
#[command(version, about, long_about)]
struct Args {
    /// The packet to parse, as a hex string. The packet type is derived
    /// from the length.
    #[clap(value_parser(clap::builder::NonEmptyStringValueParser::new()))]
    input: String,
}

fn main() {
    let args = Args::parse();

    match PacketParser::parse_hex(&args.input) {
        Ok(parsed) => println!("{}", parsed),
        Err(_) => eprintln!("Failed to parse the packet."),
    }
}
