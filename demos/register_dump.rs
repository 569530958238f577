// Register dump: READ-ONLY check that a TMC2226 node answers on the bus.
//
// This tool does not write anything to the chip, so it is safe to run
// against a wired-up motor. Run it before spin_test.
//
// Usage: cargo run --example register_dump -- <port> [--node 0]

use clap::Parser;
use tmc2226_driver::{MotionConfig, NodeAddress, ReadRegister, SerialTransport, Tmc2226Node};

#[derive(Parser)]
#[command(about = "Read-only TMC2226 register dump")]
struct Args {
    /// Serial port of the half-duplex UART adapter
    port: String,

    /// Node address 0-3 (set by the MS1/MS2 straps)
    #[arg(short, long, default_value_t = 0)]
    node: u8,
}

const DUMP_REGISTERS: [ReadRegister; 6] = [
    ReadRegister::Gconf,
    ReadRegister::Gstat,
    ReadRegister::Ifcnt,
    ReadRegister::Ioin,
    ReadRegister::Chopconf,
    ReadRegister::DrvStatus,
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();
    let addr = NodeAddress::from_strap_pins(args.node & 0x01 != 0, args.node & 0x02 != 0);

    println!("TMC2226 register dump (read-only)");
    println!("  port: {}", args.port);
    println!("  node: {:?}", addr);
    println!();

    println!("Step 1: Opening serial port...");
    let mut bus = match SerialTransport::open(&args.port) {
        Ok(bus) => {
            println!("  ok");
            bus
        }
        Err(e) => {
            println!("  failed: {}", e);
            println!();
            println!("Check the port path, the adapter wiring (single-wire");
            println!("half-duplex, 9600 8N1) and the MS1/MS2 strapping.");
            return Err(e.into());
        }
    };
    println!();

    // No init: a plain session avoids the configuration writes.
    let node = Tmc2226Node::new(addr, MotionConfig::default());

    println!("Step 2: Reading registers...");
    let mut failures = 0;
    for register in DUMP_REGISTERS {
        match node.read_register(&mut bus, register) {
            Ok(value) => println!("  {:<12} = 0x{:08X}", format!("{:?}", register), value),
            Err(e) => {
                println!("  {:<12}   error: {}", format!("{:?}", register), e);
                failures += 1;
            }
        }
    }
    println!();

    if failures == 0 {
        println!("All reads succeeded, the node is reachable.");
        Ok(())
    } else {
        println!("{failures} register read(s) failed.");
        Err("node not fully reachable".into())
    }
}
