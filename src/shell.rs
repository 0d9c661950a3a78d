//! The `ping` command of the kernel shell.

use core::fmt::{
    self,
    Write,
};

use crate::repr::Ipv4Address;
use crate::service::Icmpv4Service;

pub const PING_USAGE: &str = "Usage: ping <ip.address> <flags>";

const PING_FLAGS: [(&str, &str); 4] = [
    ("-h", "display help contents"),
    ("-v", "display the sequence number of the echo request"),
    (
        "-d",
        "debug mode, display user input as well as variables processed",
    ),
    ("-hex", "display IPs in hexadecimal"),
];

/// Arguments of the `ping` command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PingArgs<'a> {
    /// First argument that is not a flag, if any.
    pub target: Option<&'a str>,
    pub help: bool,
    pub verbose: bool,
    pub debug: bool,
    pub hex: bool,
}

impl<'a> PingArgs<'a> {
    /// Parses whitespace separated arguments, excluding the command name.
    ///
    /// Unknown flags are ignored, as is every non-flag after the first.
    pub fn parse(args: &'a str) -> PingArgs<'a> {
        let mut ping_args = PingArgs::default();

        for arg in args.split_whitespace() {
            match arg {
                "-h" => ping_args.help = true,
                "-v" => ping_args.verbose = true,
                "-d" => ping_args.debug = true,
                "-hex" => ping_args.hex = true,
                _ if arg.starts_with('-') => {}
                _ => {
                    if ping_args.target.is_none() {
                        ping_args.target = Some(arg);
                    }
                }
            }
        }

        ping_args
    }
}

/// Runs `ping <args>` against icmp, writing output to out.
pub fn ping(icmp: &Icmpv4Service, args: &str, out: &mut dyn Write) -> fmt::Result {
    let ping_args = PingArgs::parse(args);

    if ping_args.debug {
        for (i, arg) in core::iter::once("ping")
            .chain(args.split_whitespace())
            .enumerate()
        {
            writeln!(out, "DEBUG MODE: argv[{}]: \"{}\"", i, arg)?;
        }
        writeln!(out, "DEBUG MODE: IP String Parsed: {:?}", ping_args.target)?;
    }

    if ping_args.help {
        writeln!(out, "{}", PING_USAGE)?;
        for (flag, description) in PING_FLAGS.iter() {
            writeln!(out, "  {:<6}{}", flag, description)?;
        }
        return Ok(());
    }

    let target = match ping_args.target {
        Some(target) => target,
        None => return writeln!(out, "{}", PING_USAGE),
    };

    let ipv4_addr = match target.parse::<Ipv4Address>() {
        Ok(ipv4_addr) => ipv4_addr,
        Err(_) => return writeln!(out, "ping: invalid IPv4 address \"{}\"", target),
    };

    if ping_args.debug {
        writeln!(
            out,
            "DEBUG MODE: Target IP: 0x{:08X} = {}",
            ipv4_addr.to_u32(),
            ipv4_addr.to_u32()
        )?;
    }

    if ping_args.hex {
        writeln!(out, "Pinging 0x{:08X}...", ipv4_addr.to_u32())?;
    } else {
        writeln!(out, "Pinging {}...", ipv4_addr)?;
    }

    match icmp.ping(ipv4_addr) {
        Ok(seq) if ping_args.verbose => writeln!(out, "Sent echo request with seq {}.", seq),
        Ok(_) => Ok(()),
        Err(err) => writeln!(out, "ping: {:?}", err),
    }
}
